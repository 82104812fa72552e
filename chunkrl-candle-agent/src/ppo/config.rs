//! Configuration of the policy/value update.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`optimize`](super::optimize).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PpoConfig {
    /// Discount factor.
    pub gamma: f64,

    /// Trace decay of generalized advantage estimation.
    pub trace_decay: f64,

    /// Clipping range of the importance ratio in the policy loss.
    pub clip: f64,

    /// Weight of the negative entropy in the loss.
    pub entropy: f64,

    /// Bounds of the importance ratio.
    pub ratio_clamp: (f32, f32),

    /// Maximum deviation of the value from the behavior value in the clipped value loss.
    pub value_clip: f64,

    /// Maximum gradient norm of each of the policy and the value network.
    pub max_grad_norm: f64,

    /// Added to the standard deviation when normalizing advantages.
    pub adv_eps: f64,
}

impl Default for PpoConfig {
    fn default() -> Self {
        Self {
            gamma: 0.995,
            trace_decay: 0.97,
            clip: 0.2,
            entropy: 1e-3,
            ratio_clamp: (0.05, 20.0),
            value_clip: 10.0,
            max_grad_norm: 100.0,
            adv_eps: 1e-3,
        }
    }
}

impl PpoConfig {
    /// Sets the discount factor.
    pub fn gamma(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Sets the trace decay of generalized advantage estimation.
    pub fn trace_decay(mut self, v: f64) -> Self {
        self.trace_decay = v;
        self
    }

    /// Sets the clipping range of the policy loss.
    pub fn clip(mut self, v: f64) -> Self {
        self.clip = v;
        self
    }

    /// Sets the entropy coefficient.
    pub fn entropy(mut self, v: f64) -> Self {
        self.entropy = v;
        self
    }

    /// Sets the bounds of the importance ratio.
    pub fn ratio_clamp(mut self, lo: f32, hi: f32) -> Self {
        self.ratio_clamp = (lo, hi);
        self
    }

    /// Sets the value clipping range.
    pub fn value_clip(mut self, v: f64) -> Self {
        self.value_clip = v;
        self
    }

    /// Sets the maximum gradient norm.
    pub fn max_grad_norm(mut self, v: f64) -> Self {
        self.max_grad_norm = v;
        self
    }

    /// Constructs [`PpoConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`PpoConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
