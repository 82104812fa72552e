//! Configuration of the actor-learner loop.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of the actor-learner loop.
///
/// The loop alternates between collecting `buffer_size` world steps from every
/// environment instance and optimizing the agent on mini-batches of that chunk.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// The number of world steps in a trajectory chunk.
    pub buffer_size: usize,

    /// Approximate number of samples in a mini-batch.
    ///
    /// The environment axis is split into groups of `max(1, batch_size / buffer_size)`
    /// instances.
    pub batch_size: usize,

    /// The remaining mini-batches of a chunk are skipped once the KL divergence
    /// between the behavior and the updated policy exceeds this value.
    pub kl_threshold: f32,

    /// Minimum interval between two checkpoints, in seconds.
    pub save_throttle_secs: u64,

    /// Interval of flushing records, in iterations.
    pub flush_record_interval: usize,

    /// The number of collect/optimize iterations. `None` runs forever.
    pub max_iterations: Option<usize>,

    /// Directory for checkpoints. `None` disables checkpointing.
    pub model_dir: Option<String>,

    /// Random seed of the environment and the mini-batch sampler.
    pub seed: i64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            buffer_size: 48,
            batch_size: 576,
            kl_threshold: 0.02,
            save_throttle_secs: 60,
            flush_record_interval: 1,
            max_iterations: None,
            model_dir: None,
            seed: 42,
        }
    }
}

impl TrainerConfig {
    /// Sets the number of world steps in a trajectory chunk.
    pub fn buffer_size(mut self, v: usize) -> Self {
        self.buffer_size = v;
        self
    }

    /// Sets the approximate number of samples in a mini-batch.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the KL threshold of early stopping.
    pub fn kl_threshold(mut self, v: f32) -> Self {
        self.kl_threshold = v;
        self
    }

    /// Sets the minimum interval between checkpoints in seconds.
    pub fn save_throttle_secs(mut self, v: u64) -> Self {
        self.save_throttle_secs = v;
        self
    }

    /// Sets the interval of flushing records in iterations.
    pub fn flush_record_interval(mut self, v: usize) -> Self {
        self.flush_record_interval = v;
        self
    }

    /// Sets the number of iterations.
    pub fn max_iterations(mut self, v: usize) -> Self {
        self.max_iterations = Some(v);
        self
    }

    /// Sets the directory for checkpoints.
    pub fn model_dir(mut self, v: impl Into<String>) -> Self {
        self.model_dir = Some(v.into());
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: i64) -> Self {
        self.seed = v;
        self
    }

    /// Width of a mini-batch on the environment axis.
    pub fn envs_per_batch(&self) -> usize {
        (self.batch_size / self.buffer_size.max(1)).max(1)
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_trainer_config() -> Result<()> {
        let config = TrainerConfig::default()
            .buffer_size(16)
            .batch_size(64)
            .max_iterations(100)
            .model_dir("some/directory");

        let dir = TempDir::new("trainer_config")?;
        let path = dir.path().join("trainer_config.yaml");

        config.save(&path)?;
        let config_ = TrainerConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_envs_per_batch() {
        let config = TrainerConfig::default();
        assert_eq!(config.envs_per_batch(), 12);
        assert_eq!(config.batch_size(10).envs_per_batch(), 1);
    }
}
