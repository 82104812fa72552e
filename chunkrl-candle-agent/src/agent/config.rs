//! Configuration of [`RecurrentAgent`](super::RecurrentAgent).
use crate::{lstm::LstmEncoderConfig, model::EncoderConfig, opt::OptimizerConfig, Device};
use anyhow::Result;
use chunkrl_core::{ActionSpace, Env};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`RecurrentAgent`](super::RecurrentAgent).
///
/// Both networks are built from the same encoder configuration.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct AgentConfig<C = LstmEncoderConfig> {
    /// Configuration of the recurrent encoders.
    pub encoder_config: C,

    /// Actions of a single environment instance.
    pub action_space: ActionSpace,

    /// Device of the parameters.
    pub device: Device,

    /// Optimizer of both networks.
    pub opt_config: OptimizerConfig,
}

impl<C: Default> Default for AgentConfig<C> {
    fn default() -> Self {
        Self {
            encoder_config: C::default(),
            action_space: ActionSpace::multi_discrete(1, 1),
            device: Device::Cpu,
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl<C> AgentConfig<C>
where
    C: EncoderConfig + DeserializeOwned + Serialize,
{
    /// Sets the configuration of the encoders.
    pub fn encoder_config(mut self, v: C) -> Self {
        self.encoder_config = v;
        self
    }

    /// Sets the width of the encoders.
    pub fn width(mut self, v: usize) -> Self {
        self.encoder_config.set_width(v);
        self
    }

    /// Sets the length of the observation vector.
    pub fn obs_dim(mut self, v: usize) -> Self {
        self.encoder_config.set_in_dim(v);
        self
    }

    /// Sets the action space.
    pub fn action_space(mut self, v: ActionSpace) -> Self {
        self.action_space = v;
        self
    }

    /// Takes the observation and action spaces from an environment.
    pub fn spaces_of<E: Env>(self, env: &E) -> Self {
        let obs_dim = env.observation_space().dim;
        self.obs_dim(obs_dim).action_space(*env.action_space())
    }

    /// Sets the device.
    pub fn device(mut self, v: Device) -> Self {
        self.device = v;
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Constructs [`AgentConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`AgentConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkrl_core::fsm::chain;
    use tempdir::TempDir;

    #[test]
    fn test_serde_agent_config() -> Result<()> {
        let env = chain(4, 2)?;
        let config = AgentConfig::<LstmEncoderConfig>::default()
            .width(32)
            .spaces_of(&env)
            .opt_config(OptimizerConfig::default().learning_rate(1e-2));
        assert_eq!(config.encoder_config, LstmEncoderConfig::new(1, 32));

        let dir = TempDir::new("agent_config")?;
        let path = dir.path().join("agent_config.yaml");
        config.save(&path)?;
        let config_ = AgentConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }
}
