//! Recurrent policy/value agent.
use super::{network::Network, AgentConfig, AgentState, StateGuard};
use crate::{
    lstm::LstmEncoder,
    model::RecurrentEncoder,
    opt::Optimizer,
    world::{Decision, WorldState},
};
use anyhow::Result;
use candle_core::{backprop::GradStore, Device, Tensor, Var, D};
use candle_nn::{ops::log_softmax, VarMap};
use chunkrl_core::ActionSpace;
use log::info;
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::Path};

/// Draws one action per head by the Gumbel-max trick.
fn sample_gumbel(logits: &Tensor) -> Result<Tensor> {
    let eps = 1e-6f32;
    let u = Tensor::rand(0f32, 1f32, logits.shape(), logits.device())?.clamp(eps, 1.0 - eps)?;
    let gumbel = u.log()?.neg()?.log()?.neg()?;
    Ok((logits + gumbel)?.argmax(D::Minus1)?)
}

/// Recurrent policy/value agent.
///
/// Decisions are made for every environment instance at once. Each network keeps
/// the hidden state left by its last forward pass and continues from it on the next
/// call; see [`RecurrentAgent::substitute_state`] for running on another state.
pub struct RecurrentAgent<E: RecurrentEncoder = LstmEncoder> {
    config: AgentConfig<E::Config>,
    device: Device,
    policy: Network<E>,
    value: Network<E>,
    opt: Optimizer,
}

impl<E: RecurrentEncoder> RecurrentAgent<E> {
    /// The hidden states of both networks.
    pub fn state(&self) -> AgentState {
        AgentState {
            policy: self.policy.encoder().state(),
            value: self.value.encoder().state(),
        }
    }

    /// Replaces the hidden states of both networks.
    pub fn set_state(&mut self, state: AgentState) {
        self.policy.encoder_mut().set_state(state.policy);
        self.value.encoder_mut().set_state(state.value);
    }

    /// Forgets the hidden states; the next decision starts from zeros.
    pub fn clear_state(&mut self) {
        self.policy.encoder_mut().clear_state();
        self.value.encoder_mut().clear_state();
    }

    /// Installs `state` until the returned guard is dropped.
    pub fn substitute_state(&mut self, state: AgentState) -> StateGuard<'_, E> {
        StateGuard::new(self, state)
    }
}

impl<E> RecurrentAgent<E>
where
    E: RecurrentEncoder,
    E::Config: DeserializeOwned + Serialize,
{
    /// Constructs the agent.
    pub fn build(config: AgentConfig<E::Config>) -> Result<Self> {
        let device: Device = config.device.try_into()?;
        let n_logits = config.action_space.n_logits();
        let policy = Network::build(config.encoder_config.clone(), n_logits, &device)?;
        let value = Network::build(config.encoder_config.clone(), 1, &device)?;

        let mut vars = policy.vars();
        vars.extend(value.vars());
        let opt = config.opt_config.build(vars)?;

        Ok(Self {
            config,
            device,
            policy,
            value,
            opt,
        })
    }

    /// Makes decisions on a single world `[N, ..]` or on a chunk of worlds `[T, N, ..]`.
    ///
    /// * `sample` - draws actions from the policy.
    /// * `value` - evaluates the value network.
    /// * `test` - takes the most probable actions; implies actions are returned.
    pub fn forward(
        &mut self,
        world: &WorldState,
        sample: bool,
        value: bool,
        test: bool,
    ) -> Result<Decision> {
        let single = world.reward.rank() == 1;
        let (obs, reset) = match single {
            true => (world.obs.unsqueeze(0)?, world.reset.unsqueeze(0)?),
            false => (world.obs.clone(), world.reset.clone()),
        };

        let ActionSpace { n_heads, n_actions } = self.config.action_space;
        let logits = self.policy.forward(&obs, &reset)?;
        let (n_steps, batch, _) = logits.dims3()?;
        let logits = logits.reshape((n_steps, batch, n_heads, n_actions))?;
        let logits = log_softmax(&logits, D::Minus1)?;

        let actions = match (test, sample) {
            (true, _) => Some(logits.argmax(D::Minus1)?),
            (false, true) => Some(sample_gumbel(&logits)?),
            (false, false) => None,
        };

        let value = match value {
            true => Some(self.value.forward(&obs, &reset)?.squeeze(D::Minus1)?),
            false => None,
        };

        let decision = Decision {
            logits,
            actions,
            value,
        };
        match single {
            true => Ok(Decision {
                logits: decision.logits.squeeze(0)?,
                actions: decision.actions.map(|t| t.squeeze(0)).transpose()?,
                value: decision.value.map(|t| t.squeeze(0)).transpose()?,
            }),
            false => Ok(decision),
        }
    }

    /// The device of the parameters.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The action space the agent was built for.
    pub fn action_space(&self) -> &ActionSpace {
        &self.config.action_space
    }

    /// The configuration.
    pub fn config(&self) -> &AgentConfig<E::Config> {
        &self.config
    }

    /// Parameters of the policy network.
    pub fn policy_vars(&self) -> Vec<Var> {
        self.policy.vars()
    }

    /// Parameters of the value network.
    pub fn value_vars(&self) -> Vec<Var> {
        self.value.vars()
    }

    /// Named parameter groups, `"policy"` and `"value"`.
    pub fn varmaps(&self) -> [(&'static str, &VarMap); 2] {
        [("policy", self.policy.varmap()), ("value", self.value.varmap())]
    }

    /// Applies one optimizer step with precomputed gradients.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        self.opt.step(grads)
    }

    /// Current learning rate.
    pub fn learning_rate(&self) -> f64 {
        self.opt.learning_rate()
    }

    /// Saves the parameters of both networks in `path`.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        fs::create_dir_all(&path)?;
        self.policy
            .save(path.as_ref().join("policy.safetensors").as_path())?;
        self.value
            .save(path.as_ref().join("value.safetensors").as_path())?;
        info!("Save agent to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the parameters of both networks from `path`.
    ///
    /// Every parameter must be present with the right shape; see
    /// [`Checkpointer::load`](crate::checkpoint::Checkpointer::load) for a lenient load.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.policy
            .load(path.as_ref().join("policy.safetensors").as_path())?;
        self.value
            .load(path.as_ref().join("value.safetensors").as_path())?;
        info!("Load agent from {:?}", path.as_ref());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lstm::LstmEncoderConfig;
    use chunkrl_core::World;
    use tempdir::TempDir;

    fn agent(n_heads: usize, n_actions: usize) -> Result<RecurrentAgent> {
        let config = AgentConfig::<LstmEncoderConfig>::default()
            .width(8)
            .obs_dim(2)
            .action_space(ActionSpace::multi_discrete(n_heads, n_actions));
        RecurrentAgent::build(config)
    }

    fn world(n: usize, reset: i8) -> Result<WorldState> {
        let w = World::new(
            (0..2 * n).map(|i| i as f32 / 10.0).collect(),
            2,
            vec![0.0; n],
            vec![reset; n],
            vec![0; n],
        )?;
        WorldState::from_world(&w, &Device::Cpu)
    }

    #[test]
    fn test_forward_shapes() -> Result<()> {
        let mut agent = agent(3, 4)?;
        let d = agent.forward(&world(5, 1)?, true, true, false)?;
        assert_eq!(d.logits.dims(), &[5, 3, 4]);
        assert_eq!(d.actions()?.dims(), &[5, 3]);
        assert_eq!(d.value()?.dims(), &[5]);

        // log-probabilities are normalized
        let total = d.logits.exp()?.sum(D::Minus1)?.flatten_all()?.to_vec1::<f32>()?;
        assert!(total.iter().all(|p| (p - 1.0).abs() < 1e-5));

        let d = agent.forward(&world(5, 0)?, false, false, false)?;
        assert!(d.actions.is_none());
        assert!(d.value.is_none());
        Ok(())
    }

    #[test]
    fn test_test_mode_is_argmax() -> Result<()> {
        let mut agent = agent(2, 5)?;
        let d = agent.forward(&world(4, 1)?, false, false, true)?;
        let greedy = d.logits.argmax(D::Minus1)?.to_vec2::<u32>()?;
        assert_eq!(d.actions()?.to_vec2::<u32>()?, greedy);
        Ok(())
    }

    #[test]
    fn test_sampled_actions_in_range() -> Result<()> {
        let mut agent = agent(1, 3)?;
        let d = agent.forward(&world(64, 1)?, true, false, false)?;
        let act = d.to_act()?;
        assert_eq!(act.len(), 64);
        assert!((0..64).all(|i| act.get(i, 0) < 3));
        Ok(())
    }

    #[test]
    fn test_save_load() -> Result<()> {
        let mut agent1 = agent(1, 2)?;
        let mut agent2 = agent(1, 2)?;
        let dir = TempDir::new("agent")?;
        agent1.save(dir.path())?;
        agent2.load(dir.path())?;

        let w = world(3, 1)?;
        let l1 = agent1.forward(&w, false, true, false)?;
        let l2 = agent2.forward(&w, false, true, false)?;
        let diff = (l1.logits - l2.logits)?.abs()?.max_all()?.to_scalar::<f32>()?;
        assert!(diff < 1e-6);
        Ok(())
    }
}
