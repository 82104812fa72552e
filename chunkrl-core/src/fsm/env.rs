use super::{table::CompiledFsm, FsmTable};
use crate::{
    error::ChunkError,
    record::Record,
    ActionSpace, DiscreteAct, Env, ObservationSpace, World,
};
use anyhow::Result;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration of [`FsmEnv`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FsmEnvConfig {
    /// The state table.
    pub table: FsmTable,

    /// The number of parallel instances.
    pub n_envs: usize,
}

impl FsmEnvConfig {
    /// Constructs a configuration.
    pub fn new(table: FsmTable, n_envs: usize) -> Self {
        Self { table, n_envs }
    }

    /// Sets the number of parallel instances.
    pub fn n_envs(mut self, v: usize) -> Self {
        self.n_envs = v;
        self
    }
}

/// `n_envs` instances of a deterministic finite-state machine.
///
/// Every instance has a single action head.
#[derive(Debug, Clone)]
pub struct FsmEnv {
    config: FsmEnvConfig,
    fsm: CompiledFsm,
    token: Vec<usize>,
    obs_space: ObservationSpace,
    act_space: ActionSpace,
}

impl FsmEnv {
    /// Validates `table` and creates `n_envs` instances, all in the initial state.
    pub fn new(table: FsmTable, n_envs: usize) -> Result<Self, ChunkError> {
        if n_envs == 0 {
            return Err(ChunkError::ShapeMismatch(
                "FSM environment needs at least one instance".to_string(),
            ));
        }
        let fsm = table.compile()?;
        let obs_space = ObservationSpace::vector(fsm.obs_dim);
        let act_space = ActionSpace::multi_discrete(1, fsm.n_actions);
        Ok(Self {
            config: FsmEnvConfig::new(table, n_envs),
            fsm,
            token: vec![0; n_envs],
            obs_space,
            act_space,
        })
    }

    /// Configuration that builds an identical environment.
    pub fn config(&self) -> &FsmEnvConfig {
        &self.config
    }

    /// Current state index of every instance.
    pub fn tokens(&self) -> &[usize] {
        &self.token
    }

    fn world(&self, reward: Vec<f32>, reset: Vec<i8>) -> Result<World, ChunkError> {
        let d = self.fsm.obs_dim;
        let mut obs = Vec::with_capacity(self.token.len() * d);
        for &s in self.token.iter() {
            obs.extend_from_slice(&self.fsm.obs[s * d..(s + 1) * d]);
        }
        let terminal = reset.clone();
        World::new(obs, d, reward, reset, terminal)
    }
}

impl fmt::Display for FsmEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FsmEnv({}s{}a)", self.fsm.n_states, self.fsm.n_actions)
    }
}

impl Env for FsmEnv {
    type Config = FsmEnvConfig;

    /// Transitions are deterministic, so `seed` is unused.
    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        let env = Self::new(config.table.clone(), config.n_envs)?;
        debug!("Built {} with {} instances, seed {}", env, config.n_envs, seed);
        Ok(env)
    }

    fn observation_space(&self) -> &ObservationSpace {
        &self.obs_space
    }

    fn action_space(&self) -> &ActionSpace {
        &self.act_space
    }

    fn n_envs(&self) -> usize {
        self.token.len()
    }

    fn reset(&mut self) -> Result<World> {
        self.token.iter_mut().for_each(|t| *t = 0);
        let n = self.token.len();
        Ok(self.world(vec![0.0; n], vec![1; n])?)
    }

    fn step(&mut self, act: &DiscreteAct) -> Result<(World, Record)> {
        let n = self.token.len();
        if act.len() != n {
            return Err(ChunkError::ShapeMismatch(format!(
                "{} actions for {} instances",
                act.len(),
                n
            ))
            .into());
        }

        let a_n = self.fsm.n_actions;
        let mut reward = Vec::with_capacity(n);
        let mut reset = Vec::with_capacity(n);
        for i in 0..n {
            let a = act.get(i, 0);
            if a >= a_n {
                return Err(ChunkError::ActionOutOfRange {
                    action: a,
                    n_actions: a_n,
                }
                .into());
            }
            let s = self.token[i];
            reward.push(self.fsm.reward[s * a_n + a]);
            let next = self.fsm.next[s * a_n + a];
            if self.fsm.terminal[next] {
                self.token[i] = 0;
                reset.push(1);
            } else {
                self.token[i] = next;
                reset.push(0);
            }
        }
        trace!("FSM tokens: {:?}", self.token);

        Ok((self.world(reward, reset)?, Record::empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::FsmBuilder;

    fn two_step() -> FsmEnv {
        let table = FsmBuilder::new()
            .state("a")
            .obs(&[0.0])
            .to("b", 0.5)
            .to("a", 0.0)
            .state("b")
            .obs(&[1.0])
            .to("end", 2.0)
            .to("a", -1.0)
            .state("end")
            .obs(&[9.0])
            .to("end", 0.0)
            .to("end", 0.0)
            .terminal()
            .build()
            .unwrap();
        FsmEnv::new(table, 2).unwrap()
    }

    #[test]
    fn test_reset_flags() -> Result<()> {
        let mut env = two_step();
        let w = env.reset()?;
        assert_eq!(w.reward, vec![0.0, 0.0]);
        assert_eq!(w.reset, vec![1, 1]);
        assert_eq!(w.terminal, vec![1, 1]);
        assert_eq!(w.obs, vec![0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_step_and_terminal_reset() -> Result<()> {
        let mut env = two_step();
        env.reset()?;

        let (w, _) = env.step(&DiscreteAct::single(vec![0, 1]))?;
        assert_eq!(w.reward, vec![0.5, 0.0]);
        assert_eq!(w.obs, vec![1.0, 0.0]);
        assert_eq!(w.reset, vec![0, 0]);

        // The first instance lands in the terminal state and restarts at once.
        let (w, _) = env.step(&DiscreteAct::single(vec![0, 0]))?;
        assert_eq!(w.reward, vec![2.0, 0.5]);
        assert_eq!(w.reset, vec![1, 0]);
        assert_eq!(w.terminal, vec![1, 0]);
        assert_eq!(w.obs, vec![0.0, 1.0]);
        assert_eq!(env.tokens(), &[0, 1]);
        Ok(())
    }

    #[test]
    fn test_action_out_of_range() {
        let mut env = two_step();
        let err = env.step(&DiscreteAct::single(vec![0, 2])).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ChunkError>(),
            Some(&ChunkError::ActionOutOfRange {
                action: 2,
                n_actions: 2
            })
        );
    }

    #[test]
    fn test_wrong_number_of_actions() {
        let mut env = two_step();
        assert!(env.step(&DiscreteAct::single(vec![0])).is_err());
    }
}
