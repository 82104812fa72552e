//! Ready-made FSM environments.
use super::{FsmBuilder, FsmEnv, FsmState, FsmTable};
use crate::error::ChunkError;

/// A single self-looping state paying reward 1 on every step. No observation.
///
/// The value of the state is `1 / (1 - gamma)`.
pub fn unit_reward(n_envs: usize) -> Result<FsmEnv, ChunkError> {
    let table = FsmBuilder::new().state("start").to("start", 1.0).build()?;
    FsmEnv::new(table, n_envs)
}

/// A chain of `n` states with a single action.
///
/// States `0..n-1` are visited in order and state `i` observes `i / n`. Only the
/// transition into the terminal state `n - 1` pays reward 1, so the discounted
/// return from the first state is `gamma^(n - 2)`.
pub fn chain(n: usize, n_envs: usize) -> Result<FsmEnv, ChunkError> {
    if n < 2 {
        return Err(ChunkError::InvalidChainLength(n));
    }
    let obs = |i: usize| vec![i as f32 / n as f32];
    let mut states: Vec<FsmState> = (0..n - 1)
        .map(|i| {
            let reward = if i == n - 2 { 1.0 } else { 0.0 };
            FsmState::new(i.to_string(), false, obs(i), vec![((i + 1).to_string(), reward)])
        })
        .collect();
    states.push(FsmState::new(
        (n - 1).to_string(),
        true,
        obs(n - 1),
        vec![((n - 1).to_string(), 0.0)],
    ));
    FsmEnv::new(FsmTable::new(states), n_envs)
}

/// Two actions at the start lead to `heads` or `tails`, paying +1 or -1 on the way out.
pub fn coin_flip(n_envs: usize) -> Result<FsmEnv, ChunkError> {
    let table = FsmBuilder::new()
        .state("start")
        .obs(&[0.0])
        .to("heads", 0.0)
        .to("tails", 0.0)
        .state("heads")
        .obs(&[1.0])
        .to("end", 1.0)
        .to("end", 1.0)
        .state("tails")
        .obs(&[-1.0])
        .to("end", -1.0)
        .to("end", -1.0)
        .state("end")
        .obs(&[0.0])
        .to("end", 0.0)
        .to("end", 0.0)
        .terminal()
        .build()?;
    FsmEnv::new(table, n_envs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DiscreteAct, Env};
    use anyhow::Result;

    #[test]
    fn test_unit_reward() -> Result<()> {
        let mut env = unit_reward(3)?;
        assert!(env.observation_space().is_empty());
        assert_eq!(env.action_space().n_actions, 1);
        env.reset()?;
        for _ in 0..5 {
            let (w, _) = env.step(&DiscreteAct::single(vec![0; 3]))?;
            assert_eq!(w.reward, vec![1.0; 3]);
            assert_eq!(w.reset, vec![0; 3]);
            assert!(w.obs.is_empty());
        }
        Ok(())
    }

    #[test]
    fn test_chain_episode() -> Result<()> {
        let n = 4;
        let mut env = chain(n, 1)?;
        assert_eq!(env.to_string(), "FsmEnv(4s1a)");
        let w = env.reset()?;
        assert_eq!(w.obs, vec![0.0]);

        let mut rewards = vec![];
        let mut resets = vec![];
        for _ in 0..n - 1 {
            let (w, _) = env.step(&DiscreteAct::single(vec![0]))?;
            rewards.push(w.reward[0]);
            resets.push(w.reset[0]);
        }
        assert_eq!(rewards, vec![0.0, 0.0, 1.0]);
        assert_eq!(resets, vec![0, 0, 1]);
        Ok(())
    }

    #[test]
    fn test_chain_too_short() {
        assert_eq!(chain(1, 1).unwrap_err(), ChunkError::InvalidChainLength(1));
    }

    #[test]
    fn test_coin_flip() -> Result<()> {
        let mut env = coin_flip(2)?;
        env.reset()?;
        let (w, _) = env.step(&DiscreteAct::single(vec![0, 1]))?;
        assert_eq!(w.obs, vec![1.0, -1.0]);
        let (w, _) = env.step(&DiscreteAct::single(vec![1, 0]))?;
        assert_eq!(w.reward, vec![1.0, -1.0]);
        assert_eq!(w.reset, vec![1, 1]);
        Ok(())
    }
}
