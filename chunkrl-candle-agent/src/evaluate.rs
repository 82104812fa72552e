//! Evaluation of a trained agent.
use crate::{agent::RecurrentAgent, model::RecurrentEncoder, world::WorldState};
use anyhow::Result;
use chunkrl_core::{record::Record, Env};
use log::info;
use serde::{de::DeserializeOwned, Serialize};

/// Runs `agent` on `env` for `n_steps` steps from a fresh reset, without updating it.
///
/// With `test`, the most probable actions are taken instead of sampled ones. The
/// hidden state of the agent is restored afterwards.
///
/// The record holds `eval/step-reward`, the mean reward per instance-step and, when
/// at least one trajectory ended, `eval/traj-reward`, the total reward divided by
/// the number of ended trajectories.
pub fn evaluate<E, V>(
    agent: &mut RecurrentAgent<E>,
    env: &mut V,
    n_steps: usize,
    test: bool,
) -> Result<Record>
where
    E: RecurrentEncoder,
    E::Config: DeserializeOwned + Serialize,
    V: Env,
{
    let mut agent = agent.substitute_state(Default::default());
    let mut world = env.reset()?;
    let mut reward_sum = 0f32;
    let mut resets = 0usize;

    for _ in 0..n_steps {
        let ws = WorldState::from_world(&world, agent.device())?;
        let decision = agent.forward(&ws, true, false, test)?.detach();
        let (next, _) = env.step(&decision.to_act()?)?;
        reward_sum += next.reward.iter().sum::<f32>();
        resets += next.reset.iter().filter(|&&r| r != 0).count();
        world = next;
    }

    let n_samples = (n_steps * env.n_envs()).max(1) as f32;
    let mut record = Record::from_scalar("eval/step-reward", reward_sum / n_samples);
    if resets > 0 {
        record.insert_scalar("eval/traj-reward", reward_sum / resets as f32);
    }
    info!(
        "Evaluated {} steps: step reward {:.5}, {} trajectories",
        n_steps,
        reward_sum / n_samples,
        resets
    );

    Ok(record)
}
