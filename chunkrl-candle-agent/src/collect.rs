//! Collecting trajectory chunks from a vectorized environment.
use crate::{
    agent::RecurrentAgent,
    model::RecurrentEncoder,
    world::{Chunk, Transition, WorldState},
};
use anyhow::Result;
use candle_core::DType;
use chunkrl_core::{
    record::{Record, RecordValue},
    Env, World,
};
use log::trace;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::VecDeque;

/// Steps `env` with decisions sampled from `agent`, starting from `world`.
///
/// Returns the latest `steps` transitions in order, the world to continue from and
/// the telemetry reported by the environment. Decisions carry values and no
/// gradient.
pub fn collect<E, V>(
    agent: &mut RecurrentAgent<E>,
    env: &mut V,
    world: World,
    steps: usize,
) -> Result<(Vec<Transition>, World, Record)>
where
    E: RecurrentEncoder,
    E::Config: DeserializeOwned + Serialize,
    V: Env,
{
    let mut buffer = VecDeque::with_capacity(steps + 1);
    let mut env_record = Record::empty();
    let mut world = world;

    for _ in 0..steps {
        let ws = WorldState::from_world(&world, agent.device())?;
        let decision = agent.forward(&ws, true, true, false)?.detach();
        let act = decision.to_act()?;
        buffer.push_back(Transition {
            world: ws,
            decision,
        });
        if buffer.len() > steps {
            buffer.pop_front();
        }

        let (next, record) = env.step(&act)?;
        env_record.merge_inplace(record);
        world = next;
        trace!("Actor stepped");
    }

    Ok((buffer.into(), world, env_record))
}

/// Stacks transitions into a [`Chunk`] and summarizes its worlds.
///
/// Trajectory statistics divide by the number of resets in the chunk and are
/// omitted when there is none.
pub fn as_chunk(transitions: &[Transition]) -> Result<(Chunk, Record)> {
    let chunk = Chunk::stack(transitions)?;
    let w = &chunk.world;

    let n_samples = w.reset.elem_count() as f32;
    let n_steps = chunk.n_steps() as f32;
    let n_traj = w.reset.to_dtype(DType::F32)?.sum_all()?.to_scalar::<f32>()?;
    let reward_sum = w.reward.sum_all()?.to_scalar::<f32>()?;

    let mut record = Record::from_slice(&[
        ("count/traj", RecordValue::Scalar(n_traj)),
        ("count/world", RecordValue::Scalar(n_steps)),
        ("count/samples", RecordValue::Scalar(n_samples)),
        ("step-reward", RecordValue::Scalar(reward_sum / n_samples)),
    ]);

    if n_traj > 0.0 {
        let positive = w.reward.clamp(0f32, f32::INFINITY)?.sum_all()?.to_scalar::<f32>()?;
        let negative = w.reward.clamp(f32::NEG_INFINITY, 0f32)?.sum_all()?.to_scalar::<f32>()?;
        record.insert_scalar("traj-length", n_samples / n_traj);
        record.insert_scalar("traj-reward/mean", reward_sum / n_traj);
        record.insert_scalar("traj-reward/positive", positive / n_traj);
        record.insert_scalar("traj-reward/negative", negative / n_traj);
    }

    Ok((chunk, record))
}
