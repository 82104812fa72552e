//! Actor-learner loop.
use crate::{
    agent::{AgentState, RecurrentAgent},
    checkpoint::Checkpointer,
    collect::{as_chunk, collect},
    model::RecurrentEncoder,
    ppo::{optimize, PpoConfig},
    world::Chunk,
};
use anyhow::Result;
use candle_core::Tensor;
use chunkrl_core::{
    record::{AggregateRecorder, Record},
    Env, TrainerConfig,
};
use log::{debug, info};
use rand::{rngs::SmallRng, seq::SliceRandom, SeedableRng};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Instant;

/// Splits `n_envs` instances into random, disjoint groups of
/// `max(1, batch_size / n_steps)` instances. The last group may be smaller.
pub fn batch_indices(
    n_envs: usize,
    n_steps: usize,
    batch_size: usize,
    rng: &mut SmallRng,
) -> Vec<Vec<u32>> {
    let width = (batch_size / n_steps.max(1)).max(1);
    let mut ix: Vec<u32> = (0..n_envs as u32).collect();
    ix.shuffle(rng);
    ix.chunks(width).map(|c| c.to_vec()).collect()
}

/// Running totals reported alongside each chunk.
#[derive(Debug, Default)]
struct Counters {
    traj: f32,
    world: f32,
    chunks: f32,
    samples: f32,
    learner_steps: usize,
}

impl Counters {
    /// Replaces the per-chunk counts of `record` with running totals and adds rates.
    fn chunk(&mut self, mut record: Record, secs: f32) -> Record {
        let samples = record.get_scalar("count/samples").unwrap_or(0.0);
        let world = record.get_scalar("count/world").unwrap_or(0.0);
        self.traj += record.get_scalar("count/traj").unwrap_or(0.0);
        self.world += world;
        self.samples += samples;
        self.chunks += 1.0;

        record.insert_scalar("count/traj", self.traj);
        record.insert_scalar("count/world", self.world);
        record.insert_scalar("count/samples", self.samples);
        record.insert_scalar("count/chunks", self.chunks);
        if secs > 0.0 {
            record.insert_scalar("sample-rate/actor", samples / secs);
            record.insert_scalar("step-rate/world", world / secs);
            record.insert_scalar("step-rate/chunks", 1.0 / secs);
        }
        record
    }
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Runs the actor-learner loop.
///
/// # Training loop
///
/// ```mermaid
/// stateDiagram-v2
///     [*] --> Collecting
///     Collecting --> ChunkReady: buffer_size steps
///     ChunkReady --> Optimizing
///     Optimizing --> Optimizing: next mini-batch
///     Optimizing --> Collecting: all mini-batches or KL exceeded
/// ```
///
/// 1. *Collecting*: the hidden state of the agent is captured, then the agent steps
///    every environment instance `buffer_size` times, sampling actions.
/// 2. *Chunk ready*: the transitions are stacked into a `[T, N]` [`Chunk`] and its
///    statistics are stored in the recorder.
/// 3. *Optimizing*: the environment axis is split into random disjoint mini-batches
///    of `max(1, batch_size / T)` instances. For each mini-batch the captured state,
///    restricted to the mini-batch, is installed in the agent and one update is
///    applied. If the KL divergence of an update exceeds `kl_threshold`, the remaining
///    mini-batches of the chunk are skipped.
/// 4. Records are flushed every `flush_record_interval` iterations and the agent is
///    saved in `(model_dir)/latest`, at most once per `save_throttle_secs`.
///
/// Without `max_iterations` the loop runs until an error occurs.
pub struct ActorLearner<V: Env> {
    config: TrainerConfig,
    ppo_config: PpoConfig,
    env_config: V::Config,
    rng: SmallRng,
    counters: Counters,
}

impl<V: Env> ActorLearner<V> {
    /// Constructs the loop.
    pub fn build(config: TrainerConfig, ppo_config: PpoConfig, env_config: V::Config) -> Self {
        let rng = SmallRng::seed_from_u64(config.seed as u64);
        Self {
            config,
            ppo_config,
            env_config,
            rng,
            counters: Counters::default(),
        }
    }

    /// The number of updates applied so far.
    pub fn learner_steps(&self) -> usize {
        self.counters.learner_steps
    }

    /// Trains `agent` on an environment built from the configuration.
    pub fn train<E, R>(&mut self, agent: &mut RecurrentAgent<E>, recorder: &mut R) -> Result<()>
    where
        E: RecurrentEncoder,
        E::Config: DeserializeOwned + Serialize,
        R: AggregateRecorder + ?Sized,
    {
        let mut env = V::build(&self.env_config, self.config.seed)?;
        self.train_on(agent, &mut env, recorder)
    }

    /// Trains `agent` on `env`.
    pub fn train_on<E, R>(
        &mut self,
        agent: &mut RecurrentAgent<E>,
        env: &mut V,
        recorder: &mut R,
    ) -> Result<()>
    where
        E: RecurrentEncoder,
        E::Config: DeserializeOwned + Serialize,
        R: AggregateRecorder + ?Sized,
    {
        let mut checkpointer = self
            .config
            .model_dir
            .as_ref()
            .map(|dir| Checkpointer::new(dir, self.config.save_throttle_secs));
        let flush_interval = self.config.flush_record_interval.max(1);
        let mut world = env.reset()?;
        let mut iteration = 0;

        while self.config.max_iterations.map_or(true, |max| iteration < max) {
            // Collecting
            let state = agent.state();
            let timer = Instant::now();
            let (buffer, next, env_record) = collect(agent, env, world, self.config.buffer_size)?;
            world = next;
            let secs = timer.elapsed().as_secs_f32();

            // Chunk ready
            let (chunk, chunk_record) = as_chunk(&buffer)?;
            recorder.store(self.counters.chunk(chunk_record, secs));
            if !env_record.is_empty() {
                recorder.store(env_record);
            }

            // Optimizing
            self.optimize_chunk(agent, &chunk, &state, recorder)?;

            iteration += 1;
            if iteration % flush_interval == 0 {
                recorder.flush(self.counters.learner_steps as i64);
            }
            if let Some(checkpointer) = checkpointer.as_mut() {
                checkpointer.store_latest(agent)?;
            }
        }

        Ok(())
    }

    /// Applies updates on mini-batches of `chunk` until all are used or the KL
    /// divergence exceeds the threshold. Returns the number of updates.
    fn optimize_chunk<E, R>(
        &mut self,
        agent: &mut RecurrentAgent<E>,
        chunk: &Chunk,
        state: &AgentState,
        recorder: &mut R,
    ) -> Result<usize>
    where
        E: RecurrentEncoder,
        E::Config: DeserializeOwned + Serialize,
        R: AggregateRecorder + ?Sized,
    {
        let batches = batch_indices(
            chunk.n_envs(),
            chunk.n_steps(),
            self.config.batch_size,
            &mut self.rng,
        );

        let mut n_updates = 0;
        for ix in batches.into_iter() {
            let timer = Instant::now();
            let n = ix.len();
            let ix = Tensor::from_vec(ix, n, agent.device())?;
            let batch = chunk.select_envs(&ix)?;
            let (kl, mut record) = {
                let mut guard = agent.substitute_state(state.select(&ix)?);
                optimize(&mut *guard, &batch, &self.ppo_config)?
            };
            n_updates += 1;
            self.counters.learner_steps += 1;

            let secs = timer.elapsed().as_secs_f32();
            record.insert_scalar("count/learner-steps", self.counters.learner_steps as f32);
            if secs > 0.0 {
                record.insert_scalar("sample-rate/learner", (n * chunk.n_steps()) as f32 / secs);
            }
            recorder.store(record);
            debug!("Learner stepped, kl {}", kl);

            if kl > self.config.kl_threshold {
                info!(
                    "KL divergence {} exceeded {}, skipping the rest of the chunk",
                    kl, self.config.kl_threshold
                );
                break;
            }
        }

        Ok(n_updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        agent::AgentConfig,
        lstm::{LstmEncoder, LstmEncoderConfig},
    };
    use chunkrl_core::{
        fsm::{coin_flip, FsmEnv},
        record::BufferedRecorder,
    };
    use std::collections::HashSet;

    /// Trains on `coin_flip(8)` with 8 single-instance mini-batches per chunk.
    fn learner_steps_with_threshold(kl_threshold: f32, iterations: usize) -> Result<usize> {
        let mut env = coin_flip(8)?;
        let config = AgentConfig::<LstmEncoderConfig>::default()
            .width(8)
            .spaces_of(&env);
        let mut agent = RecurrentAgent::<LstmEncoder>::build(config)?;
        let trainer_config = TrainerConfig::default()
            .buffer_size(4)
            .batch_size(4)
            .kl_threshold(kl_threshold)
            .max_iterations(iterations);
        let mut recorder = BufferedRecorder::new();
        let mut trainer = ActorLearner::<FsmEnv>::build(
            trainer_config,
            PpoConfig::default(),
            env.config().clone(),
        );
        trainer.train_on(&mut agent, &mut env, &mut recorder)?;
        assert_eq!(recorder.len(), iterations);
        Ok(trainer.learner_steps())
    }

    #[test]
    fn test_kl_threshold_stops_chunk() -> Result<()> {
        // Any KL estimate exceeds a negative threshold, so only the first
        // mini-batch of each chunk is used.
        assert_eq!(learner_steps_with_threshold(-1.0, 3)?, 3);
        Ok(())
    }

    #[test]
    fn test_all_mini_batches_below_threshold() -> Result<()> {
        assert_eq!(learner_steps_with_threshold(f32::INFINITY, 3)?, 3 * 8);
        Ok(())
    }

    #[test]
    fn test_batch_indices_partition() {
        let mut rng = SmallRng::seed_from_u64(0);
        let batches = batch_indices(10, 4, 12, &mut rng);
        assert_eq!(batches.len(), 4);
        assert!(batches[..3].iter().all(|b| b.len() == 3));
        assert_eq!(batches[3].len(), 1);

        let all: HashSet<u32> = batches.iter().flatten().copied().collect();
        assert_eq!(all.len(), 10);
        assert!(all.iter().all(|&i| i < 10));
    }

    #[test]
    fn test_batch_indices_minimum_width() {
        let mut rng = SmallRng::seed_from_u64(0);
        let batches = batch_indices(3, 48, 10, &mut rng);
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.len() == 1));
    }

    #[test]
    fn test_counters_accumulate() {
        let mut counters = Counters::default();
        let chunk = || {
            let mut r = Record::from_scalar("count/samples", 8.0);
            r.insert_scalar("count/world", 2.0);
            r.insert_scalar("count/traj", 3.0);
            r
        };
        counters.chunk(chunk(), 0.0);
        let r = counters.chunk(chunk(), 2.0);
        assert_eq!(r.get_scalar("count/samples").unwrap(), 16.0);
        assert_eq!(r.get_scalar("count/traj").unwrap(), 6.0);
        assert_eq!(r.get_scalar("count/chunks").unwrap(), 2.0);
        assert_eq!(r.get_scalar("sample-rate/actor").unwrap(), 4.0);
    }
}
