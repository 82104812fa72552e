//! Environment.
use super::{ActionSpace, DiscreteAct, ObservationSpace, World};
use crate::record::Record;
use anyhow::Result;

/// Represents a vectorized environment, i.e., `n_envs` instances of an MDP
/// stepped together.
///
/// Every [`World`] returned by [`Env::reset`] and [`Env::step`] is aligned on the
/// instance axis: its `obs`, `reward`, `reset` and `terminal` fields all have
/// `n_envs` rows. An instance that finishes an episode is reset by the environment
/// itself, and the world returned for that step already carries the first
/// observation of the next episode with `reset` set.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Shape of the observation of a single instance.
    fn observation_space(&self) -> &ObservationSpace;

    /// Cardinality of the actions of a single instance.
    fn action_space(&self) -> &ActionSpace;

    /// The number of parallel instances.
    fn n_envs(&self) -> usize;

    /// Resets all instances.
    fn reset(&mut self) -> Result<World>;

    /// Performs an environment step for all instances.
    ///
    /// The returned [`Record`] carries environment specific telemetry.
    fn step(&mut self, act: &DiscreteAct) -> Result<(World, Record)>;
}
