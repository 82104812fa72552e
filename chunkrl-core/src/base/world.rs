//! Host-side world state and actions.
use crate::error::ChunkError;

/// Per-instance outcome of a reset or a step of a vectorized environment.
///
/// Flags use `i8` with `1` for true.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    /// Observations, row-major `[n_envs, obs_dim]`.
    pub obs: Vec<f32>,

    /// Length of the observation of a single instance.
    pub obs_dim: usize,

    /// Reward received on arriving at this world.
    pub reward: Vec<f32>,

    /// Flag denoting that this step begins a new episode.
    pub reset: Vec<i8>,

    /// Flag denoting that the previous episode reached a true terminal state.
    pub terminal: Vec<i8>,
}

impl World {
    /// Constructs a [`World`], checking that all fields are aligned on the instance axis.
    pub fn new(
        obs: Vec<f32>,
        obs_dim: usize,
        reward: Vec<f32>,
        reset: Vec<i8>,
        terminal: Vec<i8>,
    ) -> Result<Self, ChunkError> {
        let n = reward.len();
        if reset.len() != n || terminal.len() != n || obs.len() != n * obs_dim {
            return Err(ChunkError::ShapeMismatch(format!(
                "world with {} rewards, {} resets, {} terminals and {} obs values of dim {}",
                n,
                reset.len(),
                terminal.len(),
                obs.len(),
                obs_dim
            )));
        }
        Ok(Self {
            obs,
            obs_dim,
            reward,
            reset,
            terminal,
        })
    }

    /// The number of environment instances.
    pub fn n_envs(&self) -> usize {
        self.reward.len()
    }

    /// Observation of the `i`-th instance.
    pub fn obs_of(&self, i: usize) -> &[f32] {
        &self.obs[i * self.obs_dim..(i + 1) * self.obs_dim]
    }

    /// Returns `true` if the `i`-th instance has just been reset.
    pub fn is_reset(&self, i: usize) -> bool {
        self.reset[i] == 1
    }

    /// Returns `true` if the `i`-th instance has just left a terminal state.
    pub fn is_terminal(&self, i: usize) -> bool {
        self.terminal[i] == 1
    }
}

/// Multi-discrete actions for all instances, row-major `[n_envs, n_heads]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteAct {
    act: Vec<u32>,
    n_heads: usize,
}

impl DiscreteAct {
    /// Constructs actions from a flat vector.
    pub fn new(act: Vec<u32>, n_heads: usize) -> Result<Self, ChunkError> {
        if n_heads == 0 || act.len() % n_heads != 0 {
            return Err(ChunkError::ShapeMismatch(format!(
                "{} actions do not split into {} heads",
                act.len(),
                n_heads
            )));
        }
        Ok(Self { act, n_heads })
    }

    /// Constructs single-head actions, one per instance.
    pub fn single(act: Vec<u32>) -> Self {
        Self { act, n_heads: 1 }
    }

    /// The number of environment instances.
    pub fn len(&self) -> usize {
        self.act.len() / self.n_heads
    }

    /// Returns `true` if there is no action.
    pub fn is_empty(&self) -> bool {
        self.act.is_empty()
    }

    /// The number of action heads.
    pub fn n_heads(&self) -> usize {
        self.n_heads
    }

    /// Action of the `head`-th head of the `i`-th instance.
    pub fn get(&self, i: usize, head: usize) -> usize {
        self.act[i * self.n_heads + head] as usize
    }

    /// Actions of all heads of the `i`-th instance.
    pub fn heads(&self, i: usize) -> &[u32] {
        &self.act[i * self.n_heads..(i + 1) * self.n_heads]
    }
}
