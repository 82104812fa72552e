//! Observation and action spaces.
use serde::{Deserialize, Serialize};

/// Observation of a single environment instance, a flat vector of `dim` values.
///
/// `dim` can be zero for environments without any observation.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct ObservationSpace {
    /// Length of the observation vector.
    pub dim: usize,
}

impl ObservationSpace {
    /// Constructs an observation space of vectors with length `dim`.
    pub fn vector(dim: usize) -> Self {
        Self { dim }
    }

    /// Returns `true` if the environment emits no observation.
    pub fn is_empty(&self) -> bool {
        self.dim == 0
    }
}

/// Multi-discrete actions: `n_heads` independent choices among `n_actions`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct ActionSpace {
    /// The number of independent action heads.
    pub n_heads: usize,

    /// The number of choices of each head.
    pub n_actions: usize,
}

impl ActionSpace {
    /// Constructs a multi-discrete action space.
    pub fn multi_discrete(n_heads: usize, n_actions: usize) -> Self {
        Self { n_heads, n_actions }
    }

    /// The total number of logits needed to parameterize the distribution.
    pub fn n_logits(&self) -> usize {
        self.n_heads * self.n_actions
    }
}
