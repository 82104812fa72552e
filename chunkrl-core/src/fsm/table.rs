//! Declarative FSM tables.
use crate::error::ChunkError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A state of an FSM.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FsmState {
    /// Name used by transitions to refer to the state.
    pub name: String,

    /// Landing in this state ends the episode.
    pub terminal: bool,

    /// Observation emitted while in this state.
    pub obs: Vec<f32>,

    /// `(next_state, reward)` for each action, indexed by action.
    pub transitions: Vec<(String, f32)>,
}

impl FsmState {
    /// Constructs a state.
    pub fn new(
        name: impl Into<String>,
        terminal: bool,
        obs: Vec<f32>,
        transitions: Vec<(String, f32)>,
    ) -> Self {
        Self {
            name: name.into(),
            terminal,
            obs,
            transitions,
        }
    }
}

/// An ordered table of FSM states. The first state is the initial state.
///
/// The table is plain data; [`FsmTable::compile`] validates it.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct FsmTable {
    /// States in declaration order.
    pub states: Vec<FsmState>,
}

/// Dense form of a validated [`FsmTable`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CompiledFsm {
    pub n_states: usize,
    pub n_actions: usize,
    pub obs_dim: usize,
    /// `[n_states]`
    pub terminal: Vec<bool>,
    /// `[n_states, obs_dim]`
    pub obs: Vec<f32>,
    /// `[n_states, n_actions]`
    pub next: Vec<usize>,
    /// `[n_states, n_actions]`
    pub reward: Vec<f32>,
}

impl FsmTable {
    /// Constructs a table from states in declaration order.
    pub fn new(states: Vec<FsmState>) -> Self {
        Self { states }
    }

    /// The number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` if the table has no state.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Checks the table: it must be non-empty, observation dimensions and action counts
    /// must agree across states, there must be at least one action and every
    /// transition must target a declared state.
    pub fn validate(&self) -> Result<(), ChunkError> {
        self.compile().map(|_| ())
    }

    pub(crate) fn compile(&self) -> Result<CompiledFsm, ChunkError> {
        let first = self.states.first().ok_or(ChunkError::EmptyFsm)?;
        let obs_dim = first.obs.len();
        let n_actions = first.transitions.len();
        if n_actions == 0 {
            return Err(ChunkError::NoActions);
        }

        let indices: HashMap<&str, usize> = self
            .states
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.as_str(), i))
            .collect();

        let n_states = self.states.len();
        let mut fsm = CompiledFsm {
            n_states,
            n_actions,
            obs_dim,
            terminal: Vec::with_capacity(n_states),
            obs: Vec::with_capacity(n_states * obs_dim),
            next: Vec::with_capacity(n_states * n_actions),
            reward: Vec::with_capacity(n_states * n_actions),
        };

        for state in self.states.iter() {
            if state.obs.len() != obs_dim {
                return Err(ChunkError::InconsistentObsDim {
                    state: state.name.clone(),
                    expected: obs_dim,
                    found: state.obs.len(),
                });
            }
            if state.transitions.len() != n_actions {
                return Err(ChunkError::InconsistentActionCount {
                    state: state.name.clone(),
                    expected: n_actions,
                    found: state.transitions.len(),
                });
            }
            fsm.terminal.push(state.terminal);
            fsm.obs.extend_from_slice(&state.obs);
            for (to, reward) in state.transitions.iter() {
                let ix = indices
                    .get(to.as_str())
                    .ok_or_else(|| ChunkError::UnknownState {
                        from: state.name.clone(),
                        to: to.clone(),
                    })?;
                fsm.next.push(*ix);
                fsm.reward.push(*reward);
            }
        }

        Ok(fsm)
    }
}
