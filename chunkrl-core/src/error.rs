//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, PartialEq)]
pub enum ChunkError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// An FSM table without any state.
    #[error("FSM table has no states")]
    EmptyFsm,

    /// States of an FSM table declare observations of different lengths.
    #[error("State '{state}' has observation dimension {found}, expected {expected}")]
    InconsistentObsDim {
        /// Name of the offending state.
        state: String,
        /// Dimension of the first declared state.
        expected: usize,
        /// Dimension of the offending state.
        found: usize,
    },

    /// States of an FSM table declare different numbers of actions.
    #[error("State '{state}' has {found} actions, expected {expected}")]
    InconsistentActionCount {
        /// Name of the offending state.
        state: String,
        /// Action count of the first declared state.
        expected: usize,
        /// Action count of the offending state.
        found: usize,
    },

    /// An FSM table whose states have no outgoing transitions.
    #[error("FSM states must declare at least one action")]
    NoActions,

    /// A transition points at a state which is not declared.
    #[error("Transition from '{from}' targets undeclared state '{to}'")]
    UnknownState {
        /// Source of the transition.
        from: String,
        /// Undeclared target.
        to: String,
    },

    /// The chain environment needs at least two states.
    #[error("Chain needs at least 2 states, got {0}")]
    InvalidChainLength(usize),

    /// An action index is not valid for the environment.
    #[error("Action {action} is out of range for {n_actions} actions")]
    ActionOutOfRange {
        /// The given action.
        action: usize,
        /// The number of actions of the environment.
        n_actions: usize,
    },

    /// Data with an unexpected shape.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Stacking an empty trajectory buffer.
    #[error("Trajectory buffer is empty")]
    EmptyBuffer,

    /// A decision lacks a field required by the caller.
    #[error("Decision has no '{0}'")]
    MissingDecisionField(&'static str),
}
