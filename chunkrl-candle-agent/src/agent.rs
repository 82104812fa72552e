//! Recurrent policy/value agent.
//!
//! The agent holds two independently parameterized networks, each a
//! [`RecurrentEncoder`](crate::model::RecurrentEncoder) followed by a linear head:
//! the policy network produces normalized log-probabilities over every action head
//! and the value network produces a scalar state value.
mod base;
mod config;
mod network;
mod state;
pub use base::RecurrentAgent;
pub use config::AgentConfig;
pub use state::{AgentState, StateGuard};
