#![warn(missing_docs)]
//! Core of chunkrl, a recurrent actor-learner for vectorized environments.
//!
//! This crate holds everything that does not depend on a tensor backend:
//! the [`Env`] trait with its spaces and host-side [`World`], finite-state-machine
//! environments for testing in [`fsm`], telemetry in [`record`], and the loop
//! configuration [`TrainerConfig`].
pub mod error;
pub mod fsm;
pub mod record;

mod base;
pub use base::{ActionSpace, DiscreteAct, Env, ObservationSpace, World};

mod trainer;
pub use trainer::TrainerConfig;
