//! Recurrent actor-learner training in Rust.
//!
//! chunkrl consists of the following crates:
//!
//! * [chunkrl-core](chunkrl_core) defines the vectorized [`Env`](chunkrl_core::Env)
//!   trait, the record types used for telemetry, the trainer configuration and
//!   finite-state-machine environments for testing learners.
//! * [chunkrl-tensorboard](chunkrl_tensorboard) has `TensorboardRecorder` to write
//!   records which can be shown in Tensorboard.
//! * [chunkrl-candle-agent](chunkrl_candle_agent) implements the recurrent agent, the
//!   V-trace and GAE estimators, the clipped policy-gradient update and the
//!   actor-learner loop with [candle](https://crates.io/crates/candle-core).
//!
//! This crate re-exports them and holds the examples.
pub use chunkrl_candle_agent as agent;
pub use chunkrl_core as core;
pub use chunkrl_tensorboard as tensorboard;
