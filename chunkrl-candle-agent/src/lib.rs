#![warn(missing_docs)]
//! Recurrent actor-learner implemented with [candle](https://crates.io/crates/candle-core).
//!
//! The agent ([`agent::RecurrentAgent`]) is trained by the actor-learner loop in
//! [`trainer`]: trajectory chunks are collected from a vectorized
//! [`Env`](chunkrl_core::Env) ([`collect`]), returns and advantages are estimated
//! with V-trace and GAE ([`estimator`]) and the agent is updated with a clipped
//! policy-gradient step ([`ppo`]).
pub mod agent;
pub mod checkpoint;
pub mod collect;
pub mod estimator;
pub mod evaluate;
pub mod lstm;
pub mod model;
pub mod opt;
pub mod ppo;
pub mod trainer;
pub mod util;
pub mod world;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The GPU device with the given ordinal.
    Cuda(usize),
}

impl TryFrom<Device> for candle_core::Device {
    type Error = candle_core::Error;

    fn try_from(device: Device) -> Result<Self, Self::Error> {
        match device {
            Device::Cpu => Ok(candle_core::Device::Cpu),
            Device::Cuda(n) => candle_core::Device::new_cuda(n),
        }
    }
}
