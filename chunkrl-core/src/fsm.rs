//! Finite-state-machine environments for testing learners.
//!
//! An FSM is declared as an ordered table of named states. Each state has a terminal
//! flag, an observation vector and one transition `(next_state, reward)` per action.
//! The first declared state is the initial state. Instances landing in a terminal
//! state are sent back to the initial state on the same step, with both `reset` and
//! `terminal` raised.
//!
//! Tables are written either directly as [`FsmTable`] or with [`FsmBuilder`]:
//!
//! ```rust
//! use chunkrl_core::fsm::{FsmBuilder, FsmEnv};
//!
//! let table = FsmBuilder::new()
//!     .state("start").obs(&[0.0]).to("end", 0.0).to("end", 1.0)
//!     .state("end").obs(&[1.0]).to("end", 0.0).to("end", 0.0).terminal()
//!     .build()
//!     .unwrap();
//! let env = FsmEnv::new(table, 4).unwrap();
//! assert_eq!(env.to_string(), "FsmEnv(2s2a)");
//! ```
mod builder;
mod env;
mod presets;
mod table;

pub use builder::{FsmBuilder, StateBuilder};
pub use env::{FsmEnv, FsmEnvConfig};
pub use presets::{chain, coin_flip, unit_reward};
pub use table::{FsmState, FsmTable};
