//! Clipped policy-gradient update with V-trace value targets.
mod base;
mod config;
pub use base::{log_prob, optimize};
pub use config::PpoConfig;
