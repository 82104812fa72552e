//! Core functionalities.
mod env;
mod space;
mod world;
pub use env::Env;
pub use space::{ActionSpace, ObservationSpace};
pub use world::{DiscreteAct, World};
