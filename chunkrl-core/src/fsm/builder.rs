//! Fluent construction of FSM tables.
use super::{FsmState, FsmTable};
use crate::error::ChunkError;

/// Builds an [`FsmTable`] state by state.
///
/// States are kept in declaration order. Transitions may refer to states declared
/// later; they are resolved by [`StateBuilder::build`].
#[derive(Debug, Default)]
pub struct FsmBuilder {
    states: Vec<FsmState>,
}

impl FsmBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts or resumes declaring the state `name`.
    pub fn state(mut self, name: impl Into<String>) -> StateBuilder {
        let name = name.into();
        let ix = match self.states.iter().position(|s| s.name == name) {
            Some(ix) => ix,
            None => {
                self.states.push(FsmState::new(name, false, vec![], vec![]));
                self.states.len() - 1
            }
        };
        StateBuilder { builder: self, ix }
    }

    /// Validates and returns the table.
    pub fn build(self) -> Result<FsmTable, ChunkError> {
        let table = FsmTable::new(self.states);
        table.validate()?;
        Ok(table)
    }
}

/// Declares a single state of an [`FsmBuilder`].
#[derive(Debug)]
pub struct StateBuilder {
    builder: FsmBuilder,
    ix: usize,
}

impl StateBuilder {
    fn current(&mut self) -> &mut FsmState {
        &mut self.builder.states[self.ix]
    }

    /// Sets the observation of the state.
    pub fn obs(mut self, obs: &[f32]) -> Self {
        self.current().obs = obs.to_vec();
        self
    }

    /// Appends a transition for the next action index.
    pub fn to(mut self, next: impl Into<String>, reward: f32) -> Self {
        self.current().transitions.push((next.into(), reward));
        self
    }

    /// Marks the state as terminal.
    pub fn terminal(mut self) -> Self {
        self.current().terminal = true;
        self
    }

    /// Starts or resumes declaring another state.
    pub fn state(self, name: impl Into<String>) -> StateBuilder {
        self.builder.state(name)
    }

    /// Validates and returns the table.
    pub fn build(self) -> Result<FsmTable, ChunkError> {
        self.builder.build()
    }
}
