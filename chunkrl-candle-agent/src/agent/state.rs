use super::RecurrentAgent;
use crate::model::{HiddenState, RecurrentEncoder};
use anyhow::Result;
use candle_core::Tensor;
use std::ops::{Deref, DerefMut};

/// Hidden states of both networks of the agent.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    /// State of the policy network.
    pub policy: HiddenState,

    /// State of the value network.
    pub value: HiddenState,
}

impl AgentState {
    /// Selects environment instances by index.
    pub fn select(&self, ix: &Tensor) -> Result<Self> {
        Ok(Self {
            policy: self.policy.select(ix)?,
            value: self.value.select(ix)?,
        })
    }
}

/// Exclusive access to an agent running on a substituted hidden state.
///
/// Created by [`RecurrentAgent::substitute_state`]. Dropping the guard puts back the
/// state the agent had before the substitution, also when unwinding or returning
/// early with `?`.
pub struct StateGuard<'a, E: RecurrentEncoder> {
    agent: &'a mut RecurrentAgent<E>,
    saved: AgentState,
}

impl<'a, E: RecurrentEncoder> StateGuard<'a, E> {
    pub(super) fn new(agent: &'a mut RecurrentAgent<E>, state: AgentState) -> Self {
        let saved = agent.state();
        agent.set_state(state);
        Self { agent, saved }
    }
}

impl<E: RecurrentEncoder> Deref for StateGuard<'_, E> {
    type Target = RecurrentAgent<E>;

    fn deref(&self) -> &Self::Target {
        self.agent
    }
}

impl<E: RecurrentEncoder> DerefMut for StateGuard<'_, E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.agent
    }
}

impl<E: RecurrentEncoder> Drop for StateGuard<'_, E> {
    fn drop(&mut self) {
        let saved = std::mem::take(&mut self.saved);
        self.agent.set_state(saved);
    }
}
