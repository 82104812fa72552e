//! Interface of recurrent networks used by the agent.
use anyhow::Result;
use candle_core::Tensor;
use candle_nn::VarBuilder;

/// Per-instance hidden state of a recurrent network.
///
/// Each tensor is `[N, width]`, for example `[h, c]` for an LSTM. An empty state
/// means the network starts from zeros on its next input.
#[derive(Debug, Clone, Default)]
pub struct HiddenState(pub Vec<Tensor>);

impl HiddenState {
    /// Returns `true` if there is no stored state.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of instances the state is held for.
    pub fn n_envs(&self) -> Option<usize> {
        self.0.first().map(|t| t.dims()[0])
    }

    /// Selects instances by index.
    pub fn select(&self, ix: &Tensor) -> Result<Self> {
        let ts = self
            .0
            .iter()
            .map(|t| t.index_select(ix, 0))
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Self(ts))
    }

    /// Cuts the state from the computation graph.
    pub fn detach(&self) -> Self {
        Self(self.0.iter().map(|t| t.detach()).collect())
    }
}

/// Configuration of a [`RecurrentEncoder`].
pub trait EncoderConfig {
    /// Length of the observation vector.
    fn in_dim(&self) -> usize;

    /// Sets the length of the observation vector.
    fn set_in_dim(&mut self, v: usize);

    /// Width of the output features.
    fn width(&self) -> usize;

    /// Sets the width of the output features.
    fn set_width(&mut self, v: usize);
}

/// A recurrent network mapping observation sequences to feature sequences.
///
/// The network owns the hidden state carried between calls of
/// [`RecurrentEncoder::forward`], but not its parameters, which live in the
/// [`VarMap`] behind the [`VarBuilder`] it was built with.
///
/// [`VarMap`]: candle_nn::VarMap
pub trait RecurrentEncoder {
    /// Configuration from which the encoder is constructed.
    type Config: EncoderConfig + Clone;

    /// Builds the encoder with [`VarBuilder`] and its configuration.
    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Encodes `obs` `[T, B, d]` into features `[T, B, width]`.
    ///
    /// Rows flagged in `reset` `[T, B]` start from a zero hidden state at that step.
    /// The state after the last step is stored, cut from the graph.
    fn forward(&mut self, obs: &Tensor, reset: &Tensor) -> Result<Tensor>;

    /// The stored hidden state.
    fn state(&self) -> HiddenState;

    /// Replaces the stored hidden state.
    fn set_state(&mut self, state: HiddenState);

    /// Forgets the stored hidden state.
    fn clear_state(&mut self) {
        self.set_state(HiddenState::default());
    }
}
