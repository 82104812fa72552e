//! LSTM encoder.
use crate::model::{EncoderConfig, HiddenState, RecurrentEncoder};
use anyhow::Result;
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{linear, ops::sigmoid, Linear, Module, VarBuilder};
use log::warn;
use serde::{Deserialize, Serialize};

/// Configuration of [`LstmEncoder`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct LstmEncoderConfig {
    /// Length of the observation vector. Zero feeds a constant unit input.
    pub in_dim: usize,

    /// Width of the intake layer and of the LSTM state.
    pub width: usize,
}

impl Default for LstmEncoderConfig {
    fn default() -> Self {
        Self {
            in_dim: 0,
            width: 256,
        }
    }
}

impl LstmEncoderConfig {
    /// Creates configuration of the encoder.
    pub fn new(in_dim: usize, width: usize) -> Self {
        Self { in_dim, width }
    }
}

impl EncoderConfig for LstmEncoderConfig {
    fn in_dim(&self) -> usize {
        self.in_dim
    }

    fn set_in_dim(&mut self, v: usize) {
        self.in_dim = v;
    }

    fn width(&self) -> usize {
        self.width
    }

    fn set_width(&mut self, v: usize) {
        self.width = v;
    }
}

/// A linear+ReLU intake followed by a single LSTM layer.
pub struct LstmEncoder {
    config: LstmEncoderConfig,
    device: Device,
    intake: Linear,
    ih: Linear,
    hh: Linear,
    state: HiddenState,
}

impl LstmEncoder {
    /// The stored `(h, c)` if it holds `batch` rows. A non-empty state of another
    /// size is reported and not used.
    fn stored_state(&self, batch: usize) -> Option<(Tensor, Tensor)> {
        match (&self.state.0[..], self.state.n_envs()) {
            ([h, c], Some(n)) if n == batch => Some((h.clone(), c.clone())),
            ([], _) => None,
            (_, n) => {
                warn!(
                    "LSTM state of {} tensors for {:?} instances ignored for a batch of {}",
                    self.state.0.len(),
                    n,
                    batch
                );
                None
            }
        }
    }

    fn initial_state(&self, batch: usize) -> Result<(Tensor, Tensor)> {
        match self.stored_state(batch) {
            Some(hc) => Ok(hc),
            None => {
                let zeros = Tensor::zeros((batch, self.config.width), DType::F32, &self.device)?;
                Ok((zeros.clone(), zeros))
            }
        }
    }

    fn cell(&self, x: &Tensor, h: &Tensor, c: &Tensor) -> Result<(Tensor, Tensor)> {
        let gates = (self.ih.forward(x)? + self.hh.forward(h)?)?;
        let gates = gates.chunk(4, 1)?;
        let i = sigmoid(&gates[0])?;
        let f = sigmoid(&gates[1])?;
        let g = gates[2].tanh()?;
        let o = sigmoid(&gates[3])?;
        let c = ((f * c)? + (i * g)?)?;
        let h = (o * c.tanh()?)?;
        Ok((h, c))
    }
}

impl RecurrentEncoder for LstmEncoder {
    type Config = LstmEncoderConfig;

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vb.device().clone();
        let width = config.width;
        let intake = linear(config.in_dim.max(1), width, vb.pp("intake"))?;
        let ih = linear(width, 4 * width, vb.pp("lstm_ih"))?;
        let hh = linear(width, 4 * width, vb.pp("lstm_hh"))?;
        Ok(Self {
            config,
            device,
            intake,
            ih,
            hh,
            state: HiddenState::default(),
        })
    }

    fn forward(&mut self, obs: &Tensor, reset: &Tensor) -> Result<Tensor> {
        let (n_steps, batch) = reset.dims2()?;
        let x = match self.config.in_dim {
            0 => Tensor::ones((n_steps, batch, 1), DType::F32, &self.device)?,
            _ => obs.to_device(&self.device)?,
        };
        let x = self.intake.forward(&x)?.relu()?;
        let keep = reset
            .to_device(&self.device)?
            .to_dtype(DType::F32)?
            .affine(-1.0, 1.0)?;

        let (mut h, mut c) = self.initial_state(batch)?;
        let mut outs = Vec::with_capacity(n_steps);
        for t in 0..n_steps {
            let k = keep.i(t)?.unsqueeze(1)?;
            h = h.broadcast_mul(&k)?;
            c = c.broadcast_mul(&k)?;
            (h, c) = self.cell(&x.i(t)?, &h, &c)?;
            outs.push(h.clone());
        }
        self.state = HiddenState(vec![h.detach(), c.detach()]);

        Ok(Tensor::stack(&outs, 0)?)
    }

    fn state(&self) -> HiddenState {
        self.state.clone()
    }

    fn set_state(&mut self, state: HiddenState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::VarMap;

    fn encoder(in_dim: usize) -> Result<(VarMap, LstmEncoder)> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let enc = LstmEncoder::build(vb, LstmEncoderConfig::new(in_dim, 8))?;
        Ok((varmap, enc))
    }

    #[test]
    fn test_shapes_and_state() -> Result<()> {
        let (_vm, mut enc) = encoder(3)?;
        let obs = Tensor::rand(0f32, 1f32, (5, 2, 3), &Device::Cpu)?;
        let reset = Tensor::zeros((5, 2), DType::U8, &Device::Cpu)?;
        let y = enc.forward(&obs, &reset)?;
        assert_eq!(y.dims(), &[5, 2, 8]);
        assert_eq!(enc.state().n_envs(), Some(2));
        assert_eq!(enc.state().0.len(), 2);

        enc.clear_state();
        assert!(enc.state().is_empty());
        Ok(())
    }

    #[test]
    fn test_empty_observation() -> Result<()> {
        let (_vm, mut enc) = encoder(0)?;
        let obs = Tensor::zeros((2, 4, 1), DType::F32, &Device::Cpu)?;
        let reset = Tensor::ones((2, 4), DType::U8, &Device::Cpu)?;
        let y = enc.forward(&obs, &reset)?;
        assert_eq!(y.dims(), &[2, 4, 8]);
        Ok(())
    }

    #[test]
    fn test_batch_size_change_uses_zero_state() -> Result<()> {
        let (_vm, mut enc) = encoder(1)?;
        let obs = Tensor::ones((1, 3, 1), DType::F32, &Device::Cpu)?;
        let no_reset = Tensor::zeros((1, 3), DType::U8, &Device::Cpu)?;
        let fresh = enc.forward(&obs, &no_reset)?;

        // A stale state of another batch size is ignored.
        let obs2 = Tensor::ones((1, 2, 1), DType::F32, &Device::Cpu)?;
        let y = enc.forward(&obs2, &Tensor::zeros((1, 2), DType::U8, &Device::Cpu)?)?;
        let fresh2 = fresh.narrow(1, 0, 2)?;
        let diff = (y - fresh2)?.abs()?.max_all()?.to_scalar::<f32>()?;
        assert!(diff < 1e-6);
        Ok(())
    }

    #[test]
    fn test_stored_state_must_fit_batch() -> Result<()> {
        let (_vm, mut enc) = encoder(1)?;
        assert!(enc.stored_state(3).is_none());

        let obs = Tensor::ones((2, 3, 1), DType::F32, &Device::Cpu)?;
        enc.forward(&obs, &Tensor::zeros((2, 3), DType::U8, &Device::Cpu)?)?;
        assert!(enc.stored_state(3).is_some());
        assert!(enc.stored_state(2).is_none());

        // A state sliced to two instances fits only a batch of two.
        let ix = Tensor::new(&[0u32, 2], &Device::Cpu)?;
        enc.set_state(enc.state().select(&ix)?);
        assert!(enc.stored_state(2).is_some());
        assert!(enc.stored_state(3).is_none());
        Ok(())
    }
}
