use crate::model::{EncoderConfig, RecurrentEncoder};
use anyhow::Result;
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{linear, Linear, Module, VarBuilder, VarMap};
use log::info;
use std::path::Path;

/// A recurrent encoder and a linear head sharing one [`VarMap`].
pub(super) struct Network<E> {
    varmap: VarMap,
    encoder: E,
    head: Linear,
}

impl<E: RecurrentEncoder> Network<E> {
    pub fn build(config: E::Config, out_dim: usize, device: &Device) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let width = config.width();
        let encoder = E::build(vb.pp("encoder"), config)?;
        let head = linear(width, out_dim, vb.pp("head"))?;
        Ok(Self {
            varmap,
            encoder,
            head,
        })
    }

    /// `[T, B, d]` observations to `[T, B, out_dim]` outputs.
    pub fn forward(&mut self, obs: &Tensor, reset: &Tensor) -> Result<Tensor> {
        let xs = self.encoder.forward(obs, reset)?;
        Ok(self.head.forward(&xs)?)
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn encoder_mut(&mut self) -> &mut E {
        &mut self.encoder
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    pub fn vars(&self) -> Vec<Var> {
        self.varmap.all_vars()
    }

    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save network to {:?}", path.as_ref());
        Ok(())
    }

    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load network from {:?}", path.as_ref());
        Ok(())
    }
}
