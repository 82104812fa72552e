//! Tensor forms of worlds, decisions and trajectory chunks.
//!
//! Every tensor here has the environment axis last among its leading axes: a single
//! step has shape `[N, ...]` and a chunk has shape `[T, N, ...]`.
use anyhow::Result;
use candle_core::{Device, Tensor};
use chunkrl_core::{error::ChunkError, DiscreteAct, World};

/// World state of all environment instances on the device.
///
/// `obs` is `[.., N, d_obs]` f32, `reward` is `[.., N]` f32, `reset` and `terminal`
/// are `[.., N]` u8. Environments without observations get a single zero feature.
#[derive(Debug, Clone)]
pub struct WorldState {
    /// Observations.
    pub obs: Tensor,

    /// Reward received on arriving at this world.
    pub reward: Tensor,

    /// This step begins a new episode.
    pub reset: Tensor,

    /// The previous episode reached a true terminal state.
    pub terminal: Tensor,
}

fn flags(v: &[i8], device: &Device) -> Result<Tensor> {
    let v: Vec<u8> = v.iter().map(|&f| (f != 0) as u8).collect();
    let n = v.len();
    Ok(Tensor::from_vec(v, n, device)?)
}

impl WorldState {
    /// Moves a host-side [`World`] to `device`.
    pub fn from_world(world: &World, device: &Device) -> Result<Self> {
        let n = world.n_envs();
        let obs = match world.obs_dim {
            0 => Tensor::zeros((n, 1), candle_core::DType::F32, device)?,
            d => Tensor::from_slice(&world.obs, (n, d), device)?,
        };
        Ok(Self {
            obs,
            reward: Tensor::from_slice(&world.reward, n, device)?,
            reset: flags(&world.reset, device)?,
            terminal: flags(&world.terminal, device)?,
        })
    }

    fn env_axis(&self) -> usize {
        self.reward.rank() - 1
    }

    /// The number of environment instances.
    pub fn n_envs(&self) -> usize {
        self.reward.dims()[self.env_axis()]
    }

    /// Selects environment instances by index.
    pub fn select_envs(&self, ix: &Tensor) -> Result<Self> {
        let axis = self.env_axis();
        Ok(Self {
            obs: self.obs.index_select(ix, axis)?,
            reward: self.reward.index_select(ix, axis)?,
            reset: self.reset.index_select(ix, axis)?,
            terminal: self.terminal.index_select(ix, axis)?,
        })
    }

    /// Stacks states along a new leading time axis.
    pub fn stack(ws: &[&WorldState]) -> Result<Self> {
        let field = |f: fn(&WorldState) -> &Tensor| -> Result<Tensor> {
            let ts: Vec<&Tensor> = ws.iter().map(|w| f(w)).collect();
            Ok(Tensor::stack(&ts, 0)?)
        };
        Ok(Self {
            obs: field(|w| &w.obs)?,
            reward: field(|w| &w.reward)?,
            reset: field(|w| &w.reset)?,
            terminal: field(|w| &w.terminal)?,
        })
    }
}

/// Output of the agent for a world state.
///
/// `logits` is `[.., N, H, A]` normalized log-probabilities, `actions` is
/// `[.., N, H]` u32 and `value` is `[.., N]`.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Log-probabilities of each action of each head.
    pub logits: Tensor,

    /// Sampled or greedy actions, present if requested.
    pub actions: Option<Tensor>,

    /// State-value estimates, present if requested.
    pub value: Option<Tensor>,
}

impl Decision {
    /// Returns the actions or [`ChunkError::MissingDecisionField`].
    pub fn actions(&self) -> Result<&Tensor, ChunkError> {
        self.actions
            .as_ref()
            .ok_or(ChunkError::MissingDecisionField("actions"))
    }

    /// Returns the values or [`ChunkError::MissingDecisionField`].
    pub fn value(&self) -> Result<&Tensor, ChunkError> {
        self.value
            .as_ref()
            .ok_or(ChunkError::MissingDecisionField("value"))
    }

    /// Copies the actions of a single step to the host.
    pub fn to_act(&self) -> Result<DiscreteAct> {
        let actions = self.actions()?;
        let (_, n_heads) = actions.dims2()?;
        let flat = actions.flatten_all()?.to_vec1::<u32>()?;
        Ok(DiscreteAct::new(flat, n_heads)?)
    }

    /// Cuts all tensors from the computation graph.
    pub fn detach(&self) -> Self {
        Self {
            logits: self.logits.detach(),
            actions: self.actions.as_ref().map(|t| t.detach()),
            value: self.value.as_ref().map(|t| t.detach()),
        }
    }

    /// Selects environment instances by index.
    pub fn select_envs(&self, ix: &Tensor) -> Result<Self> {
        // logits carry two trailing axes
        let axis = self.logits.rank() - 3;
        let select = |t: &Option<Tensor>| -> Result<Option<Tensor>> {
            Ok(match t {
                Some(t) => Some(t.index_select(ix, axis)?),
                None => None,
            })
        };
        Ok(Self {
            logits: self.logits.index_select(ix, axis)?,
            actions: select(&self.actions)?,
            value: select(&self.value)?,
        })
    }

    /// Stacks decisions along a new leading time axis.
    ///
    /// An optional field is kept only if every decision carries it.
    pub fn stack(ds: &[&Decision]) -> Result<Self> {
        let logits: Vec<&Tensor> = ds.iter().map(|d| &d.logits).collect();
        let optional = |f: fn(&Decision) -> Option<&Tensor>| -> Result<Option<Tensor>> {
            let ts: Option<Vec<&Tensor>> = ds.iter().map(|d| f(d)).collect();
            Ok(match ts {
                Some(ts) => Some(Tensor::stack(&ts, 0)?),
                None => None,
            })
        };
        Ok(Self {
            logits: Tensor::stack(&logits, 0)?,
            actions: optional(|d| d.actions.as_ref())?,
            value: optional(|d| d.value.as_ref())?,
        })
    }
}

/// A world state paired with the decision taken on it.
#[derive(Debug, Clone)]
pub struct Transition {
    /// The world the decision was made on.
    pub world: WorldState,

    /// The decision.
    pub decision: Decision,
}

/// A stacked sequence of [`Transition`]s, `[T, N, ...]`.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// World states.
    pub world: WorldState,

    /// Decisions of the behavior policy.
    pub decision: Decision,
}

impl Chunk {
    /// Stacks transitions along a new leading time axis.
    pub fn stack(transitions: &[Transition]) -> Result<Self> {
        if transitions.is_empty() {
            return Err(ChunkError::EmptyBuffer.into());
        }
        let worlds: Vec<&WorldState> = transitions.iter().map(|t| &t.world).collect();
        let decisions: Vec<&Decision> = transitions.iter().map(|t| &t.decision).collect();
        Ok(Self {
            world: WorldState::stack(&worlds)?,
            decision: Decision::stack(&decisions)?,
        })
    }

    /// The number of time steps `T`.
    pub fn n_steps(&self) -> usize {
        self.world.reward.dims()[0]
    }

    /// The number of environment instances `N`.
    pub fn n_envs(&self) -> usize {
        self.world.n_envs()
    }

    /// Selects environment instances by index, keeping the time axis.
    pub fn select_envs(&self, ix: &Tensor) -> Result<Self> {
        Ok(Self {
            world: self.world.select_envs(ix)?,
            decision: self.decision.select_envs(ix)?,
        })
    }
}
