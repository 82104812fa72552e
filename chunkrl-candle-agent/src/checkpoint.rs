//! Throttled checkpointing of agent parameters.
use crate::{agent::RecurrentAgent, model::RecurrentEncoder};
use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

/// Saves the agent under `{dir}/latest`, at most once per throttle interval.
///
/// Each parameter group is written to `{dir}/latest/{group}.safetensors`.
pub struct Checkpointer {
    dir: PathBuf,
    throttle: Duration,
    last: Option<Instant>,
}

impl Checkpointer {
    /// Creates a checkpointer writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>, throttle_secs: u64) -> Self {
        Self {
            dir: dir.into(),
            throttle: Duration::from_secs(throttle_secs),
            last: None,
        }
    }

    /// Directory of the latest checkpoint.
    pub fn latest_dir(&self) -> PathBuf {
        self.dir.join("latest")
    }

    /// Saves the agent unless the previous save is more recent than the throttle
    /// interval. Returns `true` if the agent was saved.
    pub fn store_latest<E>(&mut self, agent: &RecurrentAgent<E>) -> Result<bool>
    where
        E: RecurrentEncoder,
        E::Config: DeserializeOwned + Serialize,
    {
        if let Some(last) = self.last {
            if last.elapsed() < self.throttle {
                return Ok(false);
            }
        }
        agent.save(self.latest_dir())?;
        self.last = Some(Instant::now());
        info!("Saved checkpoint in {:?}", self.latest_dir());
        Ok(true)
    }

    /// Loads the latest checkpoint into `agent`, see [`Checkpointer::load`].
    pub fn load_latest<E>(&self, agent: &RecurrentAgent<E>) -> Result<()>
    where
        E: RecurrentEncoder,
        E::Config: DeserializeOwned + Serialize,
    {
        Self::load(agent, self.latest_dir())
    }

    /// Loads parameters saved in `path` into `agent`, leniently.
    ///
    /// Missing files, missing parameters and parameters with another shape are
    /// skipped with a warning; parameters unknown to the agent are ignored.
    pub fn load<E>(agent: &RecurrentAgent<E>, path: impl AsRef<Path>) -> Result<()>
    where
        E: RecurrentEncoder,
        E::Config: DeserializeOwned + Serialize,
    {
        for (group, varmap) in agent.varmaps() {
            let file = path.as_ref().join(format!("{}.safetensors", group));
            if !file.exists() {
                warn!("No parameters of {} in {:?}", group, path.as_ref());
                continue;
            }
            let tensors = candle_core::safetensors::load(&file, agent.device())?;
            let data = varmap
                .data()
                .lock()
                .map_err(|e| anyhow!("parameters of {} are poisoned: {}", group, e))?;

            for (name, var) in data.iter() {
                match tensors.get(name) {
                    Some(t) if t.dims() == var.dims() => var.set(&t.to_dtype(var.dtype())?)?,
                    Some(t) => warn!(
                        "Skipped {}/{}: shape {:?} in checkpoint, {:?} in agent",
                        group,
                        name,
                        t.dims(),
                        var.dims()
                    ),
                    None => warn!("Skipped {}/{}: missing in checkpoint", group, name),
                }
            }
            for name in tensors.keys().filter(|k| !data.contains_key(*k)) {
                debug!("Ignored unknown parameter {}/{}", group, name);
            }
        }
        info!("Load agent from {:?}", path.as_ref());
        Ok(())
    }
}
