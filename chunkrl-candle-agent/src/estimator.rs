//! Off-policy value targets and advantages over trajectory chunks.
//!
//! All functions take `[T, N]` tensors laid out like a [`Chunk`](crate::world::Chunk):
//! the reward, reset and terminal flags of step `t + 1` are the outcome of the
//! decision taken at step `t`. The recursions run backwards over time, one tensor
//! operation per step over all `N` instances. Outputs carry no gradient.
use anyhow::Result;
use candle_core::{DType, IndexOp, Tensor};
use chunkrl_core::error::ChunkError;

/// Importance weight `exp(new - old)` of the log-probabilities, clamped to `[lo, hi]`.
pub fn importance_ratio(new_logp: &Tensor, old_logp: &Tensor, (lo, hi): (f32, f32)) -> Result<Tensor> {
    Ok((new_logp - old_logp)?.exp()?.clamp(lo, hi)?)
}

struct Edges {
    reward: Tensor,
    not_reset: Tensor,
    not_terminal: Tensor,
}

fn edges(reward: &Tensor, reset: &Tensor, terminal: &Tensor) -> Result<Edges> {
    let not = |t: &Tensor| -> Result<Tensor> { Ok(t.to_dtype(DType::F32)?.affine(-1.0, 1.0)?) };
    Ok(Edges {
        reward: reward.to_dtype(DType::F32)?.detach(),
        not_reset: not(reset)?,
        not_terminal: not(terminal)?,
    })
}

fn n_steps(value: &Tensor) -> Result<usize> {
    let (n_steps, _) = value.dims2()?;
    if n_steps == 0 {
        return Err(ChunkError::ShapeMismatch("chunk without time steps".to_string()).into());
    }
    Ok(n_steps)
}

/// V-trace value targets.
///
/// The last step has no known future and takes its own value. For earlier steps
///
/// ```text
/// next      = reset[t+1] ? value[t+1] : target[t+1]
/// target[t] = value[t] + ratio[t] * (reward[t+1] + gamma * next * (1 - terminal[t+1]) - value[t])
/// ```
pub fn v_trace(
    ratio: &Tensor,
    value: &Tensor,
    reward: &Tensor,
    reset: &Tensor,
    terminal: &Tensor,
    gamma: f64,
) -> Result<Tensor> {
    let n_steps = n_steps(value)?;
    let ratio = ratio.detach();
    let value = value.detach();
    let e = edges(reward, reset, terminal)?;

    let mut targets = vec![value.i(n_steps - 1)?];
    for t in (0..n_steps - 1).rev() {
        let v = value.i(t)?;
        let v_next = value.i(t + 1)?;
        let target_next = &targets[targets.len() - 1];
        let not_reset = e.not_reset.i(t + 1)?;

        // Restart from the value estimate across an episode boundary.
        let next = ((target_next * &not_reset)? + (v_next * not_reset.affine(-1.0, 1.0)?)?)?;
        let bootstrap = ((next * e.not_terminal.i(t + 1)?)? * gamma)?;
        let delta = ((e.reward.i(t + 1)? + bootstrap)? - &v)?;
        let target = (v + (ratio.i(t)? * delta)?)?;
        targets.push(target);
    }
    targets.reverse();

    Ok(Tensor::stack(&targets, 0)?)
}

/// Generalized advantage estimates with trace decay `lambda`.
///
/// ```text
/// adv[T-1] = 0
/// delta[t] = reward[t+1] + gamma * (1 - terminal[t+1]) * value[t+1] - value[t]
/// adv[t]   = delta[t] + gamma * lambda * (1 - reset[t+1]) * adv[t+1]
/// ```
pub fn generalized_advantages(
    value: &Tensor,
    reward: &Tensor,
    reset: &Tensor,
    terminal: &Tensor,
    gamma: f64,
    lambda: f64,
) -> Result<Tensor> {
    let n_steps = n_steps(value)?;
    let value = value.detach();
    let e = edges(reward, reset, terminal)?;

    let mut advs = vec![value.i(n_steps - 1)?.zeros_like()?];
    for t in (0..n_steps - 1).rev() {
        let adv_next = &advs[advs.len() - 1];
        let bootstrap = ((value.i(t + 1)? * e.not_terminal.i(t + 1)?)? * gamma)?;
        let delta = ((e.reward.i(t + 1)? + bootstrap)? - value.i(t)?)?;
        let carry = ((adv_next * e.not_reset.i(t + 1)?)? * (gamma * lambda))?;
        advs.push((delta + carry)?);
    }
    advs.reverse();

    Ok(Tensor::stack(&advs, 0)?)
}

/// Standardizes `x` with its mean and unbiased standard deviation.
pub fn normalize(x: &Tensor, eps: f64) -> Result<Tensor> {
    let n = x.elem_count();
    let mean = x.mean_all()?;
    let centered = x.broadcast_sub(&mean)?;
    let var = (centered.sqr()?.sum_all()? / (n.max(2) - 1) as f64)?;
    let std = var.sqrt()?;
    Ok(centered.broadcast_div(&(std + eps)?)?)
}

/// Unbiased standard deviation of all elements.
pub fn std_all(x: &Tensor) -> Result<f32> {
    let n = x.elem_count();
    let centered = x.broadcast_sub(&x.mean_all()?)?;
    let var = (centered.sqr()?.sum_all()? / (n.max(2) - 1) as f64)?;
    Ok(var.sqrt()?.to_scalar::<f32>()?)
}
