use super::PpoConfig;
use crate::{
    agent::RecurrentAgent,
    estimator::{generalized_advantages, importance_ratio, normalize, std_all, v_trace},
    model::RecurrentEncoder,
    util::clip_grad_norm,
    world::Chunk,
};
use anyhow::Result;
use candle_core::{Tensor, D};
use chunkrl_core::{
    record::{Record, RecordValue},
    ActionSpace,
};
use log::trace;
use serde::{de::DeserializeOwned, Serialize};

/// Log-probability of `actions` `[.., H]` under `logits` `[.., H, A]`, summed over heads.
pub fn log_prob(logits: &Tensor, actions: &Tensor) -> Result<Tensor> {
    let ix = actions.unsqueeze(D::Minus1)?.contiguous()?;
    let lp = logits.contiguous()?.gather(&ix, D::Minus1)?.squeeze(D::Minus1)?;
    Ok(lp.sum(D::Minus1)?)
}

fn scalar(t: &Tensor) -> Result<f32> {
    Ok(t.to_scalar::<f32>()?)
}

/// Entropy as a fraction of the entropy of uniform heads, `n_heads * ln(n_actions)`.
/// `None` when every head has a single action.
fn relative_entropy(neg_entropy: f32, space: &ActionSpace) -> Option<f32> {
    match space.n_actions {
        0 | 1 => None,
        a => Some(-neg_entropy / (space.n_heads as f32 * (a as f32).ln())),
    }
}

/// Updates the agent on a chunk of behavior data and returns the KL divergence
/// estimate `-mean(new - old)` with telemetry.
///
/// The agent runs the whole chunk from its current hidden state, so callers
/// usually install the state the chunk was collected from beforehand.
///
/// The loss is the clipped policy loss against normalized generalized advantages,
/// plus the clipped value loss against V-trace targets, plus the weighted negative
/// entropy. Gradients of the policy and the value network are clipped separately
/// before a single optimizer step.
pub fn optimize<E>(
    agent: &mut RecurrentAgent<E>,
    chunk: &Chunk,
    config: &PpoConfig,
) -> Result<(f32, Record)>
where
    E: RecurrentEncoder,
    E::Config: DeserializeOwned + Serialize,
{
    let w = &chunk.world;
    let d0 = &chunk.decision;
    let actions = d0.actions()?;
    let old_value = d0.value()?.detach();

    let d = agent.forward(w, false, true, false)?;
    let value = d.value()?;
    let old_logp = log_prob(&d0.logits, actions)?.detach();
    let new_logp = log_prob(&d.logits, actions)?;
    let ratio = importance_ratio(&new_logp, &old_logp, config.ratio_clamp)?;

    let v_target = v_trace(&ratio, value, &w.reward, &w.reset, &w.terminal, config.gamma)?;
    let vc = config.value_clip;
    let v_clipped = (&old_value + (value - &old_value)?.clamp(-vc, vc)?)?;
    let v_loss = (value - &v_target)?
        .sqr()?
        .maximum(&(v_clipped - &v_target)?.sqr()?)?
        .mean_all()?;
    let v_loss = (v_loss * 0.5)?;

    let adv = generalized_advantages(
        value,
        &w.reward,
        &w.reset,
        &w.terminal,
        config.gamma,
        config.trace_decay,
    )?;
    let normed_adv = normalize(&adv, config.adv_eps)?;
    let free_adv = (&ratio * &normed_adv)?;
    let clip_adv = (ratio.clamp(1.0 - config.clip, 1.0 + config.clip)? * &normed_adv)?;
    let p_loss = free_adv.minimum(&clip_adv)?.mean_all()?.neg()?;

    // over all heads and actions
    let flat_logits = d.logits.flatten_from(2)?;
    let h_loss = (flat_logits.exp()? * &flat_logits)?
        .sum(D::Minus1)?
        .mean_all()?;

    let loss = ((&v_loss + &p_loss)? + (&h_loss * config.entropy)?)?;

    let mut grads = loss.backward()?;
    let policy_norm = clip_grad_norm(&mut grads, &agent.policy_vars(), config.max_grad_norm)?;
    let value_norm = clip_grad_norm(&mut grads, &agent.value_vars(), config.max_grad_norm)?;
    agent.step(&grads)?;

    let kl = scalar(&(&new_logp - &old_logp)?.mean_all()?.neg()?)?;
    trace!("loss {}, kl {}", scalar(&loss)?, kl);

    let mut record = Record::from_slice(&[
        ("loss/value", RecordValue::Scalar(scalar(&v_loss)?)),
        ("loss/policy", RecordValue::Scalar(scalar(&p_loss)?)),
        ("loss/entropy", RecordValue::Scalar(scalar(&h_loss)?)),
        ("kl-div", RecordValue::Scalar(kl)),
        ("v-target/mean", RecordValue::Scalar(scalar(&v_target.mean_all()?)?)),
        ("v-target/std", RecordValue::Scalar(std_all(&v_target)?)),
        ("adv/z-mean", RecordValue::Scalar(scalar(&adv.mean_all()?)?)),
        ("adv/z-std", RecordValue::Scalar(std_all(&adv)?)),
        ("adv/z-max", RecordValue::Scalar(scalar(&adv.abs()?.max_all()?)?)),
        ("grad-norm/policy", RecordValue::Scalar(policy_norm)),
        ("grad-norm/value", RecordValue::Scalar(value_norm)),
        ("param/gamma", RecordValue::Scalar(config.gamma as f32)),
        ("param/entropy", RecordValue::Scalar(config.entropy as f32)),
        ("param/lr", RecordValue::Scalar(agent.learning_rate() as f32)),
    ]);

    let target_sq = scalar(&v_target.sqr()?.mean_all()?)?;
    if target_sq > 0.0 {
        let resid = scalar(&(&v_target - value)?.sqr()?.mean_all()?)?;
        record.insert_scalar("resid-var/v", resid / target_sq);
    }
    if let Some(rel) = relative_entropy(scalar(&h_loss)?, agent.action_space()) {
        record.insert_scalar("rel-entropy", rel);
    }

    Ok((kl, record))
}
