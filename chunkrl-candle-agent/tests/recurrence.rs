use anyhow::Result;
use candle_core::{DType, Device, IndexOp, Tensor};
use chunkrl_candle_agent::{
    agent::{AgentConfig, AgentState, RecurrentAgent},
    lstm::{LstmEncoder, LstmEncoderConfig},
    model::HiddenState,
    world::WorldState,
};
use chunkrl_core::{
    fsm::{coin_flip, FsmEnv},
    DiscreteAct, Env, World,
};

const WIDTH: usize = 8;

fn agent() -> Result<(RecurrentAgent<LstmEncoder>, FsmEnv)> {
    let env = coin_flip(3)?;
    let config = AgentConfig::<LstmEncoderConfig>::default()
        .width(WIDTH)
        .spaces_of(&env);
    Ok((RecurrentAgent::build(config)?, env))
}

fn noise_state(n: usize) -> Result<AgentState> {
    let hidden = || -> Result<HiddenState> {
        Ok(HiddenState(vec![
            Tensor::randn(0f32, 3f32, (n, WIDTH), &Device::Cpu)?,
            Tensor::randn(0f32, 3f32, (n, WIDTH), &Device::Cpu)?,
        ]))
    };
    Ok(AgentState {
        policy: hidden()?,
        value: hidden()?,
    })
}

fn max_abs_diff(a: &Tensor, b: &Tensor) -> Result<f32> {
    Ok((a - b)?
        .abs()?
        .flatten_all()?
        .max(0)?
        .to_dtype(DType::F32)?
        .to_scalar::<f32>()?)
}

/// A chunk of worlds `[T, N]` starting with a reset of every instance.
fn chunk_from_reset(env: &mut impl Env, steps: usize) -> Result<WorldState> {
    let mut worlds: Vec<World> = vec![env.reset()?];
    let n = env.n_envs();
    for t in 1..steps {
        let act = DiscreteAct::single(vec![(t % 2) as u32; n]);
        worlds.push(env.step(&act)?.0);
    }
    let ws = worlds
        .iter()
        .map(|w| WorldState::from_world(w, &Device::Cpu))
        .collect::<Result<Vec<_>>>()?;
    WorldState::stack(&ws.iter().collect::<Vec<_>>())
}

#[test]
fn test_reset_ignores_injected_state() -> Result<()> {
    let (mut agent, mut env) = agent()?;
    let chunk = chunk_from_reset(&mut env, 4)?;

    agent.clear_state();
    let clean = agent.forward(&chunk, false, true, false)?;

    agent.set_state(noise_state(3)?);
    let noisy = agent.forward(&chunk, false, true, false)?;

    // Every instance resets at step 0, so the stored state never reaches the output.
    assert!(max_abs_diff(&clean.logits, &noisy.logits)? < 1e-6);
    assert!(max_abs_diff(clean.value()?, noisy.value()?)? < 1e-6);
    Ok(())
}

#[test]
fn test_state_matters_without_reset() -> Result<()> {
    let (mut agent, mut env) = agent()?;
    let chunk = chunk_from_reset(&mut env, 3)?;
    let chunk = WorldState {
        reset: chunk.reset.zeros_like()?,
        ..chunk
    };

    agent.clear_state();
    let clean = agent.forward(&chunk, false, true, false)?;
    agent.set_state(noise_state(3)?);
    let noisy = agent.forward(&chunk, false, true, false)?;

    assert!(max_abs_diff(&clean.value()?.i(0)?, &noisy.value()?.i(0)?)? > 0.0);
    Ok(())
}

#[test]
fn test_substituted_state_is_restored() -> Result<()> {
    let (mut agent, mut env) = agent()?;
    let world = WorldState::from_world(&env.reset()?, &Device::Cpu)?;
    agent.forward(&world, true, true, false)?;
    let before = agent.state();

    {
        let mut guard = agent.substitute_state(noise_state(2)?);
        assert_eq!(guard.state().policy.n_envs(), Some(2));
        guard.clear_state();
    }
    let after = agent.state();
    for (a, b) in before.policy.0.iter().zip(after.policy.0.iter()) {
        assert_eq!(max_abs_diff(a, b)?, 0.0);
    }
    for (a, b) in before.value.0.iter().zip(after.value.0.iter()) {
        assert_eq!(max_abs_diff(a, b)?, 0.0);
    }
    Ok(())
}

#[test]
fn test_substituted_state_is_restored_on_error() -> Result<()> {
    let (mut agent, _) = agent()?;
    let before = agent.state();
    assert!(before.policy.is_empty());

    let failing = |agent: &mut RecurrentAgent<LstmEncoder>| -> Result<()> {
        let mut guard = agent.substitute_state(noise_state(2)?);
        // A world with the wrong observation width fails inside the encoder.
        let bad = WorldState {
            obs: Tensor::zeros((2, 5), DType::F32, &Device::Cpu)?,
            reward: Tensor::zeros(2, DType::F32, &Device::Cpu)?,
            reset: Tensor::zeros(2, DType::U8, &Device::Cpu)?,
            terminal: Tensor::zeros(2, DType::U8, &Device::Cpu)?,
        };
        guard.forward(&bad, true, true, false)?;
        Ok(())
    };
    assert!(failing(&mut agent).is_err());
    assert!(agent.state().policy.is_empty());
    Ok(())
}
