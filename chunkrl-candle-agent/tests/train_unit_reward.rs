use anyhow::Result;
use candle_core::{Device, IndexOp};
use chunkrl_candle_agent::{
    agent::{AgentConfig, RecurrentAgent},
    lstm::{LstmEncoder, LstmEncoderConfig},
    opt::OptimizerConfig,
    ppo::PpoConfig,
    trainer::ActorLearner,
    world::WorldState,
};
use chunkrl_core::{
    fsm::{FsmBuilder, FsmEnv, FsmEnvConfig},
    record::BufferedRecorder,
    DiscreteAct, Env, TrainerConfig,
};
use tempdir::TempDir;

const N_ENVS: usize = 8;
const GAMMA: f64 = 0.9;
const PROBE_STEPS: usize = 16;

/// Mean value after `PROBE_STEPS` steps from a reset, when the hidden state has settled.
fn mean_value(agent: &mut RecurrentAgent<LstmEncoder>, env: &mut FsmEnv) -> Result<f32> {
    let mut worlds = vec![WorldState::from_world(&env.reset()?, &Device::Cpu)?];
    for _ in 1..PROBE_STEPS {
        let (world, _) = env.step(&DiscreteAct::single(vec![0; N_ENVS]))?;
        worlds.push(WorldState::from_world(&world, &Device::Cpu)?);
    }
    let chunk = WorldState::stack(&worlds.iter().collect::<Vec<_>>())?;

    let mut agent = agent.substitute_state(Default::default());
    let decision = agent.forward(&chunk, false, true, false)?;
    let last = decision.value()?.i(PROBE_STEPS - 1)?;
    Ok(last.mean_all()?.to_scalar::<f32>()?)
}

#[test]
fn test_values_approach_discounted_return() -> Result<()> {
    let tmp_dir = TempDir::new("train_unit_reward")?;
    let model_dir = tmp_dir.path().join("model");
    let segment = 20;
    let n_segments = 3;
    let iterations = segment * n_segments;

    let table = FsmBuilder::new().state("start").to("start", 1.0).build()?;
    let env_config = FsmEnvConfig::new(table, N_ENVS);
    let mut probe = FsmEnv::build(&env_config, 0)?;

    let agent_config = AgentConfig::<LstmEncoderConfig>::default()
        .width(16)
        .spaces_of(&probe)
        .opt_config(OptimizerConfig::default().learning_rate(0.02));
    let mut agent: RecurrentAgent<LstmEncoder> = RecurrentAgent::build(agent_config)?;

    let trainer_config = TrainerConfig::default()
        .buffer_size(16)
        .batch_size(32)
        .max_iterations(segment)
        .model_dir(model_dir.to_string_lossy())
        .seed(7);
    assert_eq!(trainer_config.envs_per_batch(), 2);
    let ppo_config = PpoConfig::default().gamma(GAMMA);
    let target = (1.0 / (1.0 - GAMMA)) as f32;

    let mut distances = vec![(mean_value(&mut agent, &mut probe)? - target).abs()];

    // Each call runs one third of the iterations; counters carry over.
    let mut recorder = BufferedRecorder::new();
    let mut trainer = ActorLearner::<FsmEnv>::build(trainer_config, ppo_config, env_config);
    for _ in 0..n_segments {
        trainer.train(&mut agent, &mut recorder)?;
        distances.push((mean_value(&mut agent, &mut probe)? - target).abs());
    }

    // A single action never moves the policy, so every mini-batch is used.
    assert_eq!(trainer.learner_steps(), iterations * N_ENVS / 2);
    assert_eq!(recorder.len(), iterations);
    let last = recorder.iter().last().unwrap();
    assert_eq!(last.get_scalar("count/chunks")?, iterations as f32);
    assert_eq!(
        last.get_scalar("learner_steps")?,
        trainer.learner_steps() as f32
    );

    let initial = distances[0];
    let late = distances[n_segments];
    assert!(
        distances[1..].iter().all(|&d| d < initial),
        "distances {:?}",
        distances
    );
    let later_mean = distances[2..].iter().sum::<f32>() / (n_segments - 1) as f32;
    assert!(later_mean < distances[1] + 0.5, "distances {:?}", distances);
    assert!(late < 0.5 * initial, "distances {:?}", distances);

    assert!(model_dir.join("latest").join("policy.safetensors").exists());
    assert!(model_dir.join("latest").join("value.safetensors").exists());
    Ok(())
}
