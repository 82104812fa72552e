use anyhow::Result;
use chunkrl_core::{
    fsm::{chain, FsmBuilder, FsmEnv, FsmEnvConfig},
    DiscreteAct, Env,
};
use std::{fs::File, io::Write};
use tempdir::TempDir;

#[test]
fn test_build_from_yaml_config() -> Result<()> {
    let table = FsmBuilder::new()
        .state("left")
        .obs(&[-1.0, 0.0])
        .to("left", 0.0)
        .to("right", 1.0)
        .state("right")
        .obs(&[1.0, 0.0])
        .to("left", 0.0)
        .to("goal", 5.0)
        .state("goal")
        .obs(&[0.0, 1.0])
        .to("goal", 0.0)
        .to("goal", 0.0)
        .terminal()
        .build()?;
    let config = FsmEnvConfig::new(table, 4);

    let dir = TempDir::new("fsm_env")?;
    let path = dir.path().join("fsm.yaml");
    File::create(&path)?.write_all(serde_yaml::to_string(&config)?.as_bytes())?;
    let config_: FsmEnvConfig = serde_yaml::from_reader(File::open(&path)?)?;
    assert_eq!(config, config_);

    let mut env = FsmEnv::build(&config_, 0)?;
    assert_eq!(env.n_envs(), 4);
    assert_eq!(env.observation_space().dim, 2);
    assert_eq!(env.action_space().n_actions, 2);

    env.reset()?;
    let (w, _) = env.step(&DiscreteAct::single(vec![1; 4]))?;
    assert_eq!(w.reward, vec![1.0; 4]);
    let (w, _) = env.step(&DiscreteAct::single(vec![1, 1, 0, 0]))?;
    assert_eq!(w.reward, vec![5.0, 5.0, 0.0, 0.0]);
    assert_eq!(w.reset, vec![1, 1, 0, 0]);
    assert_eq!(w.obs_of(0), &[-1.0, 0.0]);
    Ok(())
}

#[test]
fn test_chain_rolls_over() -> Result<()> {
    let n = 3;
    let mut env = chain(n, 2)?;
    env.reset()?;
    let mut total = 0.0;
    for _ in 0..4 * (n - 1) {
        let (w, _) = env.step(&DiscreteAct::single(vec![0, 0]))?;
        total += w.reward[0];
    }
    assert_eq!(total, 4.0);
    Ok(())
}
