use anyhow::Result;
use chunkrl_candle_agent::{
    agent::{AgentConfig, RecurrentAgent},
    checkpoint::Checkpointer,
    evaluate::evaluate,
    lstm::{LstmEncoder, LstmEncoderConfig},
    opt::OptimizerConfig,
    ppo::PpoConfig,
    trainer::ActorLearner,
};
use chunkrl_core::{
    fsm::{self, FsmEnv},
    record::{AggregateRecorder, LogRecorder, Record, Recorder},
    TrainerConfig,
};
use chunkrl_tensorboard::TensorboardRecorder;
use clap::{Parser, ValueEnum};
use log::info;

const WIDTH: usize = 64;
const LR: f64 = 3e-3;
const BUFFER_SIZE: usize = 16;
const BATCH_SIZE: usize = 64;
const N_EVAL_STEPS: usize = 32;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Task {
    /// A single state paying reward 1 on every step
    Unit,
    /// A chain of states paying reward 1 at the end
    Chain,
    /// A binary choice paying +1 or -1
    Coin,
}

/// Train/eval a recurrent agent on a finite-state-machine environment
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Environment
    #[arg(long, value_enum, default_value_t = Task::Coin)]
    task: Task,

    /// Number of parallel environment instances
    #[arg(long, default_value_t = 32)]
    n_envs: usize,

    /// Number of collect/optimize iterations
    #[arg(long, default_value_t = 200)]
    iterations: usize,

    /// Length of the chain
    #[arg(long, default_value_t = 4)]
    chain_length: usize,

    /// Directory of checkpoints, configurations and logs
    #[arg(long, default_value = "./chunkrl/examples/model/fsm_ppo")]
    model_dir: String,

    /// Write records to Tensorboard instead of the log
    #[arg(long, default_value_t = false)]
    tensorboard: bool,

    /// Evaluate the saved agent, not train
    #[arg(short, long, default_value_t = false)]
    eval: bool,
}

fn create_env(task: Task, n_envs: usize, chain_length: usize) -> Result<FsmEnv> {
    Ok(match task {
        Task::Unit => fsm::unit_reward(n_envs)?,
        Task::Chain => fsm::chain(chain_length, n_envs)?,
        Task::Coin => fsm::coin_flip(n_envs)?,
    })
}

fn create_agent(env: &FsmEnv) -> Result<RecurrentAgent<LstmEncoder>> {
    let config = AgentConfig::<LstmEncoderConfig>::default()
        .width(WIDTH)
        .spaces_of(env)
        .opt_config(OptimizerConfig::default().learning_rate(LR));
    RecurrentAgent::build(config)
}

fn create_recorder(model_dir: &str, tensorboard: bool) -> Box<dyn AggregateRecorder> {
    match tensorboard {
        true => Box::new(TensorboardRecorder::new(model_dir)),
        false => Box::new(LogRecorder::default()),
    }
}

fn train(args: &Args, iterations: usize) -> Result<()> {
    let env = create_env(args.task, args.n_envs, args.chain_length)?;
    let mut agent = create_agent(&env)?;
    let config = TrainerConfig::default()
        .buffer_size(BUFFER_SIZE)
        .batch_size(BATCH_SIZE)
        .max_iterations(iterations)
        .flush_record_interval(10)
        .model_dir(args.model_dir.as_str());
    let ppo_config = PpoConfig::default();

    std::fs::create_dir_all(&args.model_dir)?;
    config.save(format!("{}/trainer.yaml", args.model_dir))?;
    ppo_config.save(format!("{}/ppo.yaml", args.model_dir))?;
    agent
        .config()
        .save(format!("{}/agent.yaml", args.model_dir))?;

    let mut recorder = create_recorder(&args.model_dir, args.tensorboard);
    let mut trainer = ActorLearner::<FsmEnv>::build(config, ppo_config, env.config().clone());
    trainer.train(&mut agent, recorder.as_mut())?;
    info!("Trained for {} learner steps", trainer.learner_steps());

    Ok(())
}

fn eval(args: &Args) -> Result<Record> {
    let mut env = create_env(args.task, args.n_envs, args.chain_length)?;
    let agent_config =
        AgentConfig::<LstmEncoderConfig>::load(format!("{}/agent.yaml", args.model_dir))?;
    let mut agent: RecurrentAgent<LstmEncoder> = RecurrentAgent::build(agent_config)?;
    Checkpointer::new(&args.model_dir, 0).load_latest(&agent)?;

    let record = evaluate(&mut agent, &mut env, N_EVAL_STEPS, true)?;
    let mut recorder = LogRecorder::default();
    recorder.write(record.clone());

    Ok(record)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if !args.eval {
        train(&args, args.iterations)?;
    }
    eval(&args)?;

    Ok(())
}
