use clap::Parser;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::Duration;
use vecppo::envs::StepLimit;
use vecppo::evaluation::EpisodeEvaluator;
use vecppo::logging::{ByTime, DisplayLogger, TensorBoardLogger};
use vecppo::scheduling::LrScheduler;
use vecppo::{
    ExperimentConfig, ParallelVecEnv, PpoAgent, PpoError, Prng, TrainHooks, VecEnvironment,
};

/// Train a PPO agent on the cart-pole environment
#[derive(Parser, Debug)]
#[clap(version, author, about)]
struct Args {
    /// JSON experiment configuration file. Defaults are used for missing values.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Random seed
    #[clap(long)]
    seed: Option<u64>,

    /// Number of training updates
    #[clap(long)]
    max_updates: Option<u64>,

    /// Number of parallel environment workers
    #[clap(long)]
    num_workers: Option<usize>,

    /// Number of threads used to step the workers
    #[clap(long)]
    num_threads: Option<usize>,

    /// Statistics log directory [default: data/cartpole-ppo/<time>]
    #[clap(long)]
    log_dir: Option<PathBuf>,

    /// Model checkpoint directory [default: log directory]
    #[clap(long)]
    dump_dir: Option<PathBuf>,
}

impl Args {
    fn experiment_config(&self) -> Result<ExperimentConfig, PpoError> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::from_json_file(path)?,
            None => ExperimentConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(max_updates) = self.max_updates {
            config.train.max_updates = max_updates;
        }
        if let Some(num_workers) = self.num_workers {
            config.ppo.num_workers = num_workers;
        }
        if self.num_threads.is_some() {
            config.num_threads = self.num_threads;
        }
        if self.log_dir.is_some() {
            config.log_dir = self.log_dir.clone();
        }
        if self.dump_dir.is_some() {
            config.train.dump_dir = self.dump_dir.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<(), PpoError> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let mut config = args.experiment_config()?;

    let log_dir = config.log_dir.clone().unwrap_or_else(|| {
        let mut dir: PathBuf = ["data", "cartpole-ppo"].iter().collect();
        dir.push(chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string());
        dir
    });
    if config.train.dump_dir.is_none() {
        config.train.dump_dir = Some(log_dir.clone());
    }
    println!("Config\n{:#?}\n", config);

    #[allow(clippy::cast_possible_wrap)]
    tch::manual_seed(config.seed as i64);
    let env = StepLimit::new(config.env.cartpole.build(), config.env.max_steps_per_episode);
    let num_threads = config.num_threads.unwrap_or_else(num_cpus::get);
    let mut vec_env = ParallelVecEnv::new(env, config.ppo.num_workers, num_threads, config.seed)?;

    let model = config
        .model
        .build(&vec_env.observation_shapes(), vec_env.num_actions())?;
    let mut agent = PpoAgent::new(model, config.ppo, Prng::seed_from_u64(config.seed))?;

    let mut evaluator = EpisodeEvaluator::new(
        *vec_env.env(),
        config.eval_episodes,
        config.seed.wrapping_add(1),
    );
    let mut scheduler = config
        .lr_schedule
        .map(|schedule| schedule.build())
        .transpose()?;
    let hooks = TrainHooks {
        evaluator: Some(&mut evaluator),
        lr_scheduler: scheduler
            .as_mut()
            .map(|scheduler| scheduler as &mut dyn LrScheduler),
    };

    println!("Logging to {:?}", log_dir);
    let mut logger = (
        DisplayLogger::new(ByTime::default()),
        TensorBoardLogger::new(ByTime::new(Duration::from_millis(200)), &log_dir),
    );

    let summary = agent.train(&mut vec_env, &config.train, hooks, &mut logger)?;
    println!("{:#?}", summary);
    agent.store_model("final_model.pt", config.train.dump_dir.as_deref())?;
    Ok(())
}
