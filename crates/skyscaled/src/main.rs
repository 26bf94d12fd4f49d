//! skyscaled: the Skyscale command line.
//!
//! Assembles the estimator, the scheduling algorithms and the simulator over
//! a redb state store:
//! - `simulate` / `compare`: time-stepped runs over a job backlog
//! - `autoscale`: one scheduling pass over the current queue
//! - `import-history`, `runs`, `events`: store maintenance and inspection
//!
//! # Usage
//!
//! ```text
//! skyscaled init-config --output skyscale.toml
//! skyscaled import-history --file history.json
//! skyscaled simulate --jobs jobs.json --sizes sizes.json
//! skyscaled compare --jobs jobs.json --sizes sizes.json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(name = "skyscaled", about = "Multi-cloud autoscaling engine", version)]
struct Cli {
    /// Data directory holding the state store.
    #[arg(long, global = true, default_value = "./skyscale-data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Files describing the workload of a run.
#[derive(clap::Args, Clone)]
pub struct WorkloadArgs {
    /// Cloud and simulation settings.
    #[arg(short, long, default_value = "skyscale.toml")]
    pub config: PathBuf,

    /// JSON array of job records.
    #[arg(long)]
    pub jobs: PathBuf,

    /// JSON object mapping job ids to input dataset sizes.
    #[arg(long)]
    pub sizes: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AlgorithmKind {
    CostAware,
    Passthrough,
}

#[derive(Subcommand)]
enum Command {
    /// Simulate one algorithm over the job backlog.
    Simulate {
        #[command(flatten)]
        workload: WorkloadArgs,

        #[arg(short, long, value_enum, default_value = "cost-aware")]
        algorithm: AlgorithmKind,

        /// Write per-tick snapshots to this file as JSON.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Simulate several algorithms concurrently on identical clouds.
    Compare {
        #[command(flatten)]
        workload: WorkloadArgs,

        #[arg(short, long, value_enum, value_delimiter = ',', default_value = "passthrough,cost-aware")]
        algorithms: Vec<AlgorithmKind>,
    },
    /// Run the cost-aware scheduler once on the current queue.
    Autoscale {
        #[command(flatten)]
        workload: WorkloadArgs,
    },
    /// Load finished-job records for estimator training.
    ImportHistory {
        /// JSON array of historical job records.
        #[arg(short, long)]
        file: PathBuf,
    },
    /// List recorded runs.
    Runs,
    /// Print the events recorded for a run.
    Events {
        run: u64,

        /// Only fleet events.
        #[arg(long, conflicts_with = "scheduler")]
        fleet: bool,

        /// Only scheduler events.
        #[arg(long)]
        scheduler: bool,
    },
    /// Write a scaffold configuration file.
    InitConfig {
        #[arg(short, long, default_value = "skyscale.toml")]
        output: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,skyscale=debug"))?,
        )
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir;

    match cli.command {
        Command::Simulate {
            workload,
            algorithm,
            output,
        } => commands::simulate::simulate(&data_dir, &workload, algorithm, output.as_deref()).await,
        Command::Compare {
            workload,
            algorithms,
        } => commands::simulate::compare(&data_dir, &workload, &algorithms).await,
        Command::Autoscale { workload } => commands::autoscale::autoscale(&data_dir, &workload),
        Command::ImportHistory { file } => commands::history::import(&data_dir, &file),
        Command::Runs => commands::history::runs(&data_dir),
        Command::Events {
            run,
            fleet,
            scheduler,
        } => commands::history::events(&data_dir, run, !scheduler, !fleet),
        Command::InitConfig { output, force } => commands::init::init_config(&output, force),
    }
}
