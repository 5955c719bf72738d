//! `argo-executor` — forked per workflow run by `argod`
//!
//! Loads a single workflow graph and runs it to completion, writing output
//! to the shared log file and reading user input from stdin (piped by the
//! daemon, which forwards `/api/workflow/input/{id}` lines into it).

use argo::executor::{run, ExecutorArgs};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "argo-executor")]
struct Cli {
    #[arg(long)]
    workflow_id: String,

    #[arg(long)]
    graph: PathBuf,

    #[arg(long)]
    registry: PathBuf,

    #[arg(long = "log-file")]
    log_file: PathBuf,

    #[arg(long)]
    personas: PathBuf,

    #[arg(long)]
    context: PathBuf,

    #[arg(long, default_value = "http://127.0.0.1:7890", env = "ARGO_DAEMON_ADDR")]
    daemon_addr: String,

    #[arg(long, default_value_t = 5)]
    progress_interval_secs: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let args = ExecutorArgs {
        workflow_id: cli.workflow_id,
        graph_path: cli.graph,
        registry_path: cli.registry,
        log_file: cli.log_file,
        personas_path: cli.personas,
        context_seed_path: cli.context,
        daemon_addr: cli.daemon_addr,
        progress_interval_secs: cli.progress_interval_secs,
    };

    let code = run(args).await;
    std::process::exit(code);
}
