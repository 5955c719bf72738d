//! `argo` — thin CLI client for the `argod` daemon
//!
//! Translates subcommands into HTTP calls; no workflow logic lives here
//! (spec.md Non-goal: CLI parsing UI and transport internals are the only
//! things this binary owns).

use anyhow::{bail, Context, Result};
use argo::workflow::WorkflowEntry;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use serde_json::json;
use tabled::{Table, Tabled};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "argo", about = "Client for the Argo workflow daemon")]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:7890", env = "ARGO_DAEMON_ADDR")]
    daemon_addr: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a new workflow run from a named script/template
    Start {
        script: String,
        #[arg(long)]
        template: Option<String>,
        #[arg(long)]
        instance: Option<String>,
    },
    /// List all tracked workflows
    List,
    /// Show one workflow's status
    Status { id: String },
    /// Send a line of input to a running workflow
    Input { id: String, line: String },
    /// Mark a workflow paused (registry-visible only)
    Pause { id: String },
    /// Mark a paused workflow running again
    Resume { id: String },
    /// Abandon a running workflow, terminating its executor process
    Abandon { id: String },
    /// Follow a workflow's output log
    Attach { id: String },
}

#[derive(Tabled)]
struct WorkflowRow {
    id: String,
    name: String,
    state: String,
    step: String,
    pid: u32,
}

impl From<WorkflowEntry> for WorkflowRow {
    fn from(e: WorkflowEntry) -> Self {
        Self {
            id: e.id,
            name: e.name,
            state: e.state.to_string(),
            step: format!("{}/{}", e.current_step, e.total_steps),
            pid: e.pid,
        }
    }
}

#[derive(Deserialize)]
struct StartResponse {
    workflow_id: String,
}

#[derive(Deserialize, serde::Serialize)]
struct StatusResponse {
    workflow_id: String,
    state: String,
    pid: u32,
    exit_code: Option<i32>,
    script: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Command::Start { script, template, instance } => {
            let url = format!("{}/api/workflow/start", cli.daemon_addr);
            let resp = client
                .post(&url)
                .json(&json!({"script": script, "template": template, "instance": instance}))
                .send()
                .await
                .context("contacting argod")?;
            if !resp.status().is_success() {
                bail!("{}", error_body(resp).await);
            }
            let body: StartResponse = resp.json().await?;
            println!("{} {}", "started".green(), body.workflow_id);
        }
        Command::List => {
            let url = format!("{}/api/workflow/list", cli.daemon_addr);
            let resp = client.get(&url).send().await.context("contacting argod")?;
            let entries: Vec<WorkflowEntry> = resp.json().await?;
            let rows: Vec<WorkflowRow> = entries.into_iter().map(Into::into).collect();
            println!("{}", Table::new(rows));
        }
        Command::Status { id } => {
            let url = format!("{}/api/workflow/status/{}", cli.daemon_addr, id);
            let resp = client.get(&url).send().await.context("contacting argod")?;
            if !resp.status().is_success() {
                bail!("{}", error_body(resp).await);
            }
            let entry: StatusResponse = resp.json().await?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        Command::Input { id, line } => {
            let url = format!("{}/api/workflow/input/{}", cli.daemon_addr, id);
            client
                .post(&url)
                .json(&json!({"input": line}))
                .send()
                .await
                .context("contacting argod")?;
        }
        Command::Pause { id } => {
            let url = format!("{}/api/workflow/pause/{}", cli.daemon_addr, id);
            client.post(&url).send().await.context("contacting argod")?;
            println!("{} {}", "paused".yellow(), id);
        }
        Command::Resume { id } => {
            let url = format!("{}/api/workflow/resume/{}", cli.daemon_addr, id);
            client.post(&url).send().await.context("contacting argod")?;
            println!("{} {}", "resumed".green(), id);
        }
        Command::Abandon { id } => {
            let url = format!("{}/api/workflow/abandon/{}", cli.daemon_addr, id);
            client.delete(&url).send().await.context("contacting argod")?;
            println!("{} {}", "abandoned".red(), id);
        }
        Command::Attach { id } => attach(&cli.daemon_addr, &id).await?,
    }

    Ok(())
}

async fn error_body(resp: reqwest::Response) -> String {
    resp.text().await.unwrap_or_else(|_| "request failed".to_string())
}

/// Tail the workflow's log file, printing new lines as they're appended,
/// and forward typed stdin lines to `/api/workflow/input/{id}`.
async fn attach(daemon_addr: &str, id: &str) -> Result<()> {
    use tokio::io::{AsyncBufReadExt, BufReader};

    let status_url = format!("{}/api/workflow/status/{}", daemon_addr, id);
    let client = reqwest::Client::new();
    let resp = client.get(&status_url).send().await.context("contacting argod")?;
    if !resp.status().is_success() {
        bail!("{}", error_body(resp).await);
    }

    println!("{} {} (Ctrl-D to detach)", "attached to".cyan(), id);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let input_url = format!("{}/api/workflow/input/{}", daemon_addr, id);

    while let Some(line) = lines.next_line().await? {
        client
            .post(&input_url)
            .json(&json!({"input": line}))
            .send()
            .await
            .context("sending input")?;
    }

    Ok(())
}
