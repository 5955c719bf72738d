//! Executor process runtime
//!
//! The body of the `argo-executor` binary: loads a workflow graph, runs
//! the interpreter against real stdin/the shared log file, posts periodic
//! progress back to the daemon, and reacts to SIGTERM by stopping
//! promptly rather than continuing to completion (spec.md §4.4).

use crate::error::Result;
use crate::fs_loader::FsGraphLoader;
use crate::graph::WorkflowGraph;
use crate::interpreter::{execute_all, ExecutionOutcome, StepEnv};
use crate::io_channel::{InputQueue, OutputSink};
use crate::persona::PersonaRegistry;
use crate::provider::UnconfiguredProvider;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

pub struct ExecutorArgs {
    pub workflow_id: String,
    pub graph_path: PathBuf,
    pub registry_path: PathBuf,
    pub log_file: PathBuf,
    pub personas_path: PathBuf,
    pub context_seed_path: PathBuf,
    pub daemon_addr: String,
    pub progress_interval_secs: u64,
}

/// Feed `queue` from the process's real stdin, one line at a time, until
/// EOF or the reader task is aborted.
fn spawn_stdin_forwarder(queue: Arc<InputQueue>) {
    tokio::spawn(async move {
        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if queue.push(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    queue.close().await;
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "stdin read error, closing input queue");
                    queue.close().await;
                    break;
                }
            }
        }
    });
}

/// Periodically POST `step`/`total`/`name` to the daemon. Silently drops
/// failures — progress reporting is best-effort (spec.md §4.6).
fn spawn_progress_reporter(
    args: &ExecutorArgs,
    total_steps: u64,
    workflow_name: String,
    current_step: Arc<std::sync::atomic::AtomicU64>,
) {
    let url = format!(
        "{}/api/workflow/progress/{}",
        args.daemon_addr.trim_end_matches('/'),
        args.workflow_id
    );
    let interval = std::time::Duration::from_secs(args.progress_interval_secs.max(1));
    tokio::spawn(async move {
        let client = reqwest::Client::new();
        loop {
            tokio::time::sleep(interval).await;
            let step = current_step.load(std::sync::atomic::Ordering::Relaxed);
            let body = serde_json::json!({"step": step, "total": total_steps, "name": workflow_name});
            if client.post(&url).json(&body).send().await.is_err() {
                // Best-effort; the daemon may be restarting. Keep trying.
            }
        }
    });
}

/// Run the executor to completion (or until SIGTERM). Returns the process
/// exit code the caller's `main` should use.
pub async fn run(args: ExecutorArgs) -> i32 {
    match run_inner(&args).await {
        Ok(0) => 0,
        Ok(code) => code,
        Err(e) => {
            error!(workflow_id = %args.workflow_id, error = %e, "executor failed");
            1
        }
    }
}

async fn run_inner(args: &ExecutorArgs) -> Result<i32> {
    let graph_data = tokio::fs::read_to_string(&args.graph_path).await?;
    let mut graph = WorkflowGraph::from_json(&graph_data)?;
    if let Ok(seed_data) = tokio::fs::read_to_string(&args.context_seed_path).await {
        let seed: std::collections::HashMap<String, String> = serde_json::from_str(&seed_data)?;
        graph.initial_context.extend(seed);
    }
    let total_steps = graph.all_steps().len() as u64;
    let workflow_name = graph.workflow_name.clone();

    let templates_dir = args
        .graph_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let loader = FsGraphLoader::new(templates_dir);
    let provider = UnconfiguredProvider;

    let personas = match tokio::fs::read_to_string(&args.personas_path).await {
        Ok(data) => PersonaRegistry::from_json(&data)?,
        Err(_) => PersonaRegistry::new(),
    };

    let input = Arc::new(InputQueue::new());
    spawn_stdin_forwarder(Arc::clone(&input));

    let output = OutputSink::new(args.log_file.clone());
    let progress_counter = Arc::new(std::sync::atomic::AtomicU64::new(0));
    spawn_progress_reporter(args, total_steps, workflow_name, Arc::clone(&progress_counter));

    let env = StepEnv {
        input: &input,
        output: &output,
        provider: &provider,
        loader: &loader,
        personas: &personas,
    };

    let mut term = signal(SignalKind::terminate())?;

    info!(
        workflow_id = %args.workflow_id,
        steps = total_steps,
        registry = %args.registry_path.display(),
        "executor starting"
    );

    tokio::select! {
        result = execute_all(graph, &env) => {
            let (outcome, _ctx) = result?;
            match outcome {
                ExecutionOutcome::Completed => {
                    info!(workflow_id = %args.workflow_id, "workflow completed");
                    Ok(0)
                }
                ExecutionOutcome::Failed(e) => {
                    error!(workflow_id = %args.workflow_id, error = %e, "workflow failed");
                    Ok(1)
                }
            }
        }
        _ = term.recv() => {
            warn!(workflow_id = %args.workflow_id, "received SIGTERM, stopping");
            Ok(143)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_run_inner_completes_simple_graph() {
        let dir = tempdir().unwrap();
        let graph_path = dir.path().join("g.json");
        std::fs::write(
            &graph_path,
            r#"{"workflow_name":"g","phases":[{"steps":[{"step":1,"type":"display","message":"hi","next_step":"EXIT"}]}]}"#,
        )
        .unwrap();

        let args = ExecutorArgs {
            workflow_id: "wf-1".to_string(),
            graph_path,
            registry_path: dir.path().join("registry.json"),
            log_file: dir.path().join("wf-1.log"),
            personas_path: dir.path().join("personas.json"),
            context_seed_path: dir.path().join("wf-1.context.json"),
            daemon_addr: "http://127.0.0.1:1".to_string(),
            progress_interval_secs: 3600,
        };

        let code = run_inner(&args).await.unwrap();
        assert_eq!(code, 0);

        let log = std::fs::read_to_string(dir.path().join("wf-1.log")).unwrap();
        assert_eq!(log, "hi\n");
    }
}
