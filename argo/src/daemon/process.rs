//! Executor process management
//!
//! Forks the `argo-executor` binary per workflow run and reaps it in the
//! background, updating the registry when it exits (spec.md §4.4, §4.6).

use super::state::DaemonState;
use crate::error::Result;
use crate::workflow::WorkflowState;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{error, info, warn};

/// Spawn the executor for `workflow_id` running template `workflow_name`,
/// and mark the registry entry `running`. Returns the child's pid.
///
/// The child's stdin is piped; a background task drains this workflow's
/// `InputQueue` into it, forwarding whatever `/api/workflow/input/{id}`
/// receives (spec.md §4.3's "daemon routes user I/O" contract). Output is
/// written directly by the executor to the shared log file path, so no
/// stdout piping back through the daemon is needed.
pub async fn spawn_executor(state: &Arc<DaemonState>, workflow_id: &str, workflow_name: &str) -> Result<u32> {
    let graph_path = state.graph_path_for(workflow_name);
    let log_path = state.log_path_for(workflow_id);
    let registry_path = &state.registry_path;
    let personas_path = &state.personas_path;
    let context_path = state.context_seed_path_for(workflow_id);

    let executor_bin = std::env::var("ARGO_EXECUTOR_PATH").unwrap_or_else(|_| "argo-executor".to_string());

    let mut child = Command::new(executor_bin)
        .arg("--workflow-id")
        .arg(workflow_id)
        .arg("--graph")
        .arg(&graph_path)
        .arg("--registry")
        .arg(registry_path)
        .arg("--log-file")
        .arg(&log_path)
        .arg("--personas")
        .arg(personas_path)
        .arg("--context")
        .arg(&context_path)
        .stdin(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(crate::error::ArgoError::from)?;

    let pid = child.id().unwrap_or(0);
    let child_stdin = child.stdin.take();

    {
        let mut registry = state.registry.lock().await;
        registry.mark_running(workflow_id, pid, now())?;
    }
    state.persist_registry().await?;

    if let (Some(mut stdin), Some(channel)) = (child_stdin, state.channel_for(workflow_id).await) {
        let workflow_id_owned = workflow_id.to_string();
        tokio::spawn(async move {
            loop {
                match channel.input.read_blocking().await {
                    Ok(line) => {
                        if stdin.write_all(line.as_bytes()).await.is_err() {
                            break;
                        }
                        if stdin.write_all(b"\n").await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            debug_forward_closed(&workflow_id_owned);
        });
    }

    let state_for_reap = Arc::clone(state);
    let workflow_id_owned = workflow_id.to_string();
    tokio::spawn(async move {
        let status = child.wait().await;
        reap(&state_for_reap, &workflow_id_owned, status).await;
    });

    Ok(pid)
}

fn debug_forward_closed(workflow_id: &str) {
    tracing::debug!(workflow_id, "input forwarding task ended");
}

async fn reap(state: &Arc<DaemonState>, workflow_id: &str, status: std::io::Result<std::process::ExitStatus>) {
    let (new_state, exit_code) = match status {
        Ok(status) if status.success() => (WorkflowState::Completed, status.code()),
        Ok(status) => (WorkflowState::Failed, status.code()),
        Err(e) => {
            error!(workflow_id, error = %e, "failed to wait on executor process");
            (WorkflowState::Failed, None)
        }
    };

    let mut registry = state.registry.lock().await;
    match registry.find(workflow_id) {
        // An abandon request already transitioned this entry; don't
        // clobber `abandoned` with `completed`/`failed` from a reap that
        // raced the SIGTERM.
        Some(entry) if entry.state == WorkflowState::Abandoned => {}
        Some(_) => {
            registry
                .mutate(workflow_id, |e| {
                    e.exit_code = exit_code;
                    e.transition(new_state, now());
                })
                .ok();
        }
        None => warn!(workflow_id, "reaped executor for unknown registry entry"),
    }
    drop(registry);

    if let Err(e) = state.persist_registry().await {
        error!(workflow_id, error = %e, "failed to persist registry after reap");
    }
    state.remove_channel(workflow_id).await;
    info!(workflow_id, ?new_state, "executor process reaped");
}

/// Send SIGTERM to `pid`, matching the teacher's graceful-first policy:
/// the daemon does not escalate to SIGKILL itself, relying on
/// `kill_on_drop` / the executor's own shutdown handling.
pub fn send_sigterm(pid: u32) -> Result<()> {
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret == 0 {
        Ok(())
    } else {
        Err(crate::error::ArgoError::System(format!(
            "kill({}, SIGTERM) failed: {}",
            pid,
            std::io::Error::last_os_error()
        )))
    }
}

/// True if `pid` refers to a live process, checked with a signal-0 probe.
/// Used at daemon startup to sweep registry entries left `running` by a
/// crashed daemon (spec.md scenario S6).
pub fn pid_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

/// Sweep registry entries stuck `running` from before this daemon started.
pub async fn startup_sweep(state: &Arc<DaemonState>) -> Result<usize> {
    let mut registry = state.registry.lock().await;
    registry.load(&state.registry_path)?;
    let swept = registry.sweep_dead_running(now(), pid_alive);
    drop(registry);
    if swept > 0 {
        state.persist_registry().await?;
    }
    Ok(swept)
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
