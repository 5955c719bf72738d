//! Daemon state
//!
//! A single `Mutex`-guarded state value, following the teacher's
//! app-state-under-one-lock shape: every handler serializes through it, so
//! the daemon is atomic from a caller's perspective without a hand-rolled
//! actor loop (spec.md §5, §9).

use crate::config::ArgoConfig;
use crate::io_channel::{InputQueue, OutputSink};
use crate::persona::PersonaRegistry;
use crate::registry::WorkflowRegistry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The I/O channel pair backing one running workflow's stdin/stdout
/// equivalent (spec.md §4.3).
pub struct IoChannelPair {
    pub input: InputQueue,
    pub output: OutputSink,
}

impl IoChannelPair {
    pub fn new(log_path: PathBuf) -> Self {
        Self {
            input: InputQueue::new(),
            output: OutputSink::new(log_path),
        }
    }
}

pub struct DaemonState {
    pub config: ArgoConfig,
    pub registry: Mutex<WorkflowRegistry>,
    pub channels: Mutex<HashMap<String, Arc<IoChannelPair>>>,
    pub personas: Mutex<PersonaRegistry>,
    pub registry_path: PathBuf,
    pub templates_dir: PathBuf,
    pub log_dir: PathBuf,
    pub personas_path: PathBuf,
    pub start_time: i64,
}

impl DaemonState {
    pub fn new(config: ArgoConfig, now: i64) -> Self {
        let registry_path = crate::config::ConfigLoader::expand_home(&config.daemon.registry_path);
        let templates_dir = crate::config::ConfigLoader::expand_home(&config.daemon.templates_dir);
        let log_dir = crate::config::ConfigLoader::expand_home(&config.daemon.log_dir);
        let personas_path = crate::config::ConfigLoader::expand_home(&config.daemon.personas_path);
        Self {
            config,
            registry: Mutex::new(WorkflowRegistry::new()),
            channels: Mutex::new(HashMap::new()),
            personas: Mutex::new(PersonaRegistry::new()),
            registry_path,
            templates_dir,
            log_dir,
            personas_path,
            start_time: now,
        }
    }

    pub fn log_path_for(&self, workflow_id: &str) -> PathBuf {
        self.log_dir.join(format!("{}.log", workflow_id))
    }

    pub fn graph_path_for(&self, workflow_name: &str) -> PathBuf {
        self.templates_dir.join(format!("{}.json", workflow_name))
    }

    /// Path to the per-workflow seed context file written from a start
    /// request's `args`/`env` fields and read back by the executor before
    /// it begins interpreting the graph (spec.md §4.6).
    pub fn context_seed_path_for(&self, workflow_id: &str) -> PathBuf {
        self.log_dir.join(format!("{}.context.json", workflow_id))
    }

    pub async fn channel_for(&self, workflow_id: &str) -> Option<Arc<IoChannelPair>> {
        self.channels.lock().await.get(workflow_id).cloned()
    }

    pub async fn register_channel(&self, workflow_id: String, channel: Arc<IoChannelPair>) {
        self.channels.lock().await.insert(workflow_id, channel);
    }

    pub async fn remove_channel(&self, workflow_id: &str) {
        self.channels.lock().await.remove(workflow_id);
    }

    /// Persist the registry to disk. Called after every state mutation so
    /// a daemon restart picks up where it left off (spec.md §4.1).
    pub async fn persist_registry(&self) -> crate::error::Result<()> {
        let registry = self.registry.lock().await;
        registry.save(&self.registry_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_and_graph_paths_join_correctly() {
        let state = DaemonState::new(ArgoConfig::default(), 0);
        assert!(state.log_path_for("deploy_01").ends_with("deploy_01.log"));
        assert!(state.graph_path_for("deploy").ends_with("deploy.json"));
    }

    #[tokio::test]
    async fn test_channel_register_and_remove() {
        let state = DaemonState::new(ArgoConfig::default(), 0);
        let channel = Arc::new(IoChannelPair::new(state.log_path_for("a")));
        state.register_channel("a".to_string(), channel).await;
        assert!(state.channel_for("a").await.is_some());
        state.remove_channel("a").await;
        assert!(state.channel_for("a").await.is_none());
    }
}
