//! Workflow registry
//!
//! A durable, in-memory map of `WorkflowEntry` records, persisted to a JSON
//! file with atomic (temp-file + rename) writes. Mirrors the repository
//! method surface of a database-backed store, but is deliberately not
//! backed by SQLite: spec.md requires a plain JSON registry file at a
//! well-known path (see DESIGN.md for the rationale).
//!
//! Per spec.md §4.1 the registry is *not* internally synchronized; callers
//! (the daemon's single owning task) serialize access externally.

use crate::error::{ArgoError, Result};
use crate::workflow::{WorkflowEntry, WorkflowState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// On-disk registry document shape (spec.md §6).
#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
    workflows: Vec<WorkflowEntry>,
}

/// In-memory registry of workflow entries.
#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    entries: HashMap<String, WorkflowEntry>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Insert a new entry. Fails with `Duplicate` if the id already exists.
    pub fn add(&mut self, entry: WorkflowEntry) -> Result<()> {
        if self.entries.contains_key(&entry.id) {
            return Err(ArgoError::Duplicate(entry.id.clone()));
        }
        self.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    /// Delete an entry. Fails with `NotFound` if missing.
    pub fn remove(&mut self, id: &str) -> Result<WorkflowEntry> {
        self.entries
            .remove(id)
            .ok_or_else(|| ArgoError::NotFound(id.to_string()))
    }

    /// Transition an entry's state; terminal states set `end_time`.
    pub fn update_state(&mut self, id: &str, new_state: WorkflowState, now: i64) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| ArgoError::NotFound(id.to_string()))?;
        entry.transition(new_state, now);
        Ok(())
    }

    /// Update only the `current_step` field.
    pub fn update_progress(&mut self, id: &str, current_step: u64) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| ArgoError::NotFound(id.to_string()))?;
        entry.current_step = current_step;
        Ok(())
    }

    /// Transition an entry to `running`, recording the executor's pid.
    pub fn mark_running(&mut self, id: &str, pid: u32, now: i64) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| ArgoError::NotFound(id.to_string()))?;
        entry.mark_running(pid, now);
        Ok(())
    }

    /// Return a copy of the entry, or `None` if missing.
    pub fn find(&self, id: &str) -> Option<WorkflowEntry> {
        self.entries.get(id).cloned()
    }

    /// Apply `f` to the entry in place. Fails with `NotFound` if missing.
    pub fn mutate(&mut self, id: &str, f: impl FnOnce(&mut WorkflowEntry)) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| ArgoError::NotFound(id.to_string()))?;
        f(entry);
        Ok(())
    }

    /// Snapshot copy of all entries.
    pub fn list(&self) -> Vec<WorkflowEntry> {
        self.entries.values().cloned().collect()
    }

    /// Count entries matching a state, or all entries when `state` is `None`.
    pub fn count(&self, state: Option<WorkflowState>) -> usize {
        match state {
            Some(s) => self.entries.values().filter(|e| e.state == s).count(),
            None => self.entries.len(),
        }
    }

    /// Remove every terminal entry whose `end_time < older_than`. Returns
    /// the number removed. Never removes pending/running/paused entries.
    pub fn prune(&mut self, older_than: i64) -> usize {
        let to_remove: Vec<String> = self
            .entries
            .values()
            .filter(|e| e.is_terminal() && e.end_time.map(|t| t < older_than).unwrap_or(false))
            .map(|e| e.id.clone())
            .collect();

        for id in &to_remove {
            self.entries.remove(id);
        }
        to_remove.len()
    }

    /// Allocate the next id for a template, honoring an explicit suffix
    /// when given, otherwise picking `template_NN + 1` from existing ids.
    pub fn allocate_id(&self, template: &str, suffix: Option<&str>) -> String {
        if let Some(suffix) = suffix {
            return format!("{}_{}", template, suffix);
        }
        let prefix = format!("{}_", template);
        let max_n = self
            .entries
            .keys()
            .filter_map(|id| id.strip_prefix(&prefix))
            .filter_map(|rest| rest.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("{}_{:02}", template, max_n + 1)
    }

    /// Write the registry to `path` atomically: serialize to a sibling
    /// temp file, then rename over the target. Never leaves a corrupt file
    /// on disk, even if the process is killed mid-write.
    pub fn save(&self, path: &Path) -> Result<()> {
        let doc = RegistryFile {
            workflows: self.list(),
        };
        let json = serde_json::to_string_pretty(&doc)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_path = Self::temp_path(path);
        {
            let mut f = std::fs::File::create(&tmp_path)?;
            f.write_all(json.as_bytes())?;
            f.sync_all()?;
        }
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Load the registry from `path`. A missing file succeeds with the
    /// registry left unchanged. Unparseable entries are skipped with a
    /// logged warning; the rest load normally.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "registry file does not exist, starting empty");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let raw: serde_json::Value = serde_json::from_slice(&bytes)?;
        let entries_raw = raw
            .get("workflows")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut loaded = HashMap::new();
        for (idx, entry_val) in entries_raw.into_iter().enumerate() {
            match serde_json::from_value::<WorkflowEntry>(entry_val) {
                Ok(entry) => {
                    loaded.insert(entry.id.clone(), entry);
                }
                Err(e) => {
                    warn!(index = idx, error = %e, "skipping unparseable registry entry");
                }
            }
        }
        self.entries = loaded;
        Ok(())
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut tmp = path.to_path_buf();
        let file_name = tmp
            .file_name()
            .map(|n| format!(".{}.tmp", n.to_string_lossy()))
            .unwrap_or_else(|| ".registry.tmp".to_string());
        tmp.set_file_name(file_name);
        tmp
    }

    /// Sweep `running` entries whose pid is no longer alive to `failed`.
    /// Called once at daemon startup (spec.md §4.6, scenario S6).
    pub fn sweep_dead_running(&mut self, now: i64, is_alive: impl Fn(u32) -> bool) -> usize {
        let mut swept = 0;
        for entry in self.entries.values_mut() {
            if entry.state == WorkflowState::Running && !is_alive(entry.pid) {
                entry.transition(WorkflowState::Failed, now);
                entry.exit_code = entry.exit_code.or(Some(-1));
                swept += 1;
            }
        }
        swept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(id: &str) -> WorkflowEntry {
        WorkflowEntry::new(id, "deploy")
    }

    #[test]
    fn test_mark_running_sets_pid() {
        let mut reg = WorkflowRegistry::new();
        reg.add(entry("a")).unwrap();
        reg.mark_running("a", 555, 10).unwrap();
        let e = reg.find("a").unwrap();
        assert_eq!(e.pid, 555);
        assert_eq!(e.state, WorkflowState::Running);
    }

    #[test]
    fn test_mutate_applies_closure_in_place() {
        let mut reg = WorkflowRegistry::new();
        reg.add(entry("a")).unwrap();
        reg.mutate("a", |e| e.exit_code = Some(3)).unwrap();
        assert_eq!(reg.find("a").unwrap().exit_code, Some(3));
    }

    #[test]
    fn test_add_duplicate_fails() {
        let mut reg = WorkflowRegistry::new();
        reg.add(entry("a")).unwrap();
        let err = reg.add(entry("a")).unwrap_err();
        assert_eq!(err.code(), "DUPLICATE");
    }

    #[test]
    fn test_remove_missing_fails() {
        let mut reg = WorkflowRegistry::new();
        let err = reg.remove("nope").unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_update_state_sets_end_time_on_terminal() {
        let mut reg = WorkflowRegistry::new();
        reg.add(entry("a")).unwrap();
        reg.update_state("a", WorkflowState::Running, 10).unwrap();
        reg.update_state("a", WorkflowState::Completed, 20).unwrap();
        let e = reg.find("a").unwrap();
        assert_eq!(e.end_time, Some(20));
    }

    #[test]
    fn test_update_progress_only_touches_current_step() {
        let mut reg = WorkflowRegistry::new();
        reg.add(entry("a")).unwrap();
        reg.update_progress("a", 7).unwrap();
        assert_eq!(reg.find("a").unwrap().current_step, 7);
    }

    #[test]
    fn test_count_all_and_by_state() {
        let mut reg = WorkflowRegistry::new();
        reg.add(entry("a")).unwrap();
        reg.add(entry("b")).unwrap();
        reg.update_state("a", WorkflowState::Running, 1).unwrap();
        assert_eq!(reg.count(None), 2);
        assert_eq!(reg.count(Some(WorkflowState::Running)), 1);
        assert_eq!(reg.count(Some(WorkflowState::Pending)), 1);
    }

    #[test]
    fn test_prune_removes_only_old_terminal_entries() {
        let mut reg = WorkflowRegistry::new();
        reg.add(entry("old-done")).unwrap();
        reg.update_state("old-done", WorkflowState::Completed, 100)
            .unwrap();

        reg.add(entry("new-done")).unwrap();
        reg.update_state("new-done", WorkflowState::Completed, 10_000)
            .unwrap();

        reg.add(entry("still-running")).unwrap();
        reg.update_state("still-running", WorkflowState::Running, 100)
            .unwrap();

        let removed = reg.prune(5_000);
        assert_eq!(removed, 1);
        assert!(reg.find("old-done").is_none());
        assert!(reg.find("new-done").is_some());
        assert!(reg.find("still-running").is_some());
    }

    #[test]
    fn test_prune_never_touches_pending() {
        let mut reg = WorkflowRegistry::new();
        reg.add(entry("a")).unwrap();
        let removed = reg.prune(i64::MAX);
        assert_eq!(removed, 0);
        assert!(reg.find("a").is_some());
    }

    #[test]
    fn test_allocate_id_with_explicit_suffix() {
        let reg = WorkflowRegistry::new();
        assert_eq!(reg.allocate_id("deploy", Some("prod")), "deploy_prod");
    }

    #[test]
    fn test_allocate_id_increments_highest_existing() {
        let mut reg = WorkflowRegistry::new();
        reg.add(entry("deploy_01")).unwrap();
        reg.add(entry("deploy_03")).unwrap();
        assert_eq!(reg.allocate_id("deploy", None), "deploy_04");
    }

    #[test]
    fn test_allocate_id_first_for_template() {
        let reg = WorkflowRegistry::new();
        assert_eq!(reg.allocate_id("deploy", None), "deploy_01");
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");

        let mut reg = WorkflowRegistry::new();
        reg.add(entry("a")).unwrap();
        reg.update_state("a", WorkflowState::Running, 5).unwrap();
        reg.save(&path).unwrap();

        let mut reloaded = WorkflowRegistry::new();
        reloaded.load(&path).unwrap();
        assert_eq!(reloaded.count(None), 1);
        assert_eq!(reloaded.find("a").unwrap().state, WorkflowState::Running);
    }

    #[test]
    fn test_load_missing_file_leaves_registry_unchanged() {
        let mut reg = WorkflowRegistry::new();
        reg.add(entry("a")).unwrap();
        reg.load(Path::new("/nonexistent/path/registry.json")).unwrap();
        assert_eq!(reg.count(None), 1);
    }

    #[test]
    fn test_load_skips_unparseable_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(
            &path,
            r#"{"workflows": [{"id": "good", "name": "x", "state": "pending", "pid": 0, "start_time": null, "end_time": null, "exit_code": null, "abandon_requested": false, "current_step": 0, "total_steps": 0, "timeout_secs": 0, "retry_count": 0, "max_retries": 0, "last_retry_time": null}, {"totally": "wrong shape"}]}"#,
        )
        .unwrap();

        let mut reg = WorkflowRegistry::new();
        reg.load(&path).unwrap();
        assert_eq!(reg.count(None), 1);
        assert!(reg.find("good").is_some());
    }

    #[test]
    fn test_sweep_dead_running_to_failed() {
        let mut reg = WorkflowRegistry::new();
        let mut e = entry("a");
        e.mark_running(99999, 1);
        reg.add(e).unwrap();

        let swept = reg.sweep_dead_running(100, |_pid| false);
        assert_eq!(swept, 1);
        assert_eq!(reg.find("a").unwrap().state, WorkflowState::Failed);
    }

    #[test]
    fn test_sweep_leaves_live_running_alone() {
        let mut reg = WorkflowRegistry::new();
        let mut e = entry("a");
        e.mark_running(1, 1);
        reg.add(e).unwrap();

        let swept = reg.sweep_dead_running(100, |_pid| true);
        assert_eq!(swept, 0);
        assert_eq!(reg.find("a").unwrap().state, WorkflowState::Running);
    }
}
