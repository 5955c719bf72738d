//! Filesystem-backed workflow template loader
//!
//! Resolves `workflow_call` targets to sibling template files under a
//! single templates directory, e.g. `templates_dir/child_flow.json`.

use crate::error::{ArgoError, Result};
use crate::graph::WorkflowGraph;
use crate::interpreter::GraphLoader;
use std::path::PathBuf;

pub struct FsGraphLoader {
    templates_dir: PathBuf,
}

impl FsGraphLoader {
    pub fn new(templates_dir: PathBuf) -> Self {
        Self { templates_dir }
    }
}

impl GraphLoader for FsGraphLoader {
    fn load(&self, name: &str) -> Result<WorkflowGraph> {
        let path = self.templates_dir.join(format!("{}.json", name));
        let data = std::fs::read_to_string(&path).map_err(|e| {
            ArgoError::NotFound(format!("workflow template {:?} ({}): {}", name, path.display(), e))
        })?;
        WorkflowGraph::from_json(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_loads_existing_template() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("child.json"),
            r#"{"workflow_name":"child","phases":[{"steps":[{"step":1,"type":"display","message":"hi","next_step":"EXIT"}]}]}"#,
        )
        .unwrap();

        let loader = FsGraphLoader::new(dir.path().to_path_buf());
        let graph = loader.load("child").unwrap();
        assert_eq!(graph.workflow_name, "child");
    }

    #[test]
    fn test_missing_template_is_not_found() {
        let dir = tempdir().unwrap();
        let loader = FsGraphLoader::new(dir.path().to_path_buf());
        let err = loader.load("missing").unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
