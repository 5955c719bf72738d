//! Configuration loader
//!
//! Looks for `argo.toml` first next to the current working directory,
//! then under the user's config directory, merging onto defaults. Missing
//! files are not an error; malformed ones are.

use super::schema::ArgoConfig;
use crate::error::{ArgoError, Result};
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Candidate paths, checked in order; the first one that exists wins.
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./argo.toml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("argo").join("argo.toml"));
        }
        paths
    }

    pub fn load() -> Result<ArgoConfig> {
        for path in Self::candidate_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(ArgoConfig::default())
    }

    pub fn load_from(path: &Path) -> Result<ArgoConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ArgoError::Config(format!("reading {}: {}", path.display(), e)))?;
        toml::from_str(&contents)
            .map_err(|e| ArgoError::Config(format!("parsing {}: {}", path.display(), e)))
    }

    /// Expand a leading `~` in a config path to the user's home directory.
    pub fn expand_home(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(!path.exists());
        // load_from a missing file is still an error (explicit path given);
        // the "missing is fine" behavior lives in load()'s existence check.
        assert!(ConfigLoader::load_from(&path).is_err());
    }

    #[test]
    fn test_load_from_valid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("argo.toml");
        std::fs::write(&path, "[daemon]\nport = 1234\n").unwrap();
        let cfg = ConfigLoader::load_from(&path).unwrap();
        assert_eq!(cfg.daemon.port, 1234);
    }

    #[test]
    fn test_load_from_malformed_file_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("argo.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();
        let err = ConfigLoader::load_from(&path).unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }

    #[test]
    fn test_expand_home_prefix() {
        if let Some(home) = dirs::home_dir() {
            let expanded = ConfigLoader::expand_home("~/.argo/registry.json");
            assert_eq!(expanded, home.join(".argo/registry.json"));
        }
    }

    #[test]
    fn test_expand_home_noop_without_prefix() {
        let expanded = ConfigLoader::expand_home("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }
}
