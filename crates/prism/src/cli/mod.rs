//! Command handlers.

pub mod config;
pub mod profiles;
pub mod serve;

use std::path::{Path, PathBuf};

use anyhow::Context;
use prism_core::Config;

/// Expand `~` in a user-supplied path.
pub fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}

/// Load the config from `path`, or from the default location when `None`.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            let path = expand_path(path);
            Config::load_from(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => Ok(Config::load()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prism.toml");
        std::fs::write(&path, "[pool]\nworkers = 7\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.pool.workers, 7);
        assert_eq!(config.pool.queue_capacity, 50);
    }

    #[test]
    fn test_load_missing_explicit_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn test_invalid_explicit_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prism.toml");
        std::fs::write(&path, "[pool]\nworkers = 0\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
