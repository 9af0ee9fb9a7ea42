//! Run configuration, stored as TOML.

use std::collections::BTreeMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mdspec_core::RunOptions;
use mdspec_expr::ExpressionEngine;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings for one fixture run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum tasks running at once
    pub max_concurrent: usize,
    /// Per-test timeout when a fixture declares none
    pub default_timeout_seconds: u64,
    /// Timeout for the shared build step
    pub build_timeout_seconds: u64,
    /// Emit per-fixture diagnostics
    pub verbose: bool,
    /// Bypass fixture-type caches
    pub no_cache: bool,
    /// Host executable exposed as `{{executable}}`
    pub executable: Option<PathBuf>,
    /// Fallback working directory
    pub working_dir: PathBuf,
    /// Free-form settings for custom fixture types
    pub extra: BTreeMap<String, String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_concurrent: thread::available_parallelism().map_or(4, NonZeroUsize::get),
            default_timeout_seconds: 300,
            build_timeout_seconds: 600,
            verbose: false,
            no_cache: false,
            executable: None,
            working_dir: PathBuf::from("."),
            extra: BTreeMap::new(),
        }
    }
}

impl RunConfig {
    /// Load config from a TOML file. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save config to a TOML file, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, format!("# mdspec run configuration\n\n{contents}"))?;
        Ok(())
    }

    /// Timeout applied to tests without their own
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_seconds)
    }

    /// Timeout applied to the shared build step
    #[must_use]
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_seconds)
    }

    /// Options handed to every fixture type.
    #[must_use]
    pub fn run_options(&self, engine: Arc<dyn ExpressionEngine>) -> RunOptions {
        RunOptions {
            working_dir: self.working_dir.clone(),
            verbose: self.verbose,
            no_cache: self.no_cache,
            engine,
            executable: self.executable.clone(),
            extra: self.extra.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use mdspec_expr::CelEngine;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert!(config.max_concurrent >= 1);
        assert_eq!(config.default_timeout(), Duration::from_secs(300));
        assert_eq!(config.build_timeout(), Duration::from_secs(600));
        assert!(config.executable.is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("mdspec.toml");
        fs::write(&path, "max_concurrent = 2\nverbose = true\n\n[extra]\nprofile = \"ci\"\n").expect("write");

        let config = RunConfig::load_from_file(&path).expect("load");
        assert_eq!(config.max_concurrent, 2);
        assert!(config.verbose);
        assert_eq!(config.default_timeout_seconds, 300);
        assert_eq!(config.extra.get("profile").map(String::as_str), Some("ci"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("nested/mdspec.toml");
        let config = RunConfig {
            max_concurrent: 3,
            executable: Some(PathBuf::from("/usr/local/bin/tool")),
            ..RunConfig::default()
        };
        config.save_to_file(&path).expect("save");
        assert_eq!(RunConfig::load_from_file(&path).expect("load"), config);
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("bad.toml");
        fs::write(&path, "max_concurrent = \"many\"").expect("write");
        assert!(RunConfig::load_from_file(&path).is_err());
    }

    #[test]
    fn test_run_options() {
        let config = RunConfig {
            no_cache: true,
            ..RunConfig::default()
        };
        let options = config.run_options(Arc::new(CelEngine::new()));
        assert!(options.no_cache);
        assert_eq!(options.engine.name(), "cel");
    }
}
