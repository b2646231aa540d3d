//! Configuration loading
//!
//! Settings live in TOML. Lookup order: an explicit path, then
//! `.autofix.toml` in the project root, then `autofix/config.toml` under the
//! user config directory, then built-in defaults.

use crate::actions::{ExecutorConfig, SafetyPolicy};
use crate::diagnostics::DiagnosticsConfig;
use crate::fix::FixConfig;
use crate::llm::OpenAICompatConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const PROJECT_CONFIG_FILE: &str = ".autofix.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },

    #[error("Invalid safety pattern: {0}")]
    InvalidPattern(String),
}

/// Extra command patterns layered over the built-in safety tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyPolicyConfig {
    /// Regexes that always require approval
    pub denied: Vec<String>,
    /// Regexes for additional read-only tools
    pub allowed: Vec<String>,
}

impl SafetyPolicyConfig {
    pub fn build(&self) -> Result<SafetyPolicy, ConfigError> {
        SafetyPolicy::new(&self.denied, &self.allowed).map_err(|e| ConfigError::InvalidPattern(e.to_string()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutofixConfig {
    pub engine: FixConfig,
    pub executor: ExecutorConfig,
    pub diagnostics: DiagnosticsConfig,
    pub safety: SafetyPolicyConfig,
    pub model: OpenAICompatConfig,
}

impl AutofixConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read { path: path.to_path_buf(), message: e.to_string() })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse { path: path.to_path_buf(), message: e.to_string() })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Write { path: path.to_path_buf(), message: e.to_string() })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write { path: path.to_path_buf(), message: e.to_string() })
    }

    /// User-level config location
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("autofix").join("config.toml"))
    }

    /// Resolve and load configuration for a project
    ///
    /// An explicit path must exist; the other locations are optional.
    pub fn load(explicit: Option<&Path>, project_root: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let candidates = std::iter::once(project_root.join(PROJECT_CONFIG_FILE)).chain(Self::user_config_path());
        for candidate in candidates {
            if candidate.is_file() {
                debug!("Loading config from {}", candidate.display());
                return Self::from_file(&candidate);
            }
        }
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PROJECT_CONFIG_FILE);
        std::fs::write(
            &path,
            "[engine]\nmax_retries = 5\n\n[safety]\nallowed = ['^mytool( |$)']\n\n[model]\nmodel = \"llama3\"\n",
        )
        .unwrap();

        let config = AutofixConfig::load(None, dir.path()).unwrap();
        assert_eq!(config.engine.max_retries, 5);
        assert_eq!(config.engine.history_ceiling, 3);
        assert_eq!(config.engine.attempt_bound(), 3);
        assert_eq!(config.diagnostics.debounce_ms, 1200);
        assert!(!config.diagnostics.auto_fix_on_save);
        assert_eq!(config.model.model, "llama3");

        let policy = config.safety.build().unwrap();
        assert!(policy.is_safe("mytool --check"));
    }

    #[test]
    fn test_save_round_trip_and_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");
        AutofixConfig::default().save(&path).unwrap();
        let loaded = AutofixConfig::load(Some(&path), dir.path()).unwrap();
        assert_eq!(loaded.executor.timeout_secs, 120);

        let missing = AutofixConfig::load(Some(&dir.path().join("nope.toml")), dir.path());
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        std::fs::write(&path, "engine = 3").unwrap();
        assert!(matches!(AutofixConfig::from_file(&path), Err(ConfigError::Parse { .. })));

        let bad = SafetyPolicyConfig { denied: vec!["(".into()], allowed: vec![] };
        assert!(matches!(bad.build(), Err(ConfigError::InvalidPattern(_))));
    }
}
