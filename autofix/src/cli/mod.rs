pub mod app;
pub mod approval;
pub mod commands;

pub use app::{Cli, Commands};

use anyhow::{Context as _, Result};
use autofix_core::AutofixConfig;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

/// Resolved project root and configuration shared by all commands
pub struct Context {
    pub root: PathBuf,
    pub config: AutofixConfig,
}

impl Context {
    pub fn load(root: Option<&Path>, config: Option<&Path>) -> Result<Self> {
        let root = match root {
            Some(root) => root.to_path_buf(),
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        let root = root
            .canonicalize()
            .with_context(|| format!("Project root {} does not exist", root.display()))?;
        let loaded = AutofixConfig::load(config, &root)?;
        Ok(Self { root, config: loaded })
    }
}

/// Read a file, or stdin when no path is given
pub async fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await.context("Failed to read stdin")?;
            Ok(text)
        }
    }
}
