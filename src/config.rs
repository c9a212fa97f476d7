//! Runtime configuration.
//!
//! Precedence, highest first: command-line flags, `CONDUITD_STORAGE_QUOTA`,
//! `conduitd.toml` (explicit `--config` path, else the selected workspace),
//! built-in defaults.

use crate::store::DEFAULT_STORAGE_QUOTA_BYTES;
use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "conduitd.toml";
pub const QUOTA_ENV_VAR: &str = "CONDUITD_STORAGE_QUOTA";

#[derive(Debug, Clone, Parser)]
#[command(name = "conduitd", version, about = "Local assessment data service (JSON lines on stdin/stdout)")]
pub struct Cli {
    /// Open this workspace before reading requests
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Config file path (defaults to <workspace>/conduitd.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "conduitd=trace"
    #[arg(long)]
    pub log_level: Option<String>,

    /// Storage quota for the persisted document, in bytes
    #[arg(long)]
    pub storage_quota: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConduitConfig {
    #[serde(default = "default_quota")]
    pub storage_quota_bytes: u64,
    /// Where exports and backups go when a request gives no directory.
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
}

fn default_quota() -> u64 {
    DEFAULT_STORAGE_QUOTA_BYTES
}

impl Default for ConduitConfig {
    fn default() -> Self {
        Self {
            storage_quota_bytes: default_quota(),
            backup_dir: None,
        }
    }
}

impl ConduitConfig {
    pub fn backup_dir_for(&self, workspace: &Path) -> PathBuf {
        match &self.backup_dir {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => workspace.join(p),
            None => workspace.join("backups"),
        }
    }
}

pub fn parse_config(text: &str) -> anyhow::Result<ConduitConfig> {
    toml::from_str(text).context("failed to parse config")
}

/// Resolves the effective config for a workspace.
pub fn load_config(cli: &Cli, workspace: Option<&Path>) -> anyhow::Result<ConduitConfig> {
    let path = match &cli.config {
        Some(p) => {
            if !p.exists() {
                anyhow::bail!("config file not found: {}", p.display());
            }
            Some(p.clone())
        }
        None => workspace
            .map(|w| w.join(CONFIG_FILE_NAME))
            .filter(|p| p.is_file()),
    };

    let mut config = match path {
        Some(p) => {
            let text = std::fs::read_to_string(&p)
                .with_context(|| format!("failed to read config: {}", p.display()))?;
            parse_config(&text).with_context(|| format!("in {}", p.display()))?
        }
        None => ConduitConfig::default(),
    };

    if let Ok(raw) = std::env::var(QUOTA_ENV_VAR) {
        config.storage_quota_bytes = raw
            .trim()
            .parse()
            .with_context(|| format!("{QUOTA_ENV_VAR} must be a byte count, got `{raw}`"))?;
    }
    if let Some(q) = cli.storage_quota {
        config.storage_quota_bytes = q;
    }
    Ok(config)
}
