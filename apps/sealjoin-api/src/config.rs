//! Server configuration
//!
//! Layered, later layers win: built-in defaults, an optional TOML file,
//! environment variables, then command-line flags.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line arguments for the SealJoin server
#[derive(Parser, Debug, Default)]
#[command(name = "sealjoin-api")]
#[command(about = "Contract merge and seal stamping server")]
pub struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "SEALJOIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host address to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Store documents in this directory instead of memory
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// JSON seal catalog
    #[arg(long)]
    pub seals: Option<PathBuf>,

    /// Maximum decoded upload size in bytes
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Seconds a session may sit idle before it is dropped
    #[arg(long)]
    pub session_ttl_secs: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageConfig {
    Memory,
    Filesystem { root: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub session_ttl_secs: u64,
    pub storage: StorageConfig,
    /// Seal catalog file; the built-in sample seals when absent
    pub seals: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            max_upload_bytes: 50 * 1024 * 1024,
            session_ttl_secs: 60 * 60,
            storage: StorageConfig::Memory,
            seals: None,
        }
    }
}

impl ServerConfig {
    /// Resolve the effective configuration for this process
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_args(args);
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(port) = var("PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("PORT is not a valid port: {}", port))?;
        }
        if let Some(dir) = var("SEALJOIN_STORAGE_DIR") {
            self.storage = StorageConfig::Filesystem { root: dir.into() };
        }
        if let Some(seals) = var("SEALJOIN_SEALS") {
            self.seals = Some(seals.into());
        }
        Ok(())
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(host) = &args.host {
            self.host = host.clone();
        }
        if let Some(root) = &args.storage_dir {
            self.storage = StorageConfig::Filesystem { root: root.clone() };
        }
        if let Some(seals) = &args.seals {
            self.seals = Some(seals.clone());
        }
        if let Some(limit) = args.max_upload_bytes {
            self.max_upload_bytes = limit;
        }
        if let Some(ttl) = args.session_ttl_secs {
            self.session_ttl_secs = ttl;
        }
    }
}
