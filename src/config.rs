//! Configuration loading and path resolution.
//!
//! Supports CA_INSPECT_CONFIG env var override.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::expiry::DEFAULT_THRESHOLD_DAYS;
use crate::primary::{KeyRole, DEFAULT_MAX_CHAIN_DEPTH};

/// Puppet CA certificate bundle.
pub const DEFAULT_CA_PATH: &str = "/etc/puppetlabs/puppet/ssl/certs/ca.pem";
/// Puppet CA revocation list.
pub const DEFAULT_CRL_PATH: &str = "/etc/puppetlabs/puppet/ssl/crl.pem";

/// `[ca_expiry]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaExpiryConfig {
    pub paths: Vec<PathBuf>,
    pub threshold_days: u32,
}

impl Default for CaExpiryConfig {
    fn default() -> Self {
        Self {
            paths: vec![PathBuf::from(DEFAULT_CA_PATH)],
            threshold_days: DEFAULT_THRESHOLD_DAYS,
        }
    }
}

/// `[primary_cert]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryCertConfig {
    pub primary_path: Option<PathBuf>,
    pub ca_path: PathBuf,
    pub role: KeyRole,
    pub max_chain_depth: usize,
}

impl Default for PrimaryCertConfig {
    fn default() -> Self {
        Self {
            primary_path: None,
            ca_path: PathBuf::from(DEFAULT_CA_PATH),
            role: KeyRole::default(),
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }
}

/// `[crl]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrlConfig {
    pub path: PathBuf,
    pub threshold_days: u32,
}

impl Default for CrlConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CRL_PATH),
            threshold_days: DEFAULT_THRESHOLD_DAYS,
        }
    }
}

/// Whole config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ca_expiry: CaExpiryConfig,
    pub primary_cert: PrimaryCertConfig,
    pub crl: CrlConfig,
}

/// Config file location: CA_INSPECT_CONFIG, else the platform config dir.
pub fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var("CA_INSPECT_CONFIG") {
        PathBuf::from(p)
    } else if let Some(dirs) = directories::ProjectDirs::from("", "", "ca-inspect") {
        dirs.config_dir().join("config.toml")
    } else {
        PathBuf::from("ca-inspect.toml")
    }
}

impl Config {
    /// Load config (with shared lock when file exists). Missing file yields defaults.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        let mut file = fs::OpenOptions::new()
            .read(true)
            .open(path)
            .with_context(|| format!("open config: {}", path.display()))?;
        fs2::FileExt::lock_shared(&file)?;
        let mut s = String::new();
        file.read_to_string(&mut s)?;
        let cfg: Config =
            toml::from_str(&s).with_context(|| format!("parse config: {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from an explicit path, or the default location.
    pub fn load_from(explicit: Option<&Path>) -> Result<Config> {
        match explicit {
            Some(p) if !p.is_file() => anyhow::bail!("config file not found: {}", p.display()),
            Some(p) => Config::load(p),
            None => Config::load(&config_path()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.primary_cert.max_chain_depth == 0 {
            anyhow::bail!("primary_cert.max_chain_depth must be at least 1");
        }
        Ok(())
    }
}
