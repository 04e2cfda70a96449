use crate::tree::{TreeConfig, TreeLimits};
use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ROOT_ENV: &str = "FILES_DIRECTORY";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub root: Root,
    pub server: Server,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub listing: Listing,
    #[serde(default)]
    pub logging: Logging,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Root {
    #[serde(default)]
    pub root_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    pub bind_addr: String,
    pub port: u16,
    #[serde(default = "default_base_path")]
    pub base_path: String,
}
fn default_base_path() -> String { "/files".to_string() }

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct Limits {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_request_timeout", rename = "request_timeout_ms")]
    pub request_timeout: Duration,
}
fn default_max_depth() -> usize { TreeLimits::default().max_depth }
fn default_max_entries() -> usize { TreeLimits::default().max_entries }
fn default_request_timeout() -> Duration { Duration::from_secs(10) }

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_entries: default_max_entries(),
            request_timeout: default_request_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Listing {
    #[serde(default)]
    pub sort_children: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Logging {
    #[serde(default)]
    pub format: LogFormat,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::parse(path, &raw)
    }

    fn parse(path: &Path, raw: &str) -> anyhow::Result<Self> {
        let mut cfg: Config = if path.extension().map(|e| e == "json").unwrap_or(false) {
            serde_json::from_str(raw)?
        } else {
            toml::from_str(raw)?
        };
        cfg.apply_env(std::env::var_os(ROOT_ENV).map(PathBuf::from));
        Ok(cfg)
    }

    fn apply_env(&mut self, root_override: Option<PathBuf>) {
        if let Some(dir) = root_override.filter(|d| !d.as_os_str().is_empty()) {
            self.root.root_dir = dir;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.root.root_dir.as_os_str().is_empty() {
            anyhow::bail!("root_dir is not set (config [root] or {ROOT_ENV})");
        }
        if !self.root.root_dir.is_absolute() {
            anyhow::bail!("root_dir must be absolute: {}", self.root.root_dir.display());
        }
        if !self.root.root_dir.is_dir() {
            anyhow::bail!("root_dir does not exist or is not a directory: {}", self.root.root_dir.display());
        }
        let base = &self.server.base_path;
        if !base.starts_with('/') || (base.len() > 1 && base.ends_with('/')) {
            anyhow::bail!("base_path must start with '/' and not end with '/': {base}");
        }
        if self.limits.max_depth == 0 { anyhow::bail!("max_depth must be > 0"); }
        if self.limits.max_entries == 0 { anyhow::bail!("max_entries must be > 0"); }
        if self.limits.request_timeout.is_zero() { anyhow::bail!("request_timeout_ms must be > 0"); }
        Ok(())
    }

    pub fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            root: self.root.root_dir.clone(),
            limits: TreeLimits {
                max_depth: self.limits.max_depth,
                max_entries: self.limits.max_entries,
            },
            sort_children: self.listing.sort_children,
            request_timeout: self.limits.request_timeout,
        }
    }
}
