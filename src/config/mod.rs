//! Deployment configuration, read once at startup.
//!
//! Precedence, highest first: environment overrides, the TOML file named by
//! `--config` or `KB_DEPLOYMENT_CONFIG`, built-in defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::annotator::dbcan::DbcanConfig;
use crate::consts::{
    DEFAULT_DBCAN_DIR, DEFAULT_DBCAN_SCRIPT, DEFAULT_SCRATCH, DEFAULT_SHELL,
    DEFAULT_TOOL_TIMEOUT_SECS, DEFAULT_WORKSPACE_URL, MAX_DIAGNOSTIC_BYTES,
};

pub const CONFIG_PATH_ENV: &str = "KB_DEPLOYMENT_CONFIG";
pub const WORKSPACE_URL_ENV: &str = "PRDCA_WORKSPACE_URL";
pub const SCRATCH_ENV: &str = "PRDCA_SCRATCH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Per-deployment settings shared by every call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ServiceConfig {
    pub workspace_url: String,
    /// Root under which each call creates its own working directory.
    pub scratch: PathBuf,
    pub dbcan_dir: PathBuf,
    pub dbcan_script: PathBuf,
    pub shell: String,
    pub tool_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workspace_url: DEFAULT_WORKSPACE_URL.to_string(),
            scratch: PathBuf::from(DEFAULT_SCRATCH),
            dbcan_dir: PathBuf::from(DEFAULT_DBCAN_DIR),
            dbcan_script: PathBuf::from(DEFAULT_DBCAN_SCRIPT),
            shell: DEFAULT_SHELL.to_string(),
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
        }
    }
}

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    prdca: ServiceConfig,
}

impl ServiceConfig {
    /// Load from `path`, falling back to `KB_DEPLOYMENT_CONFIG`, then defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
        let config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.with_env(|key| std::env::var(key).ok()).validated()
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse the `[prdca]` table of a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.prdca)
    }

    /// Apply environment overrides through `lookup`.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(WORKSPACE_URL_ENV).filter(|v| !v.is_empty()) {
            self.workspace_url = url;
        }
        if let Some(scratch) = lookup(SCRATCH_ENV).filter(|v| !v.is_empty()) {
            self.scratch = PathBuf::from(scratch);
        }
        self
    }

    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.workspace_url.trim().is_empty() {
            return Err(ConfigError::Invalid("workspace-url is empty".to_string()));
        }
        if self.shell.trim().is_empty() {
            return Err(ConfigError::Invalid("shell is empty".to_string()));
        }
        if self.tool_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "tool-timeout-secs must be positive".to_string(),
            ));
        }
        Ok(self)
    }

    /// Launch settings for the dbCAN wrapper.
    pub fn dbcan(&self) -> DbcanConfig {
        DbcanConfig {
            shell: self.shell.clone(),
            script: self.dbcan_script.clone(),
            install_dir: self.dbcan_dir.clone(),
            timeout: Duration::from_secs(self.tool_timeout_secs),
            max_diagnostic_bytes: MAX_DIAGNOSTIC_BYTES,
        }
    }
}
