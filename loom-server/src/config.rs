//! Config & CLI: project configuration loaded from a YAML manifest and
//! validated before the server starts. The CLI layer (in the `loom` binary
//! crate) reads the manifest file and hands a `ProjectConfig` to `loom-server`.

use std::path::{Path, PathBuf};

use loom_core::Alias;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub root: PathBuf,
    pub aliases: Vec<AliasEntry>,
    pub host: String,
    pub port: u16,
    pub cors: bool,
    pub log_filter: String,
    pub file_cache_capacity: usize,
    pub rewrite_cache_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AliasEntry {
    pub find: String,
    pub replacement: String,
}

impl From<AliasEntry> for Alias {
    fn from(entry: AliasEntry) -> Self {
        Alias {
            find: entry.find,
            replacement: entry.replacement,
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            aliases: Vec::new(),
            host: "127.0.0.1".to_string(),
            port: 5173,
            cors: true,
            log_filter: "info".to_string(),
            file_cache_capacity: loom_core::cache::DEFAULT_FILE_CACHE_CAPACITY,
            rewrite_cache_capacity: loom_core::cache::DEFAULT_REWRITE_CACHE_CAPACITY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("project root {0:?} does not exist or is not a directory")]
    RootNotADirectory(PathBuf),

    #[error("invalid port: {0}")]
    InvalidPort(u16),

    #[error("alias {0:?} has an empty find or replacement")]
    InvalidAlias(String),
}

impl ProjectConfig {
    /// Loads and validates a manifest. `LOOM_PORT`/`LOOM_HOST` environment
    /// variables override the manifest when present.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config: ProjectConfig = serde_yaml::from_str(&text)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("LOOM_PORT") {
            if let Ok(parsed) = port.parse() {
                self.port = parsed;
            }
        }
        if let Ok(host) = std::env::var("LOOM_HOST") {
            self.host = host;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.root.is_dir() {
            return Err(ConfigError::RootNotADirectory(self.root.clone()));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        for alias in &self.aliases {
            if alias.find.is_empty() || alias.replacement.is_empty() {
                return Err(ConfigError::InvalidAlias(alias.find.clone()));
            }
        }
        Ok(())
    }
}
