//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. [`Config::default`]
//! 2. a TOML file (`--config PATH`, else `<config dir>/config.toml` if present)
//! 3. environment variables prefixed `PATHFP_` (e.g. `PATHFP_ALGORITHM=sha256`)
//! 4. command-line flags, applied by the caller

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::changes::DEFAULT_QUEUE_DEPTH;
use crate::digest::DigestAlgorithm;
use crate::scanner::DEFAULT_READ_BUFFER_SIZE;

/// Prefix of environment variables read into the configuration.
pub const ENV_PREFIX: &str = "PATHFP_";

/// Errors raised while loading the configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A provider failed or a value has the wrong type.
    #[error("Invalid configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    MissingFile(PathBuf),

    /// A value is out of range.
    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid {
        key: &'static str,
        reason: &'static str,
    },

    /// No home directory to derive the default locations from.
    #[error("Failed to determine project directories")]
    NoProjectDirs,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Digest algorithm for new catalogs.
    pub algorithm: DigestAlgorithm,
    /// Where per-tree catalogs live when `--catalog` is not given.
    pub catalog_dir: Option<PathBuf>,
    /// Depth of the change reporting queue.
    pub report_queue_depth: usize,
    /// Chunk size used when streaming file contents.
    pub read_buffer_size: usize,
    /// Show a spinner on stderr while scanning.
    pub progress: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            algorithm: DigestAlgorithm::default(),
            catalog_dir: None,
            report_queue_depth: DEFAULT_QUEUE_DEPTH,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            progress: true,
        }
    }
}

impl Config {
    /// Load the layered configuration.
    ///
    /// # Errors
    ///
    /// Fails if `explicit` names a missing file, a layer cannot be parsed,
    /// or a value is out of range.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(explicit)?
            .extract()
            .map_err(|e| ConfigError::Extract(Box::new(e)))?;
        config.validate()?;
        Ok(config)
    }

    /// The provider stack, without extraction.
    pub fn figment(explicit: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::MissingFile(path.to_path_buf()));
                }
                log::debug!("Loading config file {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(path) = default_config_path().filter(|p| p.is_file()) {
                    log::debug!("Loading config file {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.report_queue_depth == 0 {
            return Err(ConfigError::Invalid {
                key: "report_queue_depth",
                reason: "must be at least 1",
            });
        }
        if self.read_buffer_size == 0 {
            return Err(ConfigError::Invalid {
                key: "read_buffer_size",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Directory holding per-tree catalogs.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoProjectDirs`] if no explicit directory is set and the
    /// platform data directory cannot be determined.
    pub fn resolved_catalog_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.catalog_dir {
            Some(dir) => Ok(dir.clone()),
            None => project_dirs()
                .map(|dirs| dirs.data_dir().join("catalogs"))
                .ok_or(ConfigError::NoProjectDirs),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "pathfingerprint", "pathfingerprint")
}

/// `<platform config dir>/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}
