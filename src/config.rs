//! Application configuration management.
//!
//! Settings are layered, later layers winning:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, or `config.toml` in the platform config dir)
//! 3. `DUPSORT_*` environment variables (`__` separates nested keys)
//! 4. command-line flags
//!
//! ```toml
//! io_threads = 2
//! dedupe_sample_size = 10485760
//! ignore_patterns = ["*.tmp", "Thumbs.db"]
//! index_program = "synoindex"
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::CommandNotifier;
use crate::cli::Cli;
use crate::scanner::{DEDUPE_SAMPLE_SIZE, DEFAULT_EXCLUDED_DIRS, MOVE_SAMPLE_SIZE};

/// Prefix of environment variables read into the configuration.
pub const ENV_PREFIX: &str = "DUPSORT_";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration sources could not be merged or parsed.
    #[error("invalid configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// A value is out of range.
    #[error("invalid configuration value for {key}: {message}")]
    Invalid {
        /// Offending key
        key: &'static str,
        /// What is wrong with it
        message: String,
    },
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Threads used for fingerprinting.
    pub io_threads: usize,
    /// Sample size for duplicate detection.
    pub dedupe_sample_size: u64,
    /// Sample size for relocation conflict checks.
    pub move_sample_size: u64,
    /// Catalog database location; platform data dir when unset.
    pub catalog_path: Option<PathBuf>,
    /// Directory names skipped while walking.
    pub excluded_dirs: Vec<String>,
    /// Gitignore-style patterns skipped while walking.
    pub ignore_patterns: Vec<String>,
    /// Program run for index notifications.
    pub index_program: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            io_threads: 4,
            dedupe_sample_size: DEDUPE_SAMPLE_SIZE,
            move_sample_size: MOVE_SAMPLE_SIZE,
            catalog_path: None,
            excluded_dirs: DEFAULT_EXCLUDED_DIRS.iter().map(|s| (*s).to_string()).collect(),
            ignore_patterns: Vec::new(),
            index_program: CommandNotifier::DEFAULT_PROGRAM.to_string(),
        }
    }
}

impl Config {
    /// Build the layered figment for an optional config file.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load from `path` (or the default location), environment included.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a source cannot be parsed or a value is
    /// out of range.
    pub fn try_load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let default_path = Self::config_path();
        let path = path.or(default_path.as_deref());
        let config: Config = Self::figment(path).extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults on any error.
    #[must_use]
    pub fn load_from_path(path: impl AsRef<Path>) -> Self {
        match Self::try_load(Some(path.as_ref())) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Check that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.io_threads == 0 {
            return Err(ConfigError::Invalid {
                key: "io_threads",
                message: "must be at least 1".to_string(),
            });
        }
        if self.dedupe_sample_size == 0 {
            return Err(ConfigError::Invalid {
                key: "dedupe_sample_size",
                message: "must be at least 1 byte".to_string(),
            });
        }
        if self.move_sample_size == 0 {
            return Err(ConfigError::Invalid {
                key: "move_sample_size",
                message: "must be at least 1 byte".to_string(),
            });
        }
        if self.index_program.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "index_program",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Apply global command-line overrides.
    ///
    /// `--sample-size` applies to both workflows.
    pub fn merge_cli(&mut self, cli: &Cli) {
        if let Some(threads) = cli.io_threads {
            self.io_threads = threads.max(1);
        }
        if let Some(sample) = cli.sample_size {
            self.dedupe_sample_size = sample.max(1);
            self.move_sample_size = sample.max(1);
        }
    }

    /// Catalog path: explicit, configured, or the platform default.
    #[must_use]
    pub fn resolve_catalog_path(&self, explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.catalog_path.clone())
            .unwrap_or_else(Self::default_catalog_path)
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Default configuration file, if the platform has a config directory.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Default catalog database location.
    #[must_use]
    pub fn default_catalog_path() -> PathBuf {
        project_dirs()
            .map(|dirs| dirs.data_dir().join("catalog.db"))
            .unwrap_or_else(|| PathBuf::from("dupsort.db"))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "dupsort", "dupsort")
}
