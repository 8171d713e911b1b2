//! Store configuration
//!
//! Provides file- and environment-based configuration with validation.
//!
//! # Example
//!
//! ```no_run
//! use unistore_runtime::config::{ReentrancyPolicy, StoreConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from UNISTORE_CONFIG / UNISTORE_* environment variables (defaults otherwise)
//! let config = StoreConfig::from_env()?;
//!
//! // Or build explicitly
//! let config = StoreConfig::default()
//!     .with_name("hello-world")
//!     .with_reentrancy(ReentrancyPolicy::Reject);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable naming a TOML config file
pub const CONFIG_PATH_VAR: &str = "UNISTORE_CONFIG";

/// Environment variable overriding [`StoreConfig::name`]
pub const STORE_NAME_VAR: &str = "UNISTORE_STORE_NAME";

/// Environment variable overriding [`StoreConfig::reentrancy`]
pub const REENTRANCY_VAR: &str = "UNISTORE_REENTRANCY";

/// Configuration error
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        /// File that failed
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`StoreConfig`]
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Invalid reentrancy policy value
    #[error("Invalid reentrancy policy: {0} (expected `queue` or `reject`)")]
    InvalidReentrancy(String),

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// What happens when an observer dispatches while a dispatch is in progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReentrancyPolicy {
    /// Append to a FIFO, processed once the current dispatch has notified
    #[default]
    Queue,

    /// Fail the nested dispatch with `StoreError::ReentrantDispatch`
    Reject,
}

impl FromStr for ReentrancyPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queue" => Ok(Self::Queue),
            "reject" => Ok(Self::Reject),
            _ => Err(ConfigError::InvalidReentrancy(s.to_string())),
        }
    }
}

impl fmt::Display for ReentrancyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queue => write!(f, "queue"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use unistore_runtime::config::StoreConfig;
///
/// let config = StoreConfig::from_toml_str(r#"
///     name = "todos"
///     reentrancy = "reject"
///     max_queued_actions = 64
/// "#)?;
///
/// assert_eq!(config.name, "todos");
/// assert_eq!(config.dlq_max_size, 100); // default
/// # Ok::<(), unistore_runtime::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store name, used in tracing spans and metric labels
    pub name: String,
    /// Policy for dispatches made while a dispatch is in progress
    pub reentrancy: ReentrancyPolicy,
    /// Upper bound on queued reentrant actions
    pub max_queued_actions: usize,
    /// Notify observers even when the reducer left the state unchanged
    pub notify_on_unchanged: bool,
    /// Turn reducer panics into `StoreError::ReducerPanicked`
    pub catch_reducer_panics: bool,
    /// Maximum size of the dead letter queue
    pub dlq_max_size: usize,
}

impl StoreConfig {
    /// Create a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the reentrancy policy
    #[must_use]
    pub const fn with_reentrancy(mut self, policy: ReentrancyPolicy) -> Self {
        self.reentrancy = policy;
        self
    }

    /// Set the queued action limit
    #[must_use]
    pub const fn with_max_queued_actions(mut self, max: usize) -> Self {
        self.max_queued_actions = max;
        self
    }

    /// Notify observers on unchanged reductions too
    #[must_use]
    pub const fn with_notify_on_unchanged(mut self, notify: bool) -> Self {
        self.notify_on_unchanged = notify;
        self
    }

    /// Enable or disable catching reducer panics
    #[must_use]
    pub const fn with_catch_reducer_panics(mut self, catch: bool) -> Self {
        self.catch_reducer_panics = catch;
        self
    }

    /// Set the DLQ maximum size
    #[must_use]
    pub const fn with_dlq_max_size(mut self, max_size: usize) -> Self {
        self.dlq_max_size = max_size;
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a value is out of range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation("name cannot be empty".to_string()));
        }
        if self.reentrancy == ReentrancyPolicy::Queue && self.max_queued_actions == 0 {
            return Err(ConfigError::Validation(
                "max_queued_actions must be > 0 when reentrancy is `queue`".to_string(),
            ));
        }
        if self.dlq_max_size == 0 {
            return Err(ConfigError::Validation("dlq_max_size must be > 0".to_string()));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    ///
    /// Missing keys take their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse or fails validation
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Load configuration from the process environment
    ///
    /// Reads the file named by `UNISTORE_CONFIG` if set (defaults otherwise),
    /// then applies `UNISTORE_STORE_NAME` and `UNISTORE_REENTRANCY`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or an override is invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`StoreConfig::from_env`], reading variables through `lookup`
    ///
    /// # Errors
    ///
    /// Returns an error if the file or an override is invalid
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_VAR) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(name) = lookup(STORE_NAME_VAR) {
            config.name = name;
        }

        if let Some(policy) = lookup(REENTRANCY_VAR) {
            config.reentrancy = policy.parse()?;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "store".to_string(),
            reentrancy: ReentrancyPolicy::Queue,
            max_queued_actions: 1024,
            notify_on_unchanged: false,
            catch_reducer_panics: true,
            dlq_max_size: 100,
        }
    }
}
