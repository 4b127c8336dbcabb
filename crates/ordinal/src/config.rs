//! Engine and storage configuration
//!
//! Built with the `with_*` builder methods, optionally seeded from the
//! environment:
//! - `ORDINAL_DB_PATH`: SQLite database file
//! - `ORDINAL_ALPHABET`: key alphabet (ASCII, strictly ascending)
//! - `ORDINAL_KEY_LENGTH_WARNING`: key length that triggers a warning
//! - `ORDINAL_BUSY_TIMEOUT_MS`: how long SQLite waits on a locked database

use std::path::PathBuf;
use std::time::Duration;

use ordinal_core::{Alphabet, KeyError, DEFAULT_KEY_LENGTH_WARNING};
use thiserror::Error;

use crate::storage::{TableLayout, DEFAULT_BUSY_TIMEOUT};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: {source}")]
    Alphabet {
        var: &'static str,
        #[source]
        source: KeyError,
    },

    #[error("{var}: expected a non-negative integer, got '{value}'")]
    NotANumber { var: &'static str, value: String },
}

/// Settings of the ordering engine itself
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub alphabet: Alphabet,
    /// Keys longer than this are logged at warn level
    pub key_length_warning: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alphabet: Alphabet::base62(),
            key_length_warning: DEFAULT_KEY_LENGTH_WARNING,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrdinalConfig {
    /// Database file path (None = temporary file with random name)
    pub db_path: Option<PathBuf>,
    pub layout: TableLayout,
    pub engine: EngineConfig,
    pub busy_timeout: Duration,
}

impl Default for OrdinalConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OrdinalConfig {
    pub fn new() -> Self {
        Self {
            db_path: None,
            layout: TableLayout::default(),
            engine: EngineConfig::default(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Defaults overridden by any `ORDINAL_*` variables that are set
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::new();

        if let Some(path) = lookup("ORDINAL_DB_PATH").filter(|p| !p.is_empty()) {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Some(symbols) = lookup("ORDINAL_ALPHABET") {
            config.engine.alphabet =
                Alphabet::new(&symbols).map_err(|source| ConfigError::Alphabet {
                    var: "ORDINAL_ALPHABET",
                    source,
                })?;
        }
        if let Some(value) = lookup("ORDINAL_KEY_LENGTH_WARNING") {
            config.engine.key_length_warning = parse_number("ORDINAL_KEY_LENGTH_WARNING", &value)?;
        }
        if let Some(value) = lookup("ORDINAL_BUSY_TIMEOUT_MS") {
            let ms = parse_number("ORDINAL_BUSY_TIMEOUT_MS", &value)?;
            config.busy_timeout = Duration::from_millis(ms as u64);
        }

        Ok(config)
    }

    pub fn with_db_path(mut self, path: PathBuf) -> Self {
        self.db_path = Some(path);
        self
    }

    pub fn with_layout(mut self, layout: TableLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_alphabet(mut self, alphabet: Alphabet) -> Self {
        self.engine.alphabet = alphabet;
        self
    }

    pub fn with_key_length_warning(mut self, length: usize) -> Self {
        self.engine.key_length_warning = length;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| {
            std::env::temp_dir().join(format!("ordinal-{}.db", uuid::Uuid::new_v4()))
        })
    }
}

fn parse_number(var: &'static str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::NotANumber {
        var,
        value: value.to_string(),
    })
}
