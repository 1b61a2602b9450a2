//! Configuration for the terminal driver

use serde::{Deserialize, Serialize};

/// Driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of terminal slots
    pub max_terminals: usize,
    /// Echo ring size per terminal (one slot is kept for the bell)
    pub echo_capacity: usize,
    /// Input ring size per terminal, also the largest allowed read
    pub input_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_terminals: 4,
            echo_capacity: 1024,
            input_capacity: 4096,
        }
    }
}

impl Config {
    /// Smallest echo ring that can hold a character plus the reserved bell
    pub const MIN_ECHO_CAPACITY: usize = 2;

    /// Check that every capacity is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_terminals == 0 {
            return Err(ConfigError::Invalid(
                "max_terminals must be at least 1".to_string(),
            ));
        }
        if self.echo_capacity < Self::MIN_ECHO_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "echo_capacity must be at least {}",
                Self::MIN_ECHO_CAPACITY
            )));
        }
        if self.input_capacity == 0 {
            return Err(ConfigError::Invalid(
                "input_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a file
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from default location or return default config
    pub fn load_or_default() -> Self {
        // Try to load from ~/.config/tty-monitor/config.json
        match dirs_config_path() {
            Some(config_dir) => Self::load_in_dir_or_default(&config_dir),
            None => Self::default(),
        }
    }

    /// Load `config.json` from `config_dir`, falling back to defaults
    fn load_in_dir_or_default(config_dir: &std::path::Path) -> Self {
        let config_path = config_dir.join("config.json");
        if config_path.exists() {
            match Self::load(&config_path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Ignoring {}: {}", config_path.display(), e),
            }
        }
        Self::default()
    }
}

/// Get the configuration directory path
fn dirs_config_path() -> Option<std::path::PathBuf> {
    std::env::var("HOME").ok().map(|home| {
        std::path::PathBuf::from(home)
            .join(".config")
            .join("tty-monitor")
    })
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
