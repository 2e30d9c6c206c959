//! Core configuration types and loading.

use crate::channel::ChannelKind;
use crate::error::ConfigError;
use crate::lock::{DEFAULT_MAX_CAPACITY, MemoryLockStore};
use crate::registry::{Registry, RepeatTimeouts};
use crate::sinks::TracingSink;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/noticer/config.yaml";

/// Main configuration structure for noticer.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Default repeat timeout per channel kind.
    #[serde(default)]
    pub repeat_timeouts: RepeatTimeouts,
    /// In-memory dedup lock store settings.
    #[serde(default)]
    pub lock_store: LockStoreConfig,
    /// Built-in sinks to register.
    #[serde(default)]
    pub sinks: SinksConfig,
}

/// Dedup lock store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LockStoreConfig {
    /// Without a lock store, repeat timeouts have no effect.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum number of held locks.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for LockStoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_capacity: DEFAULT_MAX_CAPACITY,
        }
    }
}

/// Built-in sink selection.
#[derive(Debug, Clone, Deserialize)]
pub struct SinksConfig {
    /// Register a `TracingSink` on the log channel.
    #[serde(default = "default_true")]
    pub tracing_log: bool,
    /// Register a `TracingSink` on the syslog channel.
    #[serde(default)]
    pub tracing_syslog: bool,
}

impl Default for SinksConfig {
    fn default() -> Self {
        Self {
            tracing_log: true,
            tracing_syslog: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_capacity() -> u64 {
    DEFAULT_MAX_CAPACITY
}

impl Config {
    /// Load configuration from a file path.
    ///
    /// # Errors
    /// Returns [`ConfigError::LoadError`] if the file cannot be read.
    /// Returns [`ConfigError::ValidationError`] if the YAML is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    ///
    /// # Errors
    /// Returns [`ConfigError::ValidationError`] if the YAML is invalid.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Validate the whole configuration, collecting every error.
    ///
    /// # Errors
    /// Returns a `Vec<ConfigError>` containing all validation errors found.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.lock_store.enabled && self.lock_store.max_capacity == 0 {
            errors.push(ConfigError::ValidationError(
                "lock_store.max_capacity must be greater than 0".to_string(),
            ));
        }

        // A timeout can only be enforced through the lock store.
        if !self.lock_store.enabled {
            for kind in ChannelKind::ALL {
                if let Some(timeout) = self.repeat_timeouts.get(kind)
                    && !timeout.is_zero()
                {
                    errors.push(ConfigError::InvalidTimeout {
                        channel: kind.to_string(),
                        message: "lock_store is disabled, the timeout would never apply"
                            .to_string(),
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Build a registry holding the configured timeouts, lock store and
    /// built-in sinks. Application sinks are added by the caller.
    pub fn into_registry(self) -> Registry {
        let mut registry = Registry::new();
        registry.set_repeat_timeouts(self.repeat_timeouts);

        if self.lock_store.enabled {
            registry.set_lock_store(Some(Arc::new(MemoryLockStore::with_capacity(
                self.lock_store.max_capacity,
            ))));
        }

        if self.sinks.tracing_log || self.sinks.tracing_syslog {
            let sink = Arc::new(TracingSink::default());
            if self.sinks.tracing_log {
                registry.add_log_sink(sink.clone());
            }
            if self.sinks.tracing_syslog {
                registry.add_syslog_sink(sink);
            }
        }

        tracing::info!(
            lock_store = self.lock_store.enabled,
            log_sinks = registry.sink_count(ChannelKind::Log),
            syslog_sinks = registry.sink_count(ChannelKind::Syslog),
            "Registry built from config"
        );

        registry
    }
}
