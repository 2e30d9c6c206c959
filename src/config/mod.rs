//! Configuration loading and validation for noticer.
//!
//! This module handles loading the YAML configuration file, validating it
//! and turning it into a [`Registry`](crate::registry::Registry).

mod types;

pub use types::{Config, DEFAULT_CONFIG_PATH, LockStoreConfig, SinksConfig};
