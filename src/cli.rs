//! Command-line interface for noticer using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;
use crate::severity::Severity;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format for log aggregation.
    Json,
}

/// Channels to dispatch the notice through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Channels {
    /// Log, mail, syslog and SMS, in that order.
    #[default]
    All,
    Log,
    Mail,
    Syslog,
    Sms,
}

/// Send a notice through the configured channels.
#[derive(Parser, Debug)]
#[command(name = "noticer")]
#[command(version)]
#[command(about = "Send a notice through the configured channels")]
pub struct Cli {
    /// Path to configuration file.
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Validate configuration and exit.
    #[arg(long = "validate")]
    pub validate: bool,

    /// Log format: text or json.
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, env = "LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Notice severity. Derived from the code when omitted.
    #[arg(short = 's', long = "severity", value_enum)]
    pub severity: Option<Severity>,

    /// Notice code.
    #[arg(long = "code", allow_negative_numbers = true)]
    pub code: Option<i64>,

    /// Channels to dispatch through.
    #[arg(long = "channels", value_enum, default_value_t = Channels::All)]
    pub channels: Channels,

    /// Notice message. Required unless --validate is given.
    #[arg(required_unless_present = "validate")]
    pub message: Option<String>,
}
