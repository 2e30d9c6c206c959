//! Noticer - send one notice through the configured channels.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use noticer::cli::{Channels, Cli, LogFormat};
use noticer::config::Config;
use noticer::{ChannelKind, Factory, set_default_factory};

/// Initialize the tracing subscriber with the specified log format.
fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    match format {
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .with_env_filter(filter)
                .init();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_format);

    info!(config_path = %cli.config.display(), "Loading configuration");

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, path = %cli.config.display(), "Failed to load configuration");
            std::process::exit(1);
        }
    };

    info!("Validating configuration");
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!(error = %e, "Configuration validation error");
        }
        error!(error_count = errors.len(), "Configuration validation failed");
        std::process::exit(1);
    }

    if cli.validate {
        println!("Configuration is valid: {}", cli.config.display());
        for kind in ChannelKind::ALL {
            match config.repeat_timeouts.get(kind) {
                Some(timeout) => println!("  Repeat timeout {}: {:?}", kind, timeout),
                None => println!("  Repeat timeout {}: none", kind),
            }
        }
        println!(
            "  Lock store: {}",
            if config.lock_store.enabled {
                format!("enabled (capacity {})", config.lock_store.max_capacity)
            } else {
                "disabled".to_string()
            }
        );
        println!(
            "  Sinks: tracing_log={} tracing_syslog={}",
            config.sinks.tracing_log, config.sinks.tracing_syslog
        );
        return Ok(());
    }

    let message = cli
        .message
        .ok_or_else(|| anyhow::anyhow!("a notice message is required"))?;

    let registry = Arc::new(config.into_registry());
    let factory = Arc::new(Factory::new(registry));
    set_default_factory(Arc::clone(&factory));

    let mut notice = factory.create(message, cli.code, cli.severity);
    match cli.channels {
        Channels::All => notice.all(),
        Channels::Log => notice.log(),
        Channels::Mail => notice.mail(None, None),
        Channels::Syslog => notice.syslog(),
        Channels::Sms => notice.sms(),
    };

    let dispatched: Vec<&str> = ChannelKind::ALL
        .into_iter()
        .filter(|kind| notice.was_dispatched(*kind))
        .map(ChannelKind::as_str)
        .collect();
    info!(
        code = notice.code(),
        status = %notice.status(),
        hash = %notice.identity_hash(),
        channels = ?dispatched,
        delivery_id = ?notice.delivery_id().map(ToString::to_string),
        "Notice dispatched"
    );

    Ok(())
}
