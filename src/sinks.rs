//! Built-in sinks writing notices to `tracing`.
//!
//! Useful standalone (the binary registers them from config) and as the
//! log/syslog channel of applications already shipping their `tracing`
//! output somewhere.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::channel::{DeliveryId, LogSink, SyslogSink};
use crate::error::SinkError;
use crate::notice::Notice;
use crate::severity::Severity;

/// Emits notices as `tracing` events.
///
/// As a log sink it hands out sequential numeric delivery ids, starting at 1.
#[derive(Debug)]
pub struct TracingSink {
    name: String,
    next_id: AtomicI64,
}

impl TracingSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for TracingSink {
    fn default() -> Self {
        Self::new("tracing")
    }
}

impl LogSink for TracingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn log(&self, notice: &Notice) -> Result<Option<DeliveryId>, SinkError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::Value::Object(notice.payload().clone());
        match notice.status() {
            Severity::Error => tracing::error!(
                delivery_id = id,
                code = notice.code(),
                hash = %notice.identity_hash(),
                payload = %payload,
                "{}", notice.message()
            ),
            Severity::Warning => tracing::warn!(
                delivery_id = id,
                code = notice.code(),
                hash = %notice.identity_hash(),
                payload = %payload,
                "{}", notice.message()
            ),
            Severity::Info => tracing::info!(
                delivery_id = id,
                code = notice.code(),
                hash = %notice.identity_hash(),
                payload = %payload,
                "{}", notice.message()
            ),
        }
        Ok(Some(DeliveryId::Number(id)))
    }
}

impl SyslogSink for TracingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn syslog(&self, notice: &Notice) -> Result<(), SinkError> {
        match notice.status() {
            Severity::Error => tracing::error!(target: "noticer::syslog", "{}", notice.subject()),
            Severity::Warning => tracing::warn!(target: "noticer::syslog", "{}", notice.subject()),
            Severity::Info => tracing::info!(target: "noticer::syslog", "{}", notice.subject()),
        }
        Ok(())
    }
}
