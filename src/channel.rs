//! Channel kinds and sink contracts.
//!
//! A sink is one registered delivery implementation for a channel kind.
//! Sinks are synchronous: the engine calls them inline and any blocking I/O
//! is the sink's own concern.

use std::fmt;

use crate::error::SinkError;
use crate::notice::Notice;

/// Category of delivery sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Log,
    Mail,
    Syslog,
    Sms,
}

impl ChannelKind {
    /// All kinds, in `all()` dispatch order.
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::Log,
        ChannelKind::Mail,
        ChannelKind::Syslog,
        ChannelKind::Sms,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Log => "log",
            ChannelKind::Mail => "mail",
            ChannelKind::Syslog => "syslog",
            ChannelKind::Sms => "sms",
        }
    }

    /// Bit used in a notice's dispatched-kinds mask.
    pub(crate) fn bit(self) -> u8 {
        match self {
            ChannelKind::Log => 1,
            ChannelKind::Mail => 2,
            ChannelKind::Syslog => 4,
            ChannelKind::Sms => 8,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            ChannelKind::Log => 0,
            ChannelKind::Mail => 1,
            ChannelKind::Syslog => 2,
            ChannelKind::Sms => 3,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a stored log entry, as returned by a log sink.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeliveryId {
    Text(String),
    Number(i64),
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryId::Text(id) => f.write_str(id),
            DeliveryId::Number(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for DeliveryId {
    fn from(id: i64) -> Self {
        DeliveryId::Number(id)
    }
}

impl From<String> for DeliveryId {
    fn from(id: String) -> Self {
        DeliveryId::Text(id)
    }
}

impl From<&str> for DeliveryId {
    fn from(id: &str) -> Self {
        DeliveryId::Text(id.to_string())
    }
}

/// Writes notices to a log store.
///
/// # Example
///
/// ```
/// use noticer::channel::{DeliveryId, LogSink};
/// use noticer::error::SinkError;
/// use noticer::Notice;
///
/// struct StderrLog;
///
/// impl LogSink for StderrLog {
///     fn name(&self) -> &str { "stderr" }
///     fn log(&self, notice: &Notice) -> Result<Option<DeliveryId>, SinkError> {
///         eprintln!("{}", notice.subject());
///         Ok(None)
///     }
/// }
/// ```
pub trait LogSink: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Store the notice, returning the entry id when the store has one.
    fn log(&self, notice: &Notice) -> Result<Option<DeliveryId>, SinkError>;
}

/// Sends notices by mail.
pub trait MailSink: Send + Sync {
    fn name(&self) -> &str;

    fn send_mail(&self, notice: &Notice, subject: &str, message: &str) -> Result<(), SinkError>;
}

/// Emits notices to syslog.
pub trait SyslogSink: Send + Sync {
    fn name(&self) -> &str;

    fn syslog(&self, notice: &Notice) -> Result<(), SinkError>;
}

/// Sends notices by SMS.
pub trait SmsSink: Send + Sync {
    fn name(&self) -> &str;

    fn send_sms(&self, notice: &Notice) -> Result<(), SinkError>;
}

/// A sink serving every channel kind.
pub trait AllSink: LogSink + MailSink + SyslogSink + SmsSink {}

impl<T: LogSink + MailSink + SyslogSink + SmsSink> AllSink for T {}
