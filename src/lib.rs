//! Noticer - notice dispatching with per-channel repeat-timeout deduplication.

pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod factory;
pub mod lock;
pub mod metrics;
pub mod notice;
pub mod registry;
pub mod severity;
pub mod sinks;

// Re-export commonly used types
pub use channel::{
    AllSink, ChannelKind, DeliveryId, LogSink, MailSink, SmsSink, SyslogSink,
};
pub use cli::LogFormat;
pub use error::{BoxError, ConfigError, ErrorCode, NoticeError, SinkError};
pub use factory::{
    Decorator, Factory, default_factory, reset_default_factory, set_default_factory,
};
pub use lock::{LockStore, MemoryLockStore};
pub use metrics::{initialize_metrics, register_metric_descriptions};
pub use notice::{MAIL_SUBJECT_MAX_LEN, Notice, SharedError};
pub use registry::{Registry, RepeatTimeouts};
pub use severity::Severity;
pub use sinks::TracingSink;
