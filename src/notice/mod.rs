//! The notice value object and its dispatch engine.
//!
//! A [`Notice`] carries a message, a code and a severity, plus whatever a
//! caller attaches (cause error, payload). Dispatch methods route it to the
//! sinks of its [`Registry`], with per-channel repeat-timeout suppression.
//!
//! # Derived fields
//!
//! Code, severity, subject, cause error and identity hash are derived on
//! first read and memoized. Setters update the backing fields but never
//! invalidate a value that was already read: build the notice fully before
//! reading or dispatching it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use noticer::{Notice, Registry, Severity};
//!
//! let registry = Arc::new(Registry::new());
//! let mut notice = Notice::new("disk almost full")
//!     .with_status(Severity::Warning)
//!     .with_registry(registry);
//!
//! assert_eq!(notice.code(), 300);
//! assert_eq!(notice.subject(), "Warning [300]: disk almost full");
//! notice.all();
//! ```

mod dispatch;

use std::cell::OnceCell;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use md5::{Digest, Md5};
use regex::Regex;
use serde_json::{Map, Value};

use crate::channel::{ChannelKind, DeliveryId};
use crate::error::{BoxError, ErrorCode, NoticeError, error_code};
use crate::factory::Decorators;
use crate::registry::Registry;
use crate::severity::{CODE_INFO, Severity};

pub use dispatch::MAIL_SUBJECT_MAX_LEN;

/// Cause error shared between a notice and the sinks reading it.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid regex"));

/// Per-instance dedup state.
#[derive(Debug, Default)]
struct DedupState {
    /// Memoized "suppressed by repeat timeout" decision per channel kind.
    suppressed: [Option<bool>; 4],
    /// Bits of the channel kinds already dispatched by this instance.
    called: u8,
    /// Saved by `force()`, restored by `unforce()`.
    backup: Option<ForceBackup>,
}

#[derive(Debug)]
struct ForceBackup {
    suppressed: [Option<bool>; 4],
    repeat_timeout: Option<Duration>,
}

/// An event to deliver through the registered channels.
#[derive(Debug)]
pub struct Notice {
    message: String,
    code: Option<i64>,
    status: Option<Severity>,
    effective_code: OnceCell<i64>,
    effective_status: OnceCell<Severity>,
    error: OnceCell<SharedError>,
    payload: Map<String, Value>,
    subject: OnceCell<String>,
    subject_prefix: OnceCell<String>,
    delivery_id: Option<DeliveryId>,
    identity_hash: OnceCell<String>,
    repeat_timeout: Option<Duration>,
    dedup: DedupState,
    registry: OnceCell<Arc<Registry>>,
    /// Decorators of the creating factory, also run on escalation notices.
    pub(crate) decorators: Decorators,
    /// Set on notices raised for a sink failure: their own failures are
    /// discarded instead of escalated again.
    escalated: bool,
}

impl Notice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status: None,
            effective_code: OnceCell::new(),
            effective_status: OnceCell::new(),
            error: OnceCell::new(),
            payload: Map::new(),
            subject: OnceCell::new(),
            subject_prefix: OnceCell::new(),
            delivery_id: None,
            identity_hash: OnceCell::new(),
            repeat_timeout: None,
            dedup: DedupState::default(),
            registry: OnceCell::new(),
            decorators: Decorators::default(),
            escalated: false,
        }
    }

    /// Build a notice describing `err`.
    ///
    /// The message is the error's text (its type name when empty). Without an
    /// explicit `code`, a numeric code carried by the error is used; a
    /// symbolic one is folded into the message as `[notintcode:<code>]`.
    /// Severity defaults to [`Severity::Error`].
    pub fn from_error<E>(err: E, status: Option<Severity>, code: Option<i64>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::from_shared_error(Arc::new(err), std::any::type_name::<E>(), status, code)
    }

    /// [`Notice::from_error`] for an already boxed error.
    pub fn from_boxed_error(err: BoxError, status: Option<Severity>, code: Option<i64>) -> Self {
        Self::from_shared_error(Arc::from(err), "error", status, code)
    }

    fn from_shared_error(
        err: SharedError,
        type_name: &str,
        status: Option<Severity>,
        code: Option<i64>,
    ) -> Self {
        let mut message = err.to_string();
        if message.is_empty() {
            message = type_name.to_string();
        }

        let code = match code.filter(|c| *c != 0) {
            Some(code) => Some(code),
            None => match error_code(&*err) {
                Some(ErrorCode::Numeric(c)) if *c != 0 => Some(*c),
                Some(ErrorCode::Symbolic(s)) if !s.is_empty() => {
                    message = format!("[notintcode:{}] {}", s, message);
                    None
                }
                _ => None,
            },
        };

        let mut notice = Notice::new(message).with_status(status.unwrap_or(Severity::Error));
        notice.code = code;
        notice.set_error(err);
        notice
    }

    // =========================================================================
    // Builders
    // =========================================================================

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_status(mut self, status: Severity) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_error(mut self, err: SharedError) -> Self {
        self.set_error(err);
        self
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_repeat_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.set_repeat_timeout(timeout);
        self
    }

    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.set_registry(registry);
        self
    }

    // =========================================================================
    // Message, code, severity
    // =========================================================================

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_message(&mut self, message: impl Into<String>) -> &mut Self {
        self.message = message.into();
        self
    }

    /// Effective code: the explicit code, else the default code of the
    /// explicit severity, else the informational default.
    pub fn code(&self) -> i64 {
        *self.effective_code.get_or_init(|| match self.code {
            Some(code) if code != 0 => code,
            _ => self.status.map_or(CODE_INFO, Severity::default_code),
        })
    }

    pub fn has_code(&self) -> bool {
        matches!(self.code, Some(code) if code != 0)
    }

    pub fn set_code(&mut self, code: Option<i64>) -> &mut Self {
        self.code = code;
        self
    }

    /// Effective severity: the explicit one, else derived from the code.
    pub fn status(&self) -> Severity {
        *self
            .effective_status
            .get_or_init(|| self.status.unwrap_or_else(|| Severity::from_code(self.code())))
    }

    pub fn has_status(&self) -> bool {
        self.status.is_some()
    }

    pub fn set_status(&mut self, status: Option<Severity>) -> &mut Self {
        self.status = status;
        self
    }

    pub fn as_info(&mut self) -> &mut Self {
        self.set_status(Some(Severity::Info))
    }

    pub fn as_warning(&mut self) -> &mut Self {
        self.set_status(Some(Severity::Warning))
    }

    pub fn as_error(&mut self) -> &mut Self {
        self.set_status(Some(Severity::Error))
    }

    pub fn is_info(&self) -> bool {
        self.status() == Severity::Info
    }

    pub fn is_warning(&self) -> bool {
        self.status() == Severity::Warning
    }

    pub fn is_error(&self) -> bool {
        self.status() == Severity::Error
    }

    pub fn is_warn_or_err(&self) -> bool {
        self.status() >= Severity::Warning
    }

    // =========================================================================
    // Cause error and payload
    // =========================================================================

    /// The cause error. When none was attached, one is synthesized from the
    /// message and code.
    pub fn error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &**self.error.get_or_init(|| {
            let synthesized: SharedError = Arc::new(
                NoticeError::new(self.message.clone()).with_code(ErrorCode::Numeric(self.code())),
            );
            synthesized
        })
    }

    pub fn has_error(&self) -> bool {
        self.error.get().is_some()
    }

    pub fn set_error(&mut self, err: SharedError) -> &mut Self {
        self.error = OnceCell::from(err);
        self
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn set_payload(&mut self, payload: Map<String, Value>) -> &mut Self {
        self.payload = payload;
        self
    }

    /// Overlay `payload` onto the current one; existing keys are replaced.
    pub fn merge_payload(&mut self, payload: Map<String, Value>) -> &mut Self {
        self.payload.extend(payload);
        self
    }

    // =========================================================================
    // Display strings
    // =========================================================================

    /// `"<Severity title> [<code>]"`, e.g. `"Error [500]"`.
    pub fn subject_prefix(&self) -> &str {
        self.subject_prefix
            .get_or_init(|| format!("{} [{}]", capitalize(self.status().title()), self.code()))
    }

    /// Prefix followed by the message with markup tags stripped.
    pub fn subject(&self) -> &str {
        self.subject.get_or_init(|| {
            format!(
                "{}: {}",
                self.subject_prefix(),
                MARKUP_TAG.replace_all(&self.message, "")
            )
        })
    }

    // =========================================================================
    // Identity and dedup settings
    // =========================================================================

    /// Deduplication key: MD5 over code, severity level and the message of
    /// the cause error and each of its sources.
    pub fn identity_hash(&self) -> &str {
        self.identity_hash.get_or_init(|| {
            let mut material = format!("{}|{}", self.code(), self.status().level());
            let cause: &(dyn std::error::Error + 'static) = self.error();
            let mut current = Some(cause);
            while let Some(err) = current {
                material.push('|');
                material.push_str(&err.to_string());
                current = err.source();
            }
            hex::encode(Md5::digest(material.as_bytes()))
        })
    }

    /// Replace the deduplication key.
    pub fn set_identity_hash(&mut self, hash: impl Into<String>) -> &mut Self {
        self.identity_hash = OnceCell::from(hash.into());
        self
    }

    /// Per-instance repeat timeout; `None` uses the registry's per-channel
    /// defaults.
    pub fn repeat_timeout(&self) -> Option<Duration> {
        self.repeat_timeout
    }

    /// Override the repeat timeout. Forgets every memoized suppression
    /// decision.
    pub fn set_repeat_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.repeat_timeout = timeout;
        self.dedup.suppressed = [None; 4];
        self
    }

    /// Id returned by the first log sink that produced one.
    pub fn delivery_id(&self) -> Option<&DeliveryId> {
        self.delivery_id.as_ref()
    }

    /// Whether `kind` was already dispatched by this instance.
    pub fn was_dispatched(&self, kind: ChannelKind) -> bool {
        self.dedup.called & kind.bit() != 0
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// The attached registry, or the default factory's one.
    pub fn registry(&self) -> &Arc<Registry> {
        self.registry
            .get_or_init(|| Arc::clone(crate::factory::default_factory().registry()))
    }

    pub fn set_registry(&mut self, registry: Arc<Registry>) -> &mut Self {
        self.registry = OnceCell::from(registry);
        self
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
