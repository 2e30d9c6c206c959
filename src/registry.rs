//! Channel registry: ordered sinks per channel kind, repeat timeouts and the
//! shared lock store.
//!
//! Also home of the in-flight guard that keeps a sink from being re-entered
//! when its own delivery triggers another dispatch of the same kind.

use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::channel::{AllSink, ChannelKind, LogSink, MailSink, SmsSink, SyslogSink};
use crate::lock::LockStore;

/// Default repeat timeout per channel kind. `None` or zero disables
/// suppression for that kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct RepeatTimeouts {
    #[serde(default, with = "humantime_serde")]
    pub log: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub mail: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub syslog: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub sms: Option<Duration>,
}

impl RepeatTimeouts {
    pub fn get(&self, kind: ChannelKind) -> Option<Duration> {
        match kind {
            ChannelKind::Log => self.log,
            ChannelKind::Mail => self.mail,
            ChannelKind::Syslog => self.syslog,
            ChannelKind::Sms => self.sms,
        }
    }

    pub fn set(&mut self, kind: ChannelKind, timeout: Option<Duration>) {
        let slot = match kind {
            ChannelKind::Log => &mut self.log,
            ChannelKind::Mail => &mut self.mail,
            ChannelKind::Syslog => &mut self.syslog,
            ChannelKind::Sms => &mut self.sms,
        };
        *slot = timeout;
    }
}

/// Registry of sinks shared by every notice attached to it.
///
/// Sinks run in registration order. Cloning yields an independent registry
/// that still shares the sink objects and the lock store.
#[derive(Clone, Default)]
pub struct Registry {
    log_sinks: Vec<Arc<dyn LogSink>>,
    mail_sinks: Vec<Arc<dyn MailSink>>,
    syslog_sinks: Vec<Arc<dyn SyslogSink>>,
    sms_sinks: Vec<Arc<dyn SmsSink>>,
    timeouts: RepeatTimeouts,
    lock_store: Option<Arc<dyn LockStore>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_log_sink(&mut self, sink: Arc<dyn LogSink>) -> &mut Self {
        tracing::debug!(sink = %sink.name(), channel = "log", "Registered sink");
        self.log_sinks.push(sink);
        self
    }

    pub fn add_mail_sink(&mut self, sink: Arc<dyn MailSink>) -> &mut Self {
        tracing::debug!(sink = %sink.name(), channel = "mail", "Registered sink");
        self.mail_sinks.push(sink);
        self
    }

    pub fn add_syslog_sink(&mut self, sink: Arc<dyn SyslogSink>) -> &mut Self {
        tracing::debug!(sink = %sink.name(), channel = "syslog", "Registered sink");
        self.syslog_sinks.push(sink);
        self
    }

    pub fn add_sms_sink(&mut self, sink: Arc<dyn SmsSink>) -> &mut Self {
        tracing::debug!(sink = %sink.name(), channel = "sms", "Registered sink");
        self.sms_sinks.push(sink);
        self
    }

    /// Register one object as a sink for every channel kind.
    pub fn add_all_sink<S: AllSink + 'static>(&mut self, sink: Arc<S>) -> &mut Self {
        self.add_log_sink(sink.clone())
            .add_mail_sink(sink.clone())
            .add_sms_sink(sink.clone())
            .add_syslog_sink(sink)
    }

    pub fn log_sinks(&self) -> &[Arc<dyn LogSink>] {
        &self.log_sinks
    }

    pub fn mail_sinks(&self) -> &[Arc<dyn MailSink>] {
        &self.mail_sinks
    }

    pub fn syslog_sinks(&self) -> &[Arc<dyn SyslogSink>] {
        &self.syslog_sinks
    }

    pub fn sms_sinks(&self) -> &[Arc<dyn SmsSink>] {
        &self.sms_sinks
    }

    /// Number of sinks registered for `kind`.
    pub fn sink_count(&self, kind: ChannelKind) -> usize {
        match kind {
            ChannelKind::Log => self.log_sinks.len(),
            ChannelKind::Mail => self.mail_sinks.len(),
            ChannelKind::Syslog => self.syslog_sinks.len(),
            ChannelKind::Sms => self.sms_sinks.len(),
        }
    }

    /// True when no sink is registered for any kind.
    pub fn is_empty(&self) -> bool {
        ChannelKind::ALL.iter().all(|k| self.sink_count(*k) == 0)
    }

    /// Whether at least one sink for `kind` is not already delivering on
    /// this thread.
    pub(crate) fn has_eligible_sink(&self, kind: ChannelKind) -> bool {
        let eligible = |id: usize| !is_in_flight(kind, id);
        match kind {
            ChannelKind::Log => self.log_sinks.iter().map(sink_id).any(eligible),
            ChannelKind::Mail => self.mail_sinks.iter().map(sink_id).any(eligible),
            ChannelKind::Syslog => self.syslog_sinks.iter().map(sink_id).any(eligible),
            ChannelKind::Sms => self.sms_sinks.iter().map(sink_id).any(eligible),
        }
    }

    pub fn repeat_timeout(&self, kind: ChannelKind) -> Option<Duration> {
        self.timeouts.get(kind)
    }

    pub fn set_repeat_timeout(&mut self, kind: ChannelKind, timeout: Option<Duration>) -> &mut Self {
        self.timeouts.set(kind, timeout);
        self
    }

    pub fn repeat_timeouts(&self) -> &RepeatTimeouts {
        &self.timeouts
    }

    pub fn set_repeat_timeouts(&mut self, timeouts: RepeatTimeouts) -> &mut Self {
        self.timeouts = timeouts;
        self
    }

    pub fn lock_store(&self) -> Option<&Arc<dyn LockStore>> {
        self.lock_store.as_ref()
    }

    pub fn set_lock_store(&mut self, store: Option<Arc<dyn LockStore>>) -> &mut Self {
        self.lock_store = store;
        self
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("log_sinks", &self.log_sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("mail_sinks", &self.mail_sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field(
                "syslog_sinks",
                &self.syslog_sinks.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("sms_sinks", &self.sms_sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("timeouts", &self.timeouts)
            .field("lock_store", &self.lock_store.is_some())
            .finish()
    }
}

// =============================================================================
// In-flight guard
// =============================================================================

thread_local! {
    static IN_FLIGHT: RefCell<HashSet<(ChannelKind, usize)>> = RefCell::new(HashSet::new());
}

/// Identity of a registered sink: the address of its shared allocation.
pub(crate) fn sink_id<T: ?Sized>(sink: &Arc<T>) -> usize {
    Arc::as_ptr(sink) as *const () as usize
}

pub(crate) fn is_in_flight(kind: ChannelKind, id: usize) -> bool {
    IN_FLIGHT.with(|set| set.borrow().contains(&(kind, id)))
}

/// Marks a sink as delivering on the current thread until dropped.
///
/// Dropping on unwind releases the mark too, so a panicking sink is not
/// locked out for the rest of the thread's life.
#[must_use]
pub(crate) struct InFlightGuard {
    key: (ChannelKind, usize),
}

impl InFlightGuard {
    /// Returns `None` when the sink is already in flight.
    pub(crate) fn enter(kind: ChannelKind, id: usize) -> Option<Self> {
        let inserted = IN_FLIGHT.with(|set| set.borrow_mut().insert((kind, id)));
        inserted.then_some(Self { key: (kind, id) })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        IN_FLIGHT.with(|set| {
            set.borrow_mut().remove(&self.key);
        });
    }
}
