//! Channel dispatch: gate checks, repeat-timeout suppression, fan-out and
//! failure escalation.
//!
//! Every dispatch method follows the same steps for its channel kind:
//!
//! ```text
//! gate (eligible sinks? suppressed? already dispatched?) -> fan-out -> escalate failures
//! ```
//!
//! Nothing here returns an error to the caller. A failing sink is reported
//! as a new Error notice sent through `all()`; failures while sending that
//! notice are logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use crate::channel::{ChannelKind, DeliveryId};
use crate::error::SinkError;
use crate::registry::{InFlightGuard, Registry, sink_id};

use super::{ForceBackup, Notice};

/// Mail subjects longer than this many characters are truncated.
pub const MAIL_SUBJECT_MAX_LEN: usize = 256;

impl Notice {
    /// Dispatch through log, mail, syslog and SMS, in that order.
    pub fn all(&mut self) -> &mut Self {
        self.log_mail().syslog().sms()
    }

    /// Dispatch through log, then mail with the default subject and body.
    pub fn log_mail(&mut self) -> &mut Self {
        self.log().mail(None, None)
    }

    /// Send to every log sink. The first id a sink returns becomes the
    /// notice's delivery id.
    pub fn log(&mut self) -> &mut Self {
        let registry = Arc::clone(self.registry());
        if self.is_locked(ChannelKind::Log, &registry) {
            return self;
        }

        for sink in registry.log_sinks() {
            let Some(_guard) = InFlightGuard::enter(ChannelKind::Log, sink_id(sink)) else {
                continue;
            };
            match sink.log(self) {
                Ok(id) => {
                    record_delivery(ChannelKind::Log, sink.name());
                    if self.delivery_id.is_none() {
                        self.delivery_id = id;
                    }
                }
                Err(e) => self.escalate(ChannelKind::Log, sink.name(), e),
            }
        }

        self
    }

    /// Send to every mail sink.
    ///
    /// `message` defaults to the notice message and `subject` to
    /// [`Notice::subject`] cut to [`MAIL_SUBJECT_MAX_LEN`] characters. Empty
    /// strings count as absent.
    pub fn mail(&mut self, message: Option<&str>, subject: Option<&str>) -> &mut Self {
        let registry = Arc::clone(self.registry());
        if self.is_locked(ChannelKind::Mail, &registry) {
            return self;
        }

        let message = match message.filter(|m| !m.is_empty()) {
            Some(m) => m.to_string(),
            None => self.message.clone(),
        };
        let subject = match subject.filter(|s| !s.is_empty()) {
            Some(s) => s.to_string(),
            None => truncate_chars(self.subject(), MAIL_SUBJECT_MAX_LEN).to_string(),
        };

        for sink in registry.mail_sinks() {
            let Some(_guard) = InFlightGuard::enter(ChannelKind::Mail, sink_id(sink)) else {
                continue;
            };
            match sink.send_mail(self, &subject, &message) {
                Ok(()) => record_delivery(ChannelKind::Mail, sink.name()),
                Err(e) => self.escalate(ChannelKind::Mail, sink.name(), e),
            }
        }

        self
    }

    /// Send to every syslog sink.
    pub fn syslog(&mut self) -> &mut Self {
        let registry = Arc::clone(self.registry());
        if self.is_locked(ChannelKind::Syslog, &registry) {
            return self;
        }

        for sink in registry.syslog_sinks() {
            let Some(_guard) = InFlightGuard::enter(ChannelKind::Syslog, sink_id(sink)) else {
                continue;
            };
            match sink.syslog(self) {
                Ok(()) => record_delivery(ChannelKind::Syslog, sink.name()),
                Err(e) => self.escalate(ChannelKind::Syslog, sink.name(), e),
            }
        }

        self
    }

    /// Send to every SMS sink.
    pub fn sms(&mut self) -> &mut Self {
        let registry = Arc::clone(self.registry());
        if self.is_locked(ChannelKind::Sms, &registry) {
            return self;
        }

        for sink in registry.sms_sinks() {
            let Some(_guard) = InFlightGuard::enter(ChannelKind::Sms, sink_id(sink)) else {
                continue;
            };
            match sink.send_sms(self) {
                Ok(()) => record_delivery(ChannelKind::Sms, sink.name()),
                Err(e) => self.escalate(ChannelKind::Sms, sink.name(), e),
            }
        }

        self
    }

    // =========================================================================
    // Force bracket
    // =========================================================================

    /// Disable repeat-timeout suppression until [`Notice::unforce`].
    ///
    /// Kinds already dispatched by this instance stay dispatched.
    pub fn force(&mut self) -> &mut Self {
        self.dedup.backup = Some(ForceBackup {
            suppressed: self.dedup.suppressed,
            repeat_timeout: self.repeat_timeout,
        });
        self.set_repeat_timeout(Some(Duration::ZERO))
    }

    /// Restore the suppression state saved by [`Notice::force`].
    pub fn unforce(&mut self) -> &mut Self {
        if let Some(backup) = self.dedup.backup.take() {
            self.set_repeat_timeout(backup.repeat_timeout);
            self.dedup.suppressed = backup.suppressed;
        }
        self
    }

    /// Log the notice ignoring repeat timeouts if it has no delivery id yet,
    /// then return the id.
    pub fn forced_log_id(&mut self) -> Option<&DeliveryId> {
        if self.delivery_id.is_none() {
            self.force().log().unforce();
        }
        self.delivery_id.as_ref()
    }

    // =========================================================================
    // Gate
    // =========================================================================

    /// Whether dispatching `kind` must be skipped. Marks `kind` dispatched
    /// when it is not.
    fn is_locked(&mut self, kind: ChannelKind, registry: &Registry) -> bool {
        if !registry.has_eligible_sink(kind) {
            return true;
        }
        if self.is_suppressed(kind, registry) {
            return true;
        }
        if self.was_dispatched(kind) {
            return true;
        }
        self.dedup.called |= kind.bit();
        false
    }

    /// Memoized repeat-timeout decision for `kind`.
    fn is_suppressed(&mut self, kind: ChannelKind, registry: &Registry) -> bool {
        if let Some(decision) = self.dedup.suppressed[kind.index()] {
            return decision;
        }

        let timeout = self.repeat_timeout.or_else(|| registry.repeat_timeout(kind));
        let decision = match (timeout, registry.lock_store()) {
            (Some(timeout), Some(store)) if !timeout.is_zero() => {
                let key = format!("notice-{}-{}", kind, self.identity_hash());
                let suppressed = !store.try_acquire(&key, timeout);
                if suppressed {
                    tracing::debug!(
                        channel = %kind,
                        lock_key = %key,
                        timeout_secs = timeout.as_secs(),
                        "Notice suppressed by repeat timeout"
                    );
                    metrics::counter!("noticer_suppressed_total", "channel" => kind.as_str())
                        .increment(1);
                }
                suppressed
            }
            _ => false,
        };

        self.dedup.suppressed[kind.index()] = Some(decision);
        decision
    }

    // =========================================================================
    // Escalation
    // =========================================================================

    /// Report a sink failure as an Error notice through every channel.
    ///
    /// The new notice shares this notice's registry and runs the decorators
    /// of the factory that created this one. Failures of an escalation
    /// notice itself stop here.
    fn escalate(&self, kind: ChannelKind, sink: &str, err: SinkError) {
        metrics::counter!(
            "noticer_sink_failures_total",
            "channel" => kind.as_str(),
            "sink" => sink.to_string()
        )
        .increment(1);

        if self.escalated {
            tracing::error!(
                channel = %kind,
                sink = %sink,
                error = %err,
                "Sink failed while escalating a previous failure, dropping"
            );
            metrics::counter!("noticer_escalation_failures_total").increment(1);
            return;
        }

        tracing::warn!(
            channel = %kind,
            sink = %sink,
            error = %err,
            notice_code = self.code(),
            "Sink failed, escalating"
        );
        metrics::counter!("noticer_escalations_total").increment(1);

        let mut escalation =
            Notice::from_error(err, None, None).with_registry(Arc::clone(self.registry()));
        escalation.escalated = true;
        escalation.decorators = self.decorators.clone();
        self.decorators.apply(&mut escalation);
        escalation.all();
    }
}

fn record_delivery(kind: ChannelKind, sink: &str) {
    tracing::trace!(channel = %kind, sink = %sink, "Notice delivered");
    metrics::counter!("noticer_dispatched_total", "channel" => kind.as_str()).increment(1);
}

/// Cut `s` to at most `max` characters.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
