//! Notice factory and the process-wide default instance.
//!
//! A [`Factory`] binds new notices to its registry and runs its decorators
//! on them. The default factory is created lazily on first use; tests and
//! applications replace it with [`set_default_factory`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::BoxError;
use crate::notice::Notice;
use crate::registry::Registry;
use crate::severity::Severity;

/// Repeat timeout of deprecation warnings.
const DEPRECATION_REPEAT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Hook run on every notice a factory creates, before the caller gets it.
pub trait Decorator: Send + Sync {
    fn decorate(&self, notice: &mut Notice);
}

impl<F> Decorator for F
where
    F: Fn(&mut Notice) + Send + Sync,
{
    fn decorate(&self, notice: &mut Notice) {
        self(notice)
    }
}

/// Decorators of a factory. Notices keep a copy so that the notices raised
/// for their sink failures are decorated the same way.
#[derive(Clone, Default)]
pub(crate) struct Decorators(Vec<Arc<dyn Decorator>>);

impl Decorators {
    fn push(&mut self, decorator: Arc<dyn Decorator>) {
        self.0.push(decorator);
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    /// Run every decorator on `notice`, in registration order.
    pub(crate) fn apply(&self, notice: &mut Notice) {
        for decorator in &self.0 {
            decorator.decorate(notice);
        }
    }
}

impl std::fmt::Debug for Decorators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Decorators").field(&self.len()).finish()
    }
}

/// Builds notices bound to a registry.
#[derive(Clone, Default)]
pub struct Factory {
    registry: Arc<Registry>,
    decorators: Decorators,
}

impl Factory {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            decorators: Decorators::default(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn set_registry(&mut self, registry: Arc<Registry>) -> &mut Self {
        self.registry = registry;
        self
    }

    /// New factory over a copy of this factory's registry, without decorators.
    pub fn with_cloned_registry(&self) -> Self {
        Self::new(Arc::new(Registry::clone(&self.registry)))
    }

    pub fn add_decorator(&mut self, decorator: Arc<dyn Decorator>) -> &mut Self {
        self.decorators.push(decorator);
        self
    }

    pub fn create(
        &self,
        message: impl Into<String>,
        code: Option<i64>,
        status: Option<Severity>,
    ) -> Notice {
        let mut notice = Notice::new(message);
        notice.set_code(code).set_status(status);
        self.finish(notice)
    }

    pub fn info(&self, message: impl Into<String>, code: Option<i64>) -> Notice {
        self.create(message, code, Some(Severity::Info))
    }

    pub fn warning(&self, message: impl Into<String>, code: Option<i64>) -> Notice {
        self.create(message, code, Some(Severity::Warning))
    }

    pub fn error(&self, message: impl Into<String>, code: Option<i64>) -> Notice {
        self.create(message, code, Some(Severity::Error))
    }

    /// See [`Notice::from_error`].
    pub fn from_error<E>(&self, err: E, status: Option<Severity>, code: Option<i64>) -> Notice
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.finish(Notice::from_error(err, status, code))
    }

    pub fn from_boxed_error(
        &self,
        err: BoxError,
        status: Option<Severity>,
        code: Option<i64>,
    ) -> Notice {
        self.finish(Notice::from_boxed_error(err, status, code))
    }

    /// Mail a warning about deprecated usage, at most once an hour per
    /// distinct message.
    pub fn deprecation(&self, what: &str, instead: &str) {
        self.warning(
            format!("!!! Deprecated usage of <b>{}</b>. Use <b>{}</b> instead.", what, instead),
            None,
        )
        .with_repeat_timeout(Some(DEPRECATION_REPEAT_TIMEOUT))
        .mail(None, None);
    }

    fn finish(&self, notice: Notice) -> Notice {
        let mut notice = notice.with_registry(Arc::clone(&self.registry));
        notice.decorators = self.decorators.clone();
        self.decorators.apply(&mut notice);
        notice
    }
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("registry", &self.registry)
            .field("decorators", &self.decorators.len())
            .finish()
    }
}

// =============================================================================
// Process-wide default
// =============================================================================

static DEFAULT_FACTORY: RwLock<Option<Arc<Factory>>> = parking_lot::const_rwlock(None);

/// The default factory, created with an empty registry on first use.
pub fn default_factory() -> Arc<Factory> {
    if let Some(factory) = DEFAULT_FACTORY.read().as_ref() {
        return Arc::clone(factory);
    }
    let mut slot = DEFAULT_FACTORY.write();
    Arc::clone(slot.get_or_insert_with(|| {
        tracing::debug!("Initializing default notice factory");
        Arc::new(Factory::default())
    }))
}

/// Install `factory` as the default, returning the previous one.
///
/// Notices that already resolved their registry keep it.
pub fn set_default_factory(factory: Arc<Factory>) -> Option<Arc<Factory>> {
    DEFAULT_FACTORY.write().replace(factory)
}

/// Forget the default factory; the next use creates a fresh one.
pub fn reset_default_factory() -> Option<Arc<Factory>> {
    DEFAULT_FACTORY.write().take()
}

/// New factory over a copy of the default factory's registry.
pub fn create_factory() -> Factory {
    default_factory().with_cloned_registry()
}

pub fn create(message: impl Into<String>, code: Option<i64>, status: Option<Severity>) -> Notice {
    default_factory().create(message, code, status)
}

pub fn info(message: impl Into<String>, code: Option<i64>) -> Notice {
    default_factory().info(message, code)
}

pub fn warning(message: impl Into<String>, code: Option<i64>) -> Notice {
    default_factory().warning(message, code)
}

pub fn error(message: impl Into<String>, code: Option<i64>) -> Notice {
    default_factory().error(message, code)
}

pub fn from_error<E>(err: E, status: Option<Severity>, code: Option<i64>) -> Notice
where
    E: std::error::Error + Send + Sync + 'static,
{
    default_factory().from_error(err, status, code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelKind, DeliveryId, LogSink, MailSink};
    use crate::error::{ErrorCode, NoticeError, SinkError};
    use crate::lock::MemoryLockStore;
    use serial_test::serial;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMail {
        subjects: Mutex<Vec<String>>,
    }

    impl MailSink for RecordingMail {
        fn name(&self) -> &str {
            "recording"
        }

        fn send_mail(&self, _: &Notice, subject: &str, _: &str) -> Result<(), SinkError> {
            self.subjects.lock().unwrap().push(subject.to_string());
            Ok(())
        }
    }

    /// Log sink failing on its first call only.
    #[derive(Default)]
    struct FlakyLog {
        calls: Mutex<usize>,
    }

    impl LogSink for FlakyLog {
        fn name(&self) -> &str {
            "flaky"
        }

        fn log(&self, _: &Notice) -> Result<Option<DeliveryId>, SinkError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                return Err(SinkError::Unavailable("log store down".to_string()));
            }
            Ok(None)
        }
    }

    /// Log sink keeping the message and payload of every notice.
    #[derive(Default)]
    struct PayloadLog {
        entries: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl LogSink for PayloadLog {
        fn name(&self) -> &str {
            "payload"
        }

        fn log(&self, notice: &Notice) -> Result<Option<DeliveryId>, SinkError> {
            self.entries.lock().unwrap().push((
                notice.message().to_string(),
                serde_json::Value::Object(notice.payload().clone()),
            ));
            Ok(None)
        }
    }

    #[test]
    fn create_binds_registry() {
        let factory = Factory::new(Arc::new(Registry::new()));
        let notice = factory.create("hello", Some(404), None);

        assert!(Arc::ptr_eq(notice.registry(), factory.registry()));
        assert_eq!(notice.code(), 404);
        assert_eq!(notice.status(), Severity::Warning);
    }

    #[test]
    fn severity_shortcuts() {
        let factory = Factory::default();
        assert_eq!(factory.info("i", None).code(), 700);
        assert_eq!(factory.warning("w", None).code(), 300);
        assert_eq!(factory.error("e", None).code(), 1);
        assert_eq!(factory.error("e", Some(42)).code(), 42);
        assert!(factory.error("e", Some(900)).is_error());
    }

    #[test]
    fn decorators_run_in_registration_order() {
        let mut factory = Factory::default();
        factory
            .add_decorator(Arc::new(|n: &mut Notice| {
                n.merge_payload(serde_json::json!({"host": "web-1", "step": 1}).as_object().unwrap().clone());
            }))
            .add_decorator(Arc::new(|n: &mut Notice| {
                n.merge_payload(serde_json::json!({"step": 2}).as_object().unwrap().clone());
            }));

        let notice = factory.info("decorated", None);
        assert_eq!(notice.payload()["host"], "web-1");
        assert_eq!(notice.payload()["step"], 2);
    }

    #[test]
    fn from_error_runs_decorators() {
        let mut factory = Factory::default();
        factory.add_decorator(Arc::new(|n: &mut Notice| {
            n.merge_payload(serde_json::json!({"decorated": true}).as_object().unwrap().clone());
        }));

        let notice = factory.from_error(NoticeError::new("boom"), None, None);
        assert_eq!(notice.payload()["decorated"], true);
        assert!(notice.is_error());
        assert!(Arc::ptr_eq(notice.registry(), factory.registry()));
    }

    #[test]
    fn escalation_notices_are_decorated() {
        let flaky = Arc::new(FlakyLog::default());
        let recorded = Arc::new(PayloadLog::default());
        let mut registry = Registry::new();
        registry.add_log_sink(flaky.clone()).add_log_sink(recorded.clone());

        let mut factory = Factory::new(Arc::new(registry));
        factory.add_decorator(Arc::new(|n: &mut Notice| {
            n.merge_payload(serde_json::json!({"host": "web-1"}).as_object().unwrap().clone());
        }));

        factory.warning("replica lagging", None).log();

        let entries = recorded.entries.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "sink unavailable: log store down");
        assert_eq!(entries[0].1["host"], "web-1");
        assert_eq!(entries[1].0, "replica lagging");
        assert_eq!(entries[1].1["host"], "web-1");
    }

    #[test]
    fn undecorated_notice_escalates_undecorated() {
        let flaky = Arc::new(FlakyLog::default());
        let recorded = Arc::new(PayloadLog::default());
        let mut registry = Registry::new();
        registry.add_log_sink(flaky.clone()).add_log_sink(recorded.clone());

        Notice::new("loose").with_registry(Arc::new(registry)).log();

        let entries = recorded.entries.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].1.as_object().unwrap().is_empty());
    }

    #[test]
    fn from_error_symbolic_code_goes_to_message() {
        let factory = Factory::default();
        let err = NoticeError::new("constraint violated")
            .with_code(ErrorCode::Symbolic("23000".to_string()));

        let notice = factory.from_error(err, None, None);
        assert_eq!(notice.message(), "[notintcode:23000] constraint violated");
        assert!(!notice.has_code());
        assert_eq!(notice.code(), 1);
    }

    #[test]
    fn with_cloned_registry_is_independent() {
        let mut registry = Registry::new();
        registry.set_repeat_timeout(ChannelKind::Mail, Some(Duration::from_secs(60)));
        let mut factory = Factory::new(Arc::new(registry));
        factory.add_decorator(Arc::new(|_: &mut Notice| {}));

        let cloned = factory.with_cloned_registry();
        assert!(!Arc::ptr_eq(cloned.registry(), factory.registry()));
        assert_eq!(
            cloned.registry().repeat_timeout(ChannelKind::Mail),
            Some(Duration::from_secs(60))
        );
        assert!(format!("{:?}", cloned).contains("decorators: 0"));
    }

    #[test]
    fn deprecation_mails_once_per_window() {
        let mail = Arc::new(RecordingMail::default());
        let mut registry = Registry::new();
        registry
            .add_mail_sink(mail.clone())
            .set_lock_store(Some(Arc::new(MemoryLockStore::new())));
        let factory = Factory::new(Arc::new(registry));

        factory.deprecation("old_api()", "new_api()");
        factory.deprecation("old_api()", "new_api()");

        let subjects = mail.subjects.lock().unwrap();
        assert_eq!(subjects.len(), 1);
        assert_eq!(
            subjects[0],
            "Warning [300]: !!! Deprecated usage of old_api(). Use new_api() instead."
        );
    }

    #[test]
    #[serial]
    fn default_factory_is_memoized() {
        reset_default_factory();
        let first = default_factory();
        let second = default_factory();
        assert!(Arc::ptr_eq(&first, &second));
        reset_default_factory();
    }

    #[test]
    #[serial]
    fn set_default_factory_overrides_and_resets() {
        let custom = Arc::new(Factory::new(Arc::new(Registry::new())));
        set_default_factory(Arc::clone(&custom));

        let notice = warning("via default", None);
        assert!(Arc::ptr_eq(notice.registry(), custom.registry()));

        let previous = reset_default_factory().unwrap();
        assert!(Arc::ptr_eq(&previous, &custom));
        assert!(!Arc::ptr_eq(&default_factory(), &custom));
        reset_default_factory();
    }

    #[test]
    #[serial]
    fn unattached_notice_uses_default_registry() {
        let custom = Arc::new(Factory::default());
        set_default_factory(Arc::clone(&custom));

        let notice = Notice::new("loose");
        assert!(Arc::ptr_eq(notice.registry(), custom.registry()));

        reset_default_factory();
    }

    #[test]
    #[serial]
    fn create_factory_clones_default_registry() {
        let mut registry = Registry::new();
        registry.set_repeat_timeout(ChannelKind::Sms, Some(Duration::from_secs(5)));
        set_default_factory(Arc::new(Factory::new(Arc::new(registry))));

        let factory = create_factory();
        assert_eq!(
            factory.registry().repeat_timeout(ChannelKind::Sms),
            Some(Duration::from_secs(5))
        );
        assert!(!Arc::ptr_eq(factory.registry(), default_factory().registry()));

        reset_default_factory();
    }

    #[test]
    #[serial]
    fn free_functions_use_default_factory() {
        reset_default_factory();
        assert!(info("i", None).is_info());
        assert!(create("c", Some(350), None).is_warning());
        assert!(error("e", None).is_error());
        assert!(from_error(NoticeError::new("x"), Some(Severity::Warning), None).is_warning());
        reset_default_factory();
    }
}
