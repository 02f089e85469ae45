use crate::errors::{ErrorCategory, ErrorRecord, Severity};
use crate::events::{EventBus, HostEvent};
use crate::prelude::HashMap;
use crate::{HostError, Result};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

/// External hook invoked for every captured error
pub type ReportHook = Arc<dyn Fn(&ErrorRecord) + Send + Sync>;

struct ReporterState {
    history: VecDeque<ErrorRecord>,
    cap: usize,
    next_id: u64,
    events: Option<EventBus>,
    hook: Option<ReportHook>,
}

/// Centralized error capture.
///
/// `report` logs the error, appends it to a bounded ring history, emits a
/// `core:error` event and invokes the optional external hook. It never fails
/// and never panics; a plugin or transform error can always be captured.
#[derive(Clone)]
pub struct ErrorReporter {
    state: Arc<Mutex<ReporterState>>,
    emitting: Arc<AtomicBool>,
}

impl ErrorReporter {
    /// Creates a reporter whose history keeps at most `cap` records
    pub fn new(cap: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(ReporterState {
                history: VecDeque::new(),
                cap: cap.max(1),
                next_id: 0,
                events: None,
                hook: None,
            })),
            emitting: Arc::new(AtomicBool::new(false)),
        }
    }

    fn state(&self) -> MutexGuard<'_, ReporterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wires the event bus used for `core:error` emission. Called once by
    /// the host during construction.
    pub fn attach_events(&self, events: EventBus) {
        self.state().events = Some(events);
    }

    /// Installs an external hook invoked for every captured record
    pub fn set_hook<F>(&self, hook: F)
    where
        F: Fn(&ErrorRecord) + Send + Sync + 'static,
    {
        self.state().hook = Some(Arc::new(hook));
    }

    /// Captures an error with a severity classified from its kind
    pub fn report(&self, source: &str, category: ErrorCategory, error: &HostError) {
        self.report_with_severity(source, category, Severity::classify(error), &error.to_string());
    }

    /// Captures an error with an explicit severity
    pub fn report_with_severity(
        &self,
        source: &str,
        category: ErrorCategory,
        severity: Severity,
        message: &str,
    ) {
        let (record, events, hook) = {
            let mut state = self.state();
            state.next_id += 1;
            let record = ErrorRecord {
                id: state.next_id,
                category,
                severity,
                source: source.to_string(),
                message: message.to_string(),
                timestamp: SystemTime::now(),
            };
            state.history.push_back(record.clone());
            while state.history.len() > state.cap {
                state.history.pop_front();
            }
            (record, state.events.clone(), state.hook.clone())
        };

        match severity {
            Severity::Info => log::info!("[{}] {}: {}", category, source, message),
            Severity::Warning => log::warn!("[{}] {}: {}", category, source, message),
            _ => log::error!("[{}] {}: {}", category, source, message),
        }

        if let Some(hook) = hook {
            hook(&record);
        }

        // A failing core:error handler reports back into this reporter; the
        // guard keeps that from recursing into another emission.
        if let Some(events) = events {
            if !self.emitting.swap(true, Ordering::SeqCst) {
                events.emit(&HostEvent::CoreError { record });
                self.emitting.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Runs a fallible operation, capturing any failure.
    ///
    /// The caught value is converted into a typed [`HostError`] (an error
    /// that already is one passes through unchanged) and reported. When a
    /// `recovery` value was supplied the error is swallowed and the recovery
    /// value returned; otherwise the original error propagates after
    /// reporting.
    pub fn run_guarded<T, E, F>(
        &self,
        source: &str,
        category: ErrorCategory,
        recovery: Option<T>,
        op: F,
    ) -> Result<T>
    where
        E: Into<HostError>,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        match op() {
            Ok(value) => Ok(value),
            Err(caught) => {
                let error = caught.into();
                self.report(source, category, &error);
                match recovery {
                    Some(value) => Ok(value),
                    None => Err(error),
                }
            }
        }
    }

    /// Async variant of [`run_guarded`](Self::run_guarded)
    pub async fn run_guarded_async<T, E, F>(
        &self,
        source: &str,
        category: ErrorCategory,
        recovery: Option<T>,
        op: F,
    ) -> Result<T>
    where
        E: Into<HostError>,
        F: Future<Output = std::result::Result<T, E>>,
    {
        match op.await {
            Ok(value) => Ok(value),
            Err(caught) => {
                let error = caught.into();
                self.report(source, category, &error);
                match recovery {
                    Some(value) => Ok(value),
                    None => Err(error),
                }
            }
        }
    }

    /// All captured records, oldest first
    pub fn history(&self) -> Vec<ErrorRecord> {
        self.state().history.iter().cloned().collect()
    }

    /// Records captured for one category
    pub fn by_category(&self, category: ErrorCategory) -> Vec<ErrorRecord> {
        self.state()
            .history
            .iter()
            .filter(|r| r.category == category)
            .cloned()
            .collect()
    }

    /// Records at or above the given severity
    pub fn by_severity(&self, severity: Severity) -> Vec<ErrorRecord> {
        self.state()
            .history
            .iter()
            .filter(|r| r.severity >= severity)
            .cloned()
            .collect()
    }

    /// Total records currently retained
    pub fn count(&self) -> usize {
        self.state().history.len()
    }

    /// Retained record counts per category
    pub fn counts_by_category(&self) -> HashMap<ErrorCategory, usize> {
        let mut counts = HashMap::default();
        for record in self.state().history.iter() {
            *counts.entry(record.category).or_insert(0) += 1;
        }
        counts
    }

    /// Whether any retained record is critical
    pub fn has_critical(&self) -> bool {
        self.state()
            .history
            .iter()
            .any(|r| r.severity == Severity::Critical)
    }

    /// Drops the retained history
    pub fn clear(&self) {
        self.state().history.clear();
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use std::sync::atomic::AtomicUsize;

    fn caught(msg: &str) -> HostError {
        HostError::Caught(msg.to_string())
    }

    #[test]
    fn test_history_is_bounded() {
        let reporter = ErrorReporter::new(3);
        for i in 0..5 {
            reporter.report("test", ErrorCategory::General, &caught(&format!("e{}", i)));
        }

        let history = reporter.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].message, "e2");
        assert_eq!(history[2].message, "e4");
    }

    #[test]
    fn test_core_error_event_emitted() {
        let reporter = ErrorReporter::new(8);
        let bus = EventBus::new();
        reporter.attach_events(bus.clone());

        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        bus.on(EventKind::CoreError, move |event| {
            if let HostEvent::CoreError { record } = event {
                assert_eq!(record.message, "boom");
                hits_clone.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });

        reporter.report("test", ErrorCategory::Plugin, &caught("boom"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_core_error_handler_does_not_recurse() {
        let reporter = ErrorReporter::new(8);
        let bus = EventBus::new();
        bus.set_reporter(reporter.clone());
        reporter.attach_events(bus.clone());

        bus.on(EventKind::CoreError, |_| {
            Err(HostError::Caught("handler failed".to_string()))
        });

        reporter.report("test", ErrorCategory::General, &caught("boom"));
        // Two records: the original plus the handler failure, no runaway.
        assert_eq!(reporter.count(), 2);
    }

    #[test]
    fn test_run_guarded_with_recovery_swallows() {
        let reporter = ErrorReporter::new(8);
        let result = reporter.run_guarded("op", ErrorCategory::Layer, Some(7), || {
            Err::<i32, _>(caught("bad layer"))
        });

        assert_eq!(result.unwrap(), 7);
        assert_eq!(reporter.by_category(ErrorCategory::Layer).len(), 1);
    }

    #[test]
    fn test_run_guarded_without_recovery_propagates() {
        let reporter = ErrorReporter::new(8);
        let result: Result<i32> =
            reporter.run_guarded("op", ErrorCategory::General, None, || Err(caught("oops")));

        assert!(matches!(result, Err(HostError::Caught(msg)) if msg == "oops"));
        assert_eq!(reporter.count(), 1);
    }

    #[tokio::test]
    async fn test_run_guarded_async() {
        let reporter = ErrorReporter::new(8);
        let ok = reporter
            .run_guarded_async("op", ErrorCategory::General, None, async {
                Ok::<_, HostError>(42)
            })
            .await;
        assert_eq!(ok.unwrap(), 42);

        let recovered = reporter
            .run_guarded_async("op", ErrorCategory::General, Some(0), async {
                Err::<i32, _>(caught("late failure"))
            })
            .await;
        assert_eq!(recovered.unwrap(), 0);
    }

    #[test]
    fn test_severity_queries() {
        let reporter = ErrorReporter::new(8);
        reporter.report(
            "restore",
            ErrorCategory::General,
            &HostError::SchemaVersionTooOld {
                found: 0,
                minimum: 1,
            },
        );
        reporter.report(
            "restore",
            ErrorCategory::General,
            &HostError::SchemaVersionNewer {
                found: 9,
                current: 3,
            },
        );

        assert!(reporter.has_critical());
        assert_eq!(reporter.by_severity(Severity::Critical).len(), 1);
        assert_eq!(reporter.by_severity(Severity::Warning).len(), 2);
    }

    #[test]
    fn test_hook_invoked() {
        let reporter = ErrorReporter::new(8);
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        reporter.set_hook(move |record| {
            assert_eq!(record.source, "test");
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        reporter.report("test", ErrorCategory::General, &caught("x"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
