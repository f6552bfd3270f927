//! ProgressObserver port - 進捗通知
//!
//! 進捗通知は観測専用で、制御フローには一切影響しない。
//! observer が panic しても `notify` が握りつぶす。

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::warn;

pub trait ProgressObserver: Send + Sync {
    /// `label` is a status label (possibly annotated), `attempt` is the
    /// 1-based poll attempt within the current cycle.
    fn on_progress(&self, label: &str, attempt: u32);
}

/// Invoke an observer, swallowing any panic it raises.
pub fn notify(observer: &dyn ProgressObserver, label: &str, attempt: u32) {
    let delivered = catch_unwind(AssertUnwindSafe(|| observer.on_progress(label, attempt)));
    if delivered.is_err() {
        warn!(label, attempt, "progress observer panicked; ignoring");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn on_progress(&self, _label: &str, _attempt: u32) {}
}

/// Adapts a closure into an observer.
pub struct FnProgress<F>(pub F);

impl<F> ProgressObserver for FnProgress<F>
where
    F: Fn(&str, u32) + Send + Sync,
{
    fn on_progress(&self, label: &str, attempt: u32) {
        (self.0)(label, attempt)
    }
}

/// Prefixes every label before forwarding it.
///
/// Used to tell "retry 2/2" or "fallback" progress apart from the first
/// attempt. An empty prefix forwards labels unchanged.
pub struct Annotated<'a> {
    inner: &'a dyn ProgressObserver,
    prefix: String,
}

impl<'a> Annotated<'a> {
    pub fn new(inner: &'a dyn ProgressObserver, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    /// No prefix on the first cycle, `retry n/m: ` afterwards.
    pub fn for_cycle(inner: &'a dyn ProgressObserver, cycle: u32, budget: u32) -> Self {
        let prefix = if cycle <= 1 {
            String::new()
        } else {
            format!("retry {}/{}: ", cycle - 1, budget.saturating_sub(1))
        };
        Self::new(inner, prefix)
    }
}

impl ProgressObserver for Annotated<'_> {
    fn on_progress(&self, label: &str, attempt: u32) {
        if self.prefix.is_empty() {
            self.inner.on_progress(label, attempt);
        } else {
            self.inner
                .on_progress(&format!("{}{}", self.prefix, label), attempt);
        }
    }
}

/// Observer that records every call. Handy in tests and demos.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: std::sync::Mutex<Vec<(String, u32)>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, u32)> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ProgressObserver for RecordingProgress {
    fn on_progress(&self, label: &str, attempt: u32) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((label.to_string(), attempt));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exploding(_label: &str, _attempt: u32) {
        panic!("ui went away");
    }

    #[test]
    fn notify_swallows_panics() {
        let observer = FnProgress(exploding);
        notify(&observer, "queued", 1);
    }

    #[test]
    fn first_cycle_is_not_annotated() {
        let rec = RecordingProgress::new();
        let annotated = Annotated::for_cycle(&rec, 1, 3);
        annotated.on_progress("queued", 1);
        assert_eq!(rec.events(), vec![("queued".to_string(), 1)]);
    }

    #[test]
    fn retries_are_annotated() {
        let rec = RecordingProgress::new();
        let annotated = Annotated::for_cycle(&rec, 3, 3);
        annotated.on_progress("in-progress", 4);
        assert_eq!(rec.events(), vec![("retry 2/2: in-progress".to_string(), 4)]);
    }

    #[test]
    fn annotations_nest() {
        let rec = RecordingProgress::new();
        let outer = Annotated::new(&rec, "fallback backup: ");
        let inner = Annotated::for_cycle(&outer, 2, 2);
        inner.on_progress("queued", 1);
        assert_eq!(
            rec.events(),
            vec![("fallback backup: retry 1/1: queued".to_string(), 1)]
        );
    }
}
