use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Info,
    Warning,
}

impl Severity {
    /// How long a toast of this severity stays up when no duration is given
    pub fn default_duration(self) -> Duration {
        match self {
            Severity::Success => Duration::from_millis(4000),
            Severity::Error => Duration::from_millis(6000),
            Severity::Info | Severity::Warning => Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    /// Extra error information, e.g. per-field validation messages
    #[cfg_attr(feature = "ts", ts(type = "unknown"))]
    pub detail: Option<Value>,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
    pub duration_ms: u64,
}

#[derive(Default)]
struct State {
    toasts: Vec<Toast>,
    timers: HashMap<u64, AbortHandle>,
}

struct Inner {
    next_id: AtomicU64,
    state: Mutex<State>,
    published: watch::Sender<Vec<Toast>>,
}

impl Inner {
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &State) {
        self.published.send_replace(state.toasts.clone());
    }

    /// Timer-driven removal
    fn expire(&self, id: u64) {
        let mut state = self.lock();
        state.timers.remove(&id);
        let before = state.toasts.len();
        state.toasts.retain(|t| t.id != id);
        if state.toasts.len() != before {
            debug!(id, "Toast expired");
            self.publish(&state);
        }
    }
}

/// Toast queue with timed expiry. Clones share the same queue.
#[derive(Clone)]
pub struct ToastService {
    inner: Arc<Inner>,
}

impl Default for ToastService {
    fn default() -> Self {
        Self::new()
    }
}

impl ToastService {
    pub fn new() -> Self {
        let (published, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(0),
                state: Mutex::new(State::default()),
                published,
            }),
        }
    }

    /// Add a toast and schedule its removal. Returns its id.
    ///
    /// Expiry needs a tokio runtime; without one the toast stays until it is
    /// removed explicitly.
    pub fn push(
        &self,
        message: impl Into<String>,
        severity: Severity,
        detail: Option<Value>,
        duration: Option<Duration>,
    ) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let duration = duration.unwrap_or_else(|| severity.default_duration());
        let toast = Toast {
            id,
            message: message.into(),
            severity,
            detail,
            created_at: Utc::now(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        };

        let mut state = self.inner.lock();
        state.toasts.push(toast);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let weak: Weak<Inner> = Arc::downgrade(&self.inner);
                let task = runtime.spawn(async move {
                    tokio::time::sleep(duration).await;
                    if let Some(inner) = weak.upgrade() {
                        inner.expire(id);
                    }
                });
                state.timers.insert(id, task.abort_handle());
            }
            Err(_) => warn!(id, "No async runtime, toast will not expire on its own"),
        }
        self.inner.publish(&state);
        id
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.push(message, Severity::Success, None, None)
    }

    pub fn error(&self, message: impl Into<String>, detail: Option<Value>) -> u64 {
        self.push(message, Severity::Error, detail, None)
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.push(message, Severity::Info, None, None)
    }

    pub fn warning(&self, message: impl Into<String>) -> u64 {
        self.push(message, Severity::Warning, None, None)
    }

    /// Remove a toast and cancel its timer. Returns whether it was present.
    pub fn remove(&self, id: u64) -> bool {
        let mut state = self.inner.lock();
        if let Some(timer) = state.timers.remove(&id) {
            timer.abort();
        }
        let before = state.toasts.len();
        state.toasts.retain(|t| t.id != id);
        let removed = state.toasts.len() != before;
        if removed {
            self.inner.publish(&state);
        }
        removed
    }

    /// Remove every toast and cancel every pending timer
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
        state.toasts.clear();
        self.inner.publish(&state);
    }

    /// Current toasts in insertion order
    pub fn toasts(&self) -> Vec<Toast> {
        self.inner.lock().toasts.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Toast>> {
        self.inner.published.subscribe()
    }

    /// Number of scheduled expiries still pending
    pub fn pending_timers(&self) -> usize {
        self.inner.lock().timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(service: &ToastService) -> Vec<u64> {
        service.toasts().iter().map(|t| t.id).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_assigns_increasing_ids() {
        let toasts = ToastService::new();
        let a = toasts.success("saved");
        let b = toasts.error("failed", Some(json!({"email": ["taken"]})));
        let c = toasts.info("hello");

        assert!(a < b && b < c);
        assert_eq!(ids(&toasts), vec![a, b, c]);

        let error = &toasts.toasts()[1];
        assert_eq!(error.severity, Severity::Error);
        assert_eq!(error.detail, Some(json!({"email": ["taken"]})));
        assert_eq!(error.duration_ms, 6000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toast_expires_after_default_duration() {
        let toasts = ToastService::new();
        toasts.success("saved");

        tokio::time::sleep(Duration::from_millis(3999)).await;
        assert_eq!(toasts.toasts().len(), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(toasts.toasts().is_empty());
        assert_eq!(toasts.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_duration() {
        let toasts = ToastService::new();
        let short = toasts.push("short", Severity::Warning, None, Some(Duration::from_millis(100)));
        let long = toasts.warning("long");

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(ids(&toasts), vec![long]);
        assert!(!toasts.remove(short));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_before_expiry() {
        let toasts = ToastService::new();
        let id = toasts.push("x", Severity::Error, None, None);

        assert!(toasts.remove(id));
        assert!(toasts.toasts().is_empty());
        assert_eq!(toasts.pending_timers(), 0);

        // Removing again is a no-op
        assert!(!toasts.remove(id));
        assert!(!toasts.remove(999));
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_timer_does_not_touch_later_toasts() {
        let toasts = ToastService::new();
        let first = toasts.success("first");
        toasts.remove(first);
        let second = toasts.success("second");

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(ids(&toasts), vec![second]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_timers() {
        let toasts = ToastService::new();
        toasts.success("a");
        toasts.error("b", None);
        assert_eq!(toasts.pending_timers(), 2);

        toasts.clear();
        assert!(toasts.toasts().is_empty());
        assert_eq!(toasts.pending_timers(), 0);

        let kept = toasts.info("c");
        tokio::time::sleep(Duration::from_millis(4500)).await;
        assert_eq!(ids(&toasts), vec![kept]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_changes_in_order() {
        let toasts = ToastService::new();
        let mut rx = toasts.subscribe();
        assert!(rx.borrow_and_update().is_empty());

        let a = toasts.success("a");
        let b = toasts.success("b");
        assert!(rx.has_changed().unwrap());
        let seen: Vec<u64> = rx.borrow_and_update().iter().map(|t| t.id).collect();
        assert_eq!(seen, vec![a, b]);

        toasts.remove(a);
        rx.changed().await.unwrap();
        let seen: Vec<u64> = rx.borrow_and_update().iter().map(|t| t.id).collect();
        assert_eq!(seen, vec![b]);
    }

    #[test]
    fn test_push_without_runtime_keeps_toast() {
        let toasts = ToastService::new();
        let id = toasts.success("no runtime");
        assert_eq!(toasts.pending_timers(), 0);
        assert!(toasts.remove(id));
    }

    #[test]
    fn test_severity_defaults() {
        assert_eq!(Severity::Success.default_duration(), Duration::from_millis(4000));
        assert_eq!(Severity::Error.default_duration(), Duration::from_millis(6000));
        assert_eq!(Severity::Info.default_duration(), Duration::from_millis(5000));
        assert_eq!(Severity::Warning.default_duration(), Duration::from_millis(5000));
    }

    #[test]
    fn test_toast_serializes_camel_case() {
        let toasts = ToastService::new();
        toasts.push("hi", Severity::Info, None, Some(Duration::from_millis(10)));
        let value = serde_json::to_value(&toasts.toasts()[0]).unwrap();
        assert_eq!(value["severity"], "info");
        assert_eq!(value["durationMs"], 10);
        assert!(value.get("createdAt").is_some());
    }
}
