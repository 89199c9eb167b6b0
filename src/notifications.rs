//! Notification center
//!
//! Deduplicates and timeboxes operator alerts. Accepted notifications are
//! prepended to the feed in [`DashboardState`] and forwarded to a
//! [`ToastSink`], the transient popup surface owned by the presentation layer.

use crate::config::NotificationConfig;
use crate::state::{DashboardState, Notification, NotificationKind};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};

/// Source of the current time
pub trait Clock: Send {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
///
/// Clones share the same time, so a test can keep one handle and hand the
/// other to the console.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A transient popup shown for a notification
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    /// Capitalized kind name
    pub title: String,
    /// Notification text
    pub text: String,
    /// Tone of the popup
    pub kind: NotificationKind,
    /// How long the popup stays visible
    pub duration: Duration,
}

/// Surface that displays toasts
pub trait ToastSink: Send {
    /// Show a toast
    fn show(&mut self, toast: &Toast);
}

impl<F> ToastSink for F
where
    F: FnMut(&Toast) + Send,
{
    fn show(&mut self, toast: &Toast) {
        self(toast)
    }
}

/// Writes toasts to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingToastSink;

impl ToastSink for TracingToastSink {
    fn show(&mut self, toast: &Toast) {
        match toast.kind {
            NotificationKind::Error => error!(title = %toast.title, "{}", toast.text),
            NotificationKind::Warning => warn!(title = %toast.title, "{}", toast.text),
            NotificationKind::Info | NotificationKind::Success => {
                info!(title = %toast.title, "{}", toast.text)
            }
        }
    }
}

/// Discards toasts
#[derive(Debug, Clone, Copy, Default)]
pub struct NullToastSink;

impl ToastSink for NullToastSink {
    fn show(&mut self, _toast: &Toast) {}
}

/// Deduplicating notification producer
pub struct NotificationCenter {
    clock: Box<dyn Clock>,
    sink: Box<dyn ToastSink>,
    debounce: Duration,
    default_timeout: Duration,
    last: Option<(String, DateTime<Utc>)>,
}

impl NotificationCenter {
    /// Create a center using the system clock and logging toasts
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            clock: Box::new(SystemClock),
            sink: Box::new(TracingToastSink),
            debounce: config.debounce,
            default_timeout: config.toast_timeout,
            last: None,
        }
    }

    /// Replace the time source
    pub fn set_clock(&mut self, clock: Box<dyn Clock>) {
        self.clock = clock;
    }

    /// Replace the toast surface
    pub fn set_sink(&mut self, sink: Box<dyn ToastSink>) {
        self.sink = sink;
    }

    /// Add a notification
    ///
    /// Returns `None` when `message` repeats the previous accepted message
    /// within the debounce window. Only the text takes part in that check.
    ///
    /// # Arguments
    /// * `state` - Dashboard state holding the feed
    /// * `message` - Text shown to the operator
    /// * `kind` - Tone of the notification
    /// * `timeout` - Toast duration, `None` for the configured default
    pub fn add(
        &mut self,
        state: &mut DashboardState,
        message: &str,
        kind: NotificationKind,
        timeout: Option<Duration>,
    ) -> Option<Notification> {
        let now = self.clock.now();
        if let Some((last_message, last_time)) = &self.last {
            let elapsed = (now - *last_time).to_std().unwrap_or(Duration::ZERO);
            if last_message == message && elapsed < self.debounce {
                return None;
            }
        }
        self.last = Some((message.to_string(), now));

        let notification = Notification {
            id: now.timestamp_millis(),
            message: message.to_string(),
            kind,
            created_at: now,
        };
        state.push_notification(notification.clone());

        self.sink.show(&Toast {
            title: kind.title().to_string(),
            text: message.to_string(),
            kind,
            duration: timeout.unwrap_or(self.default_timeout),
        });

        Some(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::TimeZone;

    fn center() -> (NotificationCenter, ManualClock, Arc<Mutex<Vec<Toast>>>) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        let toasts = Arc::new(Mutex::new(Vec::new()));
        let mut center = NotificationCenter::new(&Config::default().notifications);
        center.set_clock(Box::new(clock.clone()));
        let sink_toasts = toasts.clone();
        center.set_sink(Box::new(move |toast: &Toast| {
            sink_toasts.lock().unwrap().push(toast.clone())
        }));
        (center, clock, toasts)
    }

    #[test]
    fn test_duplicate_within_window_is_dropped() {
        let (mut center, clock, toasts) = center();
        let mut state = DashboardState::new();

        assert!(center.add(&mut state, "X", NotificationKind::Info, None).is_some());
        clock.advance(Duration::from_millis(4999));
        assert!(center.add(&mut state, "X", NotificationKind::Error, None).is_none());

        assert_eq!(state.notifications().len(), 1);
        assert_eq!(toasts.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_after_window_is_kept() {
        let (mut center, clock, _) = center();
        let mut state = DashboardState::new();

        center.add(&mut state, "X", NotificationKind::Info, None);
        clock.advance(Duration::from_millis(5000));
        assert!(center.add(&mut state, "X", NotificationKind::Info, None).is_some());

        assert_eq!(state.notifications().len(), 2);
    }

    #[test]
    fn test_only_previous_message_is_compared() {
        let (mut center, _, _) = center();
        let mut state = DashboardState::new();

        center.add(&mut state, "X", NotificationKind::Info, None);
        center.add(&mut state, "Y", NotificationKind::Info, None);
        center.add(&mut state, "X", NotificationKind::Info, None);

        let messages: Vec<_> = state.notifications().iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["X", "Y", "X"]);
    }

    #[test]
    fn test_notification_fields_and_toast() {
        let (mut center, _, toasts) = center();
        let mut state = DashboardState::new();

        let created = center
            .add(
                &mut state,
                "Kill command sent to a1",
                NotificationKind::Warning,
                Some(Duration::from_secs(10)),
            )
            .unwrap();

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(created.id, start.timestamp_millis());
        assert_eq!(created.created_at, start);
        assert_eq!(state.notifications()[0], created);

        let toasts = toasts.lock().unwrap();
        assert_eq!(toasts[0].title, "Warning");
        assert_eq!(toasts[0].text, "Kill command sent to a1");
        assert_eq!(toasts[0].duration, Duration::from_secs(10));
    }

    #[test]
    fn test_feed_is_bounded_to_fifty() {
        let (mut center, clock, _) = center();
        let mut state = DashboardState::new();

        for i in 0..60 {
            clock.advance(Duration::from_millis(1));
            center.add(&mut state, &format!("message {}", i), NotificationKind::Info, None);
        }

        assert_eq!(state.notifications().len(), 50);
        assert_eq!(state.notifications()[0].message, "message 59");
        assert_eq!(state.notifications()[49].message, "message 10");
    }
}
