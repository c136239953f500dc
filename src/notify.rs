//! Notification sink for user-visible export events.
//!
//! The host shows export problems (no questions, stylesheet missing, …) in its
//! own UI. Inject an [`Arc<dyn NotificationSink>`] into
//! [`crate::export::HtmlTableExporter::with_notifier`] to receive them; the
//! exporter never prints anything itself.
//!
//! # Example
//!
//! ```rust
//! use qformat_htmltable::{NotificationSink, Severity};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Collect(Mutex<Vec<String>>);
//!
//! impl NotificationSink for Collect {
//!     fn notify(&self, _severity: Severity, message: &str) {
//!         self.0.lock().unwrap().push(message.to_string());
//!     }
//! }
//! ```

use std::sync::Arc;

/// How prominent a notification should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Export finished but something was copied through unmodified.
    Warning,
    /// Export failed.
    Error,
}

/// Receives localized, user-facing messages from an export.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait NotificationSink: Send + Sync {
    /// A message for the user.
    fn notify(&self, severity: Severity, message: &str) {
        let _ = (severity, message);
    }

    /// A temp file was kept on disk because debug mode is on.
    fn on_temp_file_kept(&self, path: &std::path::Path) {
        let _ = path;
    }
}

/// A sink that drops everything.
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl NotificationSink for NoopNotifier {}

/// Shareable sink handle.
pub type Notifier = Arc<dyn NotificationSink>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<(Severity, String)>>);

    impl NotificationSink for Recording {
        fn notify(&self, severity: Severity, message: &str) {
            self.0.lock().unwrap().push((severity, message.to_string()));
        }
    }

    #[test]
    fn test_noop_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoopNotifier>();
        let n: Notifier = Arc::new(NoopNotifier);
        n.notify(Severity::Error, "ignored");
    }

    #[test]
    fn test_recording_sink() {
        let sink = Recording::default();
        sink.notify(Severity::Warning, "careful");
        sink.on_temp_file_kept(std::path::Path::new("/tmp/x"));
        let got = sink.0.lock().unwrap();
        assert_eq!(got.as_slice(), &[(Severity::Warning, "careful".to_string())]);
    }
}
