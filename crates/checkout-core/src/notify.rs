//! Notification Surface
//!
//! Fire-and-forget notifications for the hosting UI (toasts, banners).
//! The flow emits at most one notification per terminal outcome; nothing
//! is emitted for intermediate failures that are about to be retried.

/// Host-facing notification sink
pub trait FlowNotifier: Send + Sync {
    /// Activation succeeded
    fn notify_success(&self, message: &str);

    /// Activation failed terminally
    fn notify_error(&self, message: &str);
}

/// Default notifier that emits structured log lines only
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl FlowNotifier for TracingNotifier {
    fn notify_success(&self, message: &str) {
        tracing::info!(notice = %message, "checkout notification");
    }

    fn notify_error(&self, message: &str) {
        tracing::error!(notice = %message, "checkout notification");
    }
}
