//! Mock Activator
//!
//! For testing and demo purposes. Succeeds immediately by default; can be
//! scripted to fail a number of leading calls or to add fixed latency.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use checkout_core::{
    mask_session_id, ActivationError, PlanSelector, Result, SubscriptionActivator,
};

/// Scriptable in-memory activator
pub struct MockActivator {
    /// Remaining calls to fail before succeeding
    failures_remaining: AtomicU32,

    /// Fixed latency added to every call
    latency: Option<Duration>,

    /// Health reported to callers
    healthy: AtomicBool,

    /// Session ids received, in order
    calls: Mutex<Vec<String>>,
}

impl Default for MockActivator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockActivator {
    pub fn new() -> Self {
        Self {
            failures_remaining: AtomicU32::new(0),
            latency: None,
            healthy: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail the first `count` calls with a transient error, then succeed
    pub fn failing(count: u32) -> Self {
        let mock = Self::new();
        mock.failures_remaining.store(count, Ordering::SeqCst);
        mock
    }

    /// Add fixed latency to every call (for exercising the deadline)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Flip the reported health
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Session ids received so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SubscriptionActivator for MockActivator {
    async fn activate_subscription(&self, session_id: &str, plan: PlanSelector) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.calls.lock().unwrap().push(session_id.to_string());
        tracing::debug!(
            session_id = %mask_session_id(session_id),
            plan = %plan,
            "mock activation call"
        );
        // Single RMW so concurrent calls never consume the same failure.
        let consumed_failure = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if consumed_failure {
            return Err(ActivationError::transient("mock activation failure"));
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_succeeds_by_default() {
        let mock = MockActivator::new();
        let result = mock
            .activate_subscription("cs_test_a1b2c3", PlanSelector::Monthly)
            .await;
        assert!(result.is_ok());
        assert_eq!(mock.calls(), vec!["cs_test_a1b2c3".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_fails_then_succeeds() {
        let mock = MockActivator::failing(2);
        assert!(mock
            .activate_subscription("cs_1", PlanSelector::Monthly)
            .await
            .is_err());
        assert!(mock
            .activate_subscription("cs_1", PlanSelector::Monthly)
            .await
            .is_err());
        assert!(mock
            .activate_subscription("cs_1", PlanSelector::Monthly)
            .await
            .is_ok());
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mock_concurrent_calls_consume_failures_exactly() {
        let mock = std::sync::Arc::new(MockActivator::failing(8));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let mock = std::sync::Arc::clone(&mock);
            handles.push(tokio::spawn(async move {
                mock.activate_subscription("cs_1", PlanSelector::Monthly)
                    .await
                    .is_err()
            }));
        }
        let mut failures = 0;
        for handle in handles {
            if handle.await.unwrap() {
                failures += 1;
            }
        }
        assert_eq!(failures, 8);
        assert_eq!(mock.call_count(), 16);
        assert_eq!(mock.failures_remaining.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_latency_is_applied() {
        let mock = MockActivator::new().with_latency(Duration::from_secs(3));
        let start = tokio::time::Instant::now();
        mock.activate_subscription("cs_1", PlanSelector::Annual)
            .await
            .unwrap();
        assert_eq!(tokio::time::Instant::now() - start, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_mock_health_toggle() {
        let mock = MockActivator::new();
        assert!(mock.health_check().await);
        mock.set_healthy(false);
        assert!(!mock.health_check().await);
    }
}
