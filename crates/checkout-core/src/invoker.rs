//! Subscription Activator Strategy Pattern
//!
//! Defines the seam to the remote collaborator that owns subscription state
//! (an HTTP backend in production, a scriptable mock in tests and demos).
//! The flow works exclusively through this interface.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_core::SubscriptionActivator;
//!
//! let activator = BackendClient::from_env()?;
//! activator.activate_subscription("cs_test_a1b2c3", PlanSelector::Monthly).await?;
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::session::PlanSelector;

/// Strategy trait for premium subscription activation.
///
/// Implementations normalize every failure into an `ActivationError`; no
/// transport error type and no panic crosses this boundary. Calls may take
/// arbitrarily long, so callers bound them with their own deadline.
#[async_trait]
pub trait SubscriptionActivator: Send + Sync {
    /// Activate the subscription paid for by `session_id`.
    ///
    /// Idempotent per session id on the collaborator side: repeat calls
    /// after a success must not double-extend or double-charge. The
    /// collaborator owns that guarantee, which is what makes the at-least-once
    /// delivery of the redirect signal safe to reconcile.
    async fn activate_subscription(&self, session_id: &str, plan: PlanSelector) -> Result<()>;

    /// Check if the collaborator is reachable
    async fn health_check(&self) -> bool {
        true
    }
}
