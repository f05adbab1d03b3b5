//! # checkout-client
//!
//! Subscription backend integration for the checkout reconciliation flow.
//!
//! Provides the production [`SubscriptionActivator`] implementation (an HTTP
//! client for the backend that owns subscription state) plus a scriptable
//! [`MockActivator`] for demos and tests, and thin wrappers over the
//! backend's read endpoints.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_client::BackendClient;
//!
//! let client = BackendClient::from_env()?;
//! let info = client.subscription_info().await?;
//! ```
//!
//! [`SubscriptionActivator`]: checkout_core::SubscriptionActivator

mod backend;
mod error;
mod mock;

pub use backend::{BackendClient, BackendConfig, SessionStatus, SubscriptionInfo, SubscriptionPlan};
pub use error::{ClientError, Result};
pub use mock::MockActivator;
