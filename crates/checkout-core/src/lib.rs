//! # checkout-core
//!
//! Reconciliation state machine for premium subscription activation after a
//! hosted-checkout redirect.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       CheckoutFlow                           │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────────┐  │
//! │  │   Attempt   │  │   Timeout   │  │ SubscriptionActivator│  │
//! │  │    Guard    │──│  + Retry    │──│      (Strategy)      │  │
//! │  └─────────────┘  └─────────────┘  └──────────────────────┘  │
//! │                        │                                     │
//! │                  FlowSnapshot (watch)                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The redirect's `session_id` and `plan` parameters are validated into a
//! [`PaymentSession`]; the flow then drives the collaborator's idempotent
//! activation call under a single-attempt guard, a 60-second deadline, and
//! a one-shot automatic retry. Display surfaces observe the flow through
//! read-only [`FlowSnapshot`]s. The `SubscriptionActivator` trait enables
//! swapping the HTTP backend for a mock without changing flow logic.

pub mod error;
pub mod guard;
pub mod invoker;
pub mod notify;
pub mod policy;
pub mod presenter;
pub mod session;


pub use error::{ActivationError, Result, ValidationError};
pub use guard::{AlreadyInProgress, AttemptGuard};
pub use invoker::SubscriptionActivator;
pub use notify::{FlowNotifier, TracingNotifier};
pub use policy::{ActivationAttempt, AttemptOutcome, BeginOutcome, CheckoutFlow, FlowConfig};
pub use presenter::{FlowSnapshot, Phase};
pub use session::{mask_session_id, PaymentSession, PlanSelector, PLACEHOLDER_SESSION_ID};
