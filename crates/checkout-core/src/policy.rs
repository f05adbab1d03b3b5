//! Checkout Reconciliation Flow
//!
//! Drives a redirect landing from "the payment provider says we are done"
//! to "the subscription is actually active". One activation attempt is in
//! flight at a time, each attempt runs against a hard deadline, the first
//! failure earns a single automatic retry after a short delay, and the
//! error phase is only left through an explicit manual retry.
//!
//! Every attempt carries a generation tag. An outcome that arrives for any
//! generation other than the current pending one is discarded, so late
//! results from timed-out or superseded attempts can never overwrite newer
//! state. In-flight collaborator calls are never cancelled; a timeout only
//! stops the flow from waiting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::ActivationError;
use crate::guard::{AlreadyInProgress, AttemptGuard};
use crate::invoker::SubscriptionActivator;
use crate::notify::FlowNotifier;
use crate::presenter::{FlowSnapshot, Phase};
use crate::session::{mask_session_id, PaymentSession};

/// Notification shown once when activation reaches the success phase
const SUCCESS_NOTICE: &str = "Premium subscription activated successfully!";

/// Timing knobs for the reconciliation flow
#[derive(Clone, Copy, Debug)]
pub struct FlowConfig {
    /// Hard deadline for a single activation attempt
    pub activation_deadline: Duration,

    /// Delay before the single automatic retry
    pub auto_retry_delay: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            activation_deadline: Duration::from_secs(60),
            auto_retry_delay: Duration::from_secs(5),
        }
    }
}

/// Outcome of a single activation attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Attempt is still in flight
    Pending,

    /// Collaborator confirmed the activation
    Success,

    /// Collaborator failed, or the deadline elapsed first
    Failure(ActivationError),
}

/// A single activation attempt, identified by its generation tag
#[derive(Clone, Debug)]
pub struct ActivationAttempt {
    /// Position in the flow's attempt sequence, starting at 1
    pub generation: u64,

    /// When the attempt started
    pub started_at: DateTime<Utc>,

    /// When the timeout supervisor will stop waiting for it
    pub deadline: DateTime<Utc>,

    /// Resolution, if any
    pub outcome: AttemptOutcome,
}

/// Result of asking the flow to begin processing or to retry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeginOutcome {
    /// A new attempt was started
    Started,

    /// An attempt or a scheduled retry is already active; trigger dropped
    AlreadyInProgress,

    /// The flow already succeeded; nothing left to do
    AlreadyActivated,

    /// The flow already failed terminally; only a manual retry leaves that phase
    AlreadyFailed,

    /// The redirect never validated, so there is no session to submit
    SessionInvalid,
}

/// Pending automatic retry, tagged with the generation whose failure
/// scheduled it. The tag is re-checked when the timer fires, so a manual
/// retry that raced the wakeup still wins.
struct ScheduledRetry {
    after_generation: u64,
    handle: JoinHandle<()>,
}

/// Mutable flow state. The mutex around it is never held across an await.
struct FlowState {
    phase: Phase,
    guard: AttemptGuard,
    attempt: Option<ActivationAttempt>,
    auto_retry_consumed: bool,
    last_error_detail: Option<String>,
    scheduled_retry: Option<ScheduledRetry>,
    deadline_task: Option<JoinHandle<()>>,
}

struct FlowInner {
    /// Validated session; `None` when the redirect failed validation
    session: Option<PaymentSession>,
    display_session_id: String,
    activator: Arc<dyn SubscriptionActivator>,
    notifier: Arc<dyn FlowNotifier>,
    config: FlowConfig,
    state: Mutex<FlowState>,
    snapshot_tx: watch::Sender<FlowSnapshot>,
}

/// Reconciliation flow for one hosted-checkout redirect.
///
/// Cloning is cheap and shares the same flow. Spawned attempt and timer
/// tasks hold only weak references, so dropping the last clone tears the
/// flow down: timers are aborted and any still-running collaborator call
/// resolves into nothing.
#[derive(Clone)]
pub struct CheckoutFlow {
    inner: Arc<FlowInner>,
}

impl CheckoutFlow {
    /// Create a flow for an already-validated session.
    ///
    /// The flow starts idle; nothing runs until [`CheckoutFlow::begin`].
    pub fn new(
        session: PaymentSession,
        activator: Arc<dyn SubscriptionActivator>,
        notifier: Arc<dyn FlowNotifier>,
        config: FlowConfig,
    ) -> Self {
        let display_session_id = session.display_id();
        Self::from_parts(
            Some(session),
            display_session_id,
            Phase::Idle,
            None,
            activator,
            notifier,
            config,
        )
    }

    /// Build a flow straight from the redirect query parameters.
    ///
    /// A redirect that fails validation produces a flow already in the
    /// error phase, with zero collaborator calls made on its behalf.
    pub fn from_query(
        params: &HashMap<String, String>,
        activator: Arc<dyn SubscriptionActivator>,
        notifier: Arc<dyn FlowNotifier>,
        config: FlowConfig,
    ) -> Self {
        match PaymentSession::from_query(params) {
            Ok(session) => Self::new(session, activator, notifier, config),
            Err(err) => {
                let raw = params
                    .get("session_id")
                    .map(String::as_str)
                    .unwrap_or_default();
                let display_session_id = mask_session_id(raw);
                tracing::error!(
                    session_id = %display_session_id,
                    error = %err,
                    "checkout redirect failed validation"
                );
                Self::from_parts(
                    None,
                    display_session_id,
                    Phase::Error,
                    Some(err.to_string()),
                    activator,
                    notifier,
                    config,
                )
            }
        }
    }

    fn from_parts(
        session: Option<PaymentSession>,
        display_session_id: String,
        phase: Phase,
        last_error_detail: Option<String>,
        activator: Arc<dyn SubscriptionActivator>,
        notifier: Arc<dyn FlowNotifier>,
        config: FlowConfig,
    ) -> Self {
        let snapshot = FlowSnapshot {
            phase,
            display_session_id: display_session_id.clone(),
            last_error_detail: last_error_detail.clone(),
            auto_retry_consumed: false,
        };
        let (snapshot_tx, _) = watch::channel(snapshot);
        Self {
            inner: Arc::new(FlowInner {
                session,
                display_session_id,
                activator,
                notifier,
                config,
                state: Mutex::new(FlowState {
                    phase,
                    guard: AttemptGuard::new(),
                    attempt: None,
                    auto_retry_consumed: false,
                    last_error_detail,
                    scheduled_retry: None,
                    deadline_task: None,
                }),
                snapshot_tx,
            }),
        }
    }

    /// Enter processing for the first time.
    ///
    /// Duplicate entry triggers (a double navigation event, a re-render)
    /// collapse into the single in-flight attempt and report
    /// [`BeginOutcome::AlreadyInProgress`].
    pub fn begin(&self) -> BeginOutcome {
        let Some(session) = self.inner.session.clone() else {
            return BeginOutcome::SessionInvalid;
        };
        let generation = {
            let mut state = self.inner.state.lock().unwrap();
            match state.phase {
                Phase::Success => return BeginOutcome::AlreadyActivated,
                Phase::Error => return BeginOutcome::AlreadyFailed,
                Phase::Processing => {
                    tracing::debug!(
                        session_id = %self.inner.display_session_id,
                        "duplicate activation trigger dropped"
                    );
                    return BeginOutcome::AlreadyInProgress;
                }
                Phase::Idle => {}
            }
            match self.start_attempt_locked(&mut state) {
                Ok(generation) => generation,
                Err(AlreadyInProgress) => return BeginOutcome::AlreadyInProgress,
            }
        };
        tracing::info!(
            session_id = %self.inner.display_session_id,
            plan = %session.plan(),
            generation,
            "starting premium activation"
        );
        self.spawn_invoke(session, generation);
        BeginOutcome::Started
    }

    /// Manual retry, the only way out of the error phase.
    ///
    /// Supersedes a still-pending automatic retry and restores the
    /// automatic-retry budget for the new cycle. Rejected while an attempt
    /// is in flight, after success, and for never-validated redirects.
    pub fn retry(&self) -> BeginOutcome {
        let Some(session) = self.inner.session.clone() else {
            return BeginOutcome::SessionInvalid;
        };
        let generation = {
            let mut state = self.inner.state.lock().unwrap();
            if state.phase == Phase::Success {
                return BeginOutcome::AlreadyActivated;
            }
            if state.guard.is_in_flight() {
                return BeginOutcome::AlreadyInProgress;
            }
            if let Some(scheduled) = state.scheduled_retry.take() {
                scheduled.handle.abort();
            }
            state.auto_retry_consumed = false;
            match self.start_attempt_locked(&mut state) {
                Ok(generation) => generation,
                Err(AlreadyInProgress) => return BeginOutcome::AlreadyInProgress,
            }
        };
        tracing::info!(
            session_id = %self.inner.display_session_id,
            generation,
            "manual retry started"
        );
        self.spawn_invoke(session, generation);
        BeginOutcome::Started
    }

    /// Current presenter snapshot
    pub fn snapshot(&self) -> FlowSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Watch the flow; the receiver yields a fresh snapshot on every change
    pub fn subscribe(&self) -> watch::Receiver<FlowSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// The most recently started attempt, if any
    pub fn current_attempt(&self) -> Option<ActivationAttempt> {
        self.inner.state.lock().unwrap().attempt.clone()
    }

    /// The automatic retry timer elapsed. The timer may have lost a race
    /// with a manual retry between its wakeup and this lock; the tag decides.
    fn fire_auto_retry(&self, after_generation: u64) {
        let Some(session) = self.inner.session.clone() else {
            return;
        };
        let generation = {
            let mut state = self.inner.state.lock().unwrap();
            let still_scheduled = state
                .scheduled_retry
                .as_ref()
                .is_some_and(|scheduled| scheduled.after_generation == after_generation);
            if !still_scheduled {
                tracing::debug!(after_generation, "scheduled retry superseded, not firing");
                return;
            }
            state.scheduled_retry = None;
            match self.start_attempt_locked(&mut state) {
                Ok(generation) => generation,
                Err(AlreadyInProgress) => {
                    tracing::debug!(
                        after_generation,
                        "retry timer fired while an attempt is in flight"
                    );
                    return;
                }
            }
        };
        tracing::info!(
            session_id = %self.inner.display_session_id,
            generation,
            "automatic retry started"
        );
        self.spawn_invoke(session, generation);
    }

    /// Claim the guard, record the new attempt, arm its deadline, and
    /// publish the processing snapshot.
    fn start_attempt_locked(&self, state: &mut FlowState) -> Result<u64, AlreadyInProgress> {
        let generation = state.guard.begin()?;
        let started_at = Utc::now();
        let deadline = started_at
            + chrono::Duration::from_std(self.inner.config.activation_deadline)
                .unwrap_or_else(|_| chrono::Duration::zero());
        state.attempt = Some(ActivationAttempt {
            generation,
            started_at,
            deadline,
            outcome: AttemptOutcome::Pending,
        });
        state.phase = Phase::Processing;
        state.last_error_detail = None;
        state.deadline_task = Some(self.spawn_deadline(generation));
        self.publish_locked(state);
        Ok(generation)
    }

    /// Run the collaborator call on a detached task. The task holds no
    /// strong reference to the flow; if the flow is gone by the time the
    /// call resolves, the result evaporates.
    fn spawn_invoke(&self, session: PaymentSession, generation: u64) {
        let weak = Arc::downgrade(&self.inner);
        let activator = Arc::clone(&self.inner.activator);
        tokio::spawn(async move {
            let result = activator
                .activate_subscription(session.session_id(), session.plan())
                .await;
            if let Some(inner) = weak.upgrade() {
                CheckoutFlow { inner }.apply_outcome(generation, result);
            }
        });
    }

    /// Arm the timeout supervisor for one attempt. Firing resolves that
    /// attempt as a timeout failure; it does not cancel the collaborator
    /// call, it only stops the flow from waiting for it.
    fn spawn_deadline(&self, generation: u64) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let deadline = self.inner.config.activation_deadline;
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            if let Some(inner) = weak.upgrade() {
                CheckoutFlow { inner }.apply_outcome(generation, Err(ActivationError::Timeout));
            }
        })
    }

    /// Resolve an attempt, if and only if the result belongs to the current
    /// still-pending generation. Anything else is stale and discarded.
    fn apply_outcome(&self, generation: u64, result: Result<(), ActivationError>) {
        let mut state = self.inner.state.lock().unwrap();
        let fresh = matches!(
            state.attempt.as_ref(),
            Some(attempt)
                if attempt.generation == generation && attempt.outcome == AttemptOutcome::Pending
        );
        if !fresh {
            tracing::debug!(
                session_id = %self.inner.display_session_id,
                generation,
                "discarding stale attempt outcome"
            );
            return;
        }
        state.guard.end();
        if let Some(deadline_task) = state.deadline_task.take() {
            deadline_task.abort();
        }
        match result {
            Ok(()) => {
                if let Some(attempt) = state.attempt.as_mut() {
                    attempt.outcome = AttemptOutcome::Success;
                }
                state.phase = Phase::Success;
                state.last_error_detail = None;
                self.publish_locked(&state);
                drop(state);
                tracing::info!(
                    session_id = %self.inner.display_session_id,
                    generation,
                    "premium subscription activated"
                );
                self.inner.notifier.notify_success(SUCCESS_NOTICE);
            }
            Err(err) => {
                let detail = err.detail();
                let retryable = err.is_retryable();
                if let Some(attempt) = state.attempt.as_mut() {
                    attempt.outcome = AttemptOutcome::Failure(err);
                }
                if retryable && !state.auto_retry_consumed {
                    state.auto_retry_consumed = true;
                    // Phase stays Processing while the retry counts down.
                    self.schedule_auto_retry_locked(&mut state);
                    self.publish_locked(&state);
                    drop(state);
                    tracing::warn!(
                        session_id = %self.inner.display_session_id,
                        generation,
                        error = %detail,
                        delay_secs = self.inner.config.auto_retry_delay.as_secs(),
                        "activation attempt failed, scheduling automatic retry"
                    );
                } else {
                    state.phase = Phase::Error;
                    state.last_error_detail = Some(detail.clone());
                    self.publish_locked(&state);
                    drop(state);
                    tracing::error!(
                        session_id = %self.inner.display_session_id,
                        generation,
                        error = %detail,
                        "activation failed"
                    );
                    self.inner
                        .notifier
                        .notify_error(&format!("Subscription activation failed: {detail}"));
                }
            }
        }
    }

    fn schedule_auto_retry_locked(&self, state: &mut FlowState) {
        let after_generation = state.guard.generation();
        let weak = Arc::downgrade(&self.inner);
        let delay = self.inner.config.auto_retry_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                CheckoutFlow { inner }.fire_auto_retry(after_generation);
            }
        });
        state.scheduled_retry = Some(ScheduledRetry {
            after_generation,
            handle,
        });
    }

    fn publish_locked(&self, state: &FlowState) {
        self.inner.snapshot_tx.send_replace(FlowSnapshot {
            phase: state.phase,
            display_session_id: self.inner.display_session_id.clone(),
            last_error_detail: state.last_error_detail.clone(),
            auto_retry_consumed: state.auto_retry_consumed,
        });
    }
}

impl Drop for FlowInner {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            if let Some(scheduled) = state.scheduled_retry.take() {
                scheduled.handle.abort();
            }
            if let Some(deadline_task) = state.deadline_task.take() {
                deadline_task.abort();
            }
        }
    }
}
