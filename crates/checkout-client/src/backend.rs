//! Subscription Backend Client
//!
//! HTTP integration with the remote backend that owns subscription state.
//! Activation goes through the [`SubscriptionActivator`] seam so the flow
//! never sees HTTP; the session-status and subscription queries mirror the
//! backend's read endpoints for display surfaces that want them.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use checkout_core::{ActivationError, PlanSelector, SubscriptionActivator};

use crate::error::{ClientError, Result};

/// Default per-request timeout. Longer than the flow's activation deadline;
/// timeout classification belongs to the flow supervisor, not this client.
const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Backend connection configuration
#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// Backend base URL
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// HTTP client for the subscription backend
#[derive(Debug)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    /// Create a client from explicit configuration
    pub fn new(config: BackendConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::Config(format!("Invalid backend URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "Invalid backend URL: {base_url}"
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    /// Create from environment variables
    ///
    /// `BACKEND_URL` is required; `BACKEND_TIMEOUT_SECS` is optional.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("BACKEND_URL")
            .map_err(|_| ClientError::Config("BACKEND_URL not set".into()))?;
        let timeout_secs = std::env::var("BACKEND_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self::new(BackendConfig {
            base_url,
            timeout_secs,
        })
    }

    /// Build an endpoint URL by appending path segments to the base.
    ///
    /// Each segment is percent-encoded, so an opaque token containing
    /// reserved characters still lands in exactly one segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Current status of a checkout session as the backend recorded it
    pub async fn session_status(&self, session_id: &str) -> Result<SessionStatus> {
        let response = self
            .http
            .get(self.endpoint(&["api", "checkout", "sessions", session_id]))
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(ClientError::Api {
                status,
                detail: read_error_detail(response).await,
            });
        }
        response
            .json::<SessionStatus>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// The caller's subscription summary
    pub async fn subscription_info(&self) -> Result<SubscriptionInfo> {
        let response = self
            .http
            .get(self.endpoint(&["api", "subscription"]))
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(ClientError::Api {
                status,
                detail: read_error_detail(response).await,
            });
        }
        response
            .json::<SubscriptionInfo>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SubscriptionActivator for BackendClient {
    async fn activate_subscription(
        &self,
        session_id: &str,
        plan: PlanSelector,
    ) -> checkout_core::Result<()> {
        let request = ActivateRequest {
            session_id,
            plan: SubscriptionPlan::from(plan),
        };
        let response = self
            .http
            .post(self.endpoint(&["api", "premium", "activate"]))
            .json(&request)
            .send()
            .await
            .map_err(|e| ActivationError::transient(e.to_string()))?;
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let detail = read_error_detail(response).await;
        tracing::warn!(status = status.as_u16(), "Backend rejected activation: {}", detail);
        Err(ActivationError::transient(detail))
    }

    async fn health_check(&self) -> bool {
        match self.http.get(self.endpoint(&["health"])).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!("Backend health check failed: {}", e);
                false
            }
        }
    }
}

/// Pull a detail string out of an error response, falling back to the status
async fn read_error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ApiErrorBody>().await {
        Ok(body) if !body.error.is_empty() => body.error,
        _ => format!("backend returned {status}"),
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: String,
}

/// Wire form of the backend's subscription plan
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubscriptionPlan {
    Free,
    PremiumMonthly,
    PremiumAnnual,
}

impl From<PlanSelector> for SubscriptionPlan {
    fn from(plan: PlanSelector) -> Self {
        match plan {
            PlanSelector::Monthly => SubscriptionPlan::PremiumMonthly,
            PlanSelector::Annual => SubscriptionPlan::PremiumAnnual,
        }
    }
}

/// Activation request body
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivateRequest<'a> {
    session_id: &'a str,
    plan: SubscriptionPlan,
}

/// Backend's record of a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SessionStatus {
    /// Payment completed; `response` carries the provider's session payload
    Completed { response: String },

    /// Provider reported failure for this session
    Failed { error: String },
}

/// Subscription summary for the signed-in user
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    /// Active plan
    pub plan: SubscriptionPlan,

    /// Whether the subscription has lapsed
    pub is_expired: bool,

    /// When the current period ends; `None` for the free plan
    pub expiration_date: Option<DateTime<Utc>>,

    /// Stored objects counted against the limit
    pub object_count: u64,

    /// Plan-dependent object limit
    pub object_limit: u64,
}
