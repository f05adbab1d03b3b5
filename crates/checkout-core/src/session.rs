//! Payment Session Extraction
//!
//! Parses the query parameters of the hosted-checkout redirect
//! (`session_id`, `plan`) into a validated, immutable [`PaymentSession`].
//! Parsing is pure: no clock, no network, no side effects.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Literal token the payment provider substitutes into the success URL.
/// Receiving it verbatim means the redirect template was never expanded
/// upstream, so there is no real session behind it.
pub const PLACEHOLDER_SESSION_ID: &str = "{CHECKOUT_SESSION_ID}";

/// Maximum number of session-id characters shown on display surfaces
const DISPLAY_ID_MAX: usize = 20;

/// Recognized plan keys from the redirect URL
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanSelector {
    Monthly,
    Annual,
}

impl PlanSelector {
    /// The redirect-parameter spelling of this plan
    pub fn as_str(self) -> &'static str {
        match self {
            PlanSelector::Monthly => "monthly",
            PlanSelector::Annual => "annual",
        }
    }

    /// Parse a redirect plan key.
    ///
    /// The set is closed: anything outside it is a validation failure,
    /// never a silent default.
    pub fn parse(key: &str) -> std::result::Result<Self, ValidationError> {
        match key {
            "monthly" => Ok(PlanSelector::Monthly),
            "annual" => Ok(PlanSelector::Annual),
            other => Err(ValidationError::UnrecognizedPlan(other.to_string())),
        }
    }
}

impl fmt::Display for PlanSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated checkout session.
///
/// Created once when the redirect lands and immutable afterwards. The full
/// session id is the correlation token the activator needs; everything
/// user-visible goes through [`PaymentSession::display_id`].
#[derive(Clone, PartialEq, Eq)]
pub struct PaymentSession {
    session_id: String,
    plan: PlanSelector,
}

impl PaymentSession {
    /// Build a session from the two raw parameter values
    pub fn new(session_id: &str, plan_key: &str) -> std::result::Result<Self, ValidationError> {
        let trimmed = session_id.trim();
        if trimmed.is_empty() || trimmed == PLACEHOLDER_SESSION_ID {
            return Err(ValidationError::InvalidSessionId);
        }
        let plan = PlanSelector::parse(plan_key)?;
        Ok(Self {
            session_id: trimmed.to_string(),
            plan,
        })
    }

    /// Build a session from the redirect query parameters.
    ///
    /// Missing parameters are treated the same as empty ones.
    pub fn from_query(
        params: &HashMap<String, String>,
    ) -> std::result::Result<Self, ValidationError> {
        let session_id = params
            .get("session_id")
            .map(String::as_str)
            .unwrap_or_default();
        let plan_key = params.get("plan").map(String::as_str).unwrap_or_default();
        Self::new(session_id, plan_key)
    }

    /// The full correlation token, for the activator only
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The validated plan selection
    pub fn plan(&self) -> PlanSelector {
        self.plan
    }

    /// Masked session id for display and logging
    pub fn display_id(&self) -> String {
        mask_session_id(&self.session_id)
    }
}

// The correlation token stays out of debug output
impl fmt::Debug for PaymentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentSession")
            .field("session_id", &self.display_id())
            .field("plan", &self.plan)
            .finish()
    }
}

/// Truncate a session id for user-facing surfaces: the first 20 characters
/// plus an ellipsis when longer, `"N/A"` when empty.
pub fn mask_session_id(session_id: &str) -> String {
    let trimmed = session_id.trim();
    if trimmed.is_empty() {
        return "N/A".to_string();
    }
    if trimmed.chars().count() > DISPLAY_ID_MAX {
        let prefix: String = trimmed.chars().take(DISPLAY_ID_MAX).collect();
        format!("{prefix}...")
    } else {
        trimmed.to_string()
    }
}
