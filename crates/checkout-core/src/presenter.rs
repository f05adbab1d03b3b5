//! Flow State Presentation
//!
//! Read-only projection of the reconciliation flow for display surfaces.
//! Snapshots are plain data: rendering them has no effect on the flow, and
//! the full session id never appears in one.

use serde::{Deserialize, Serialize};

/// Observable phase of the reconciliation flow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Flow created, first attempt not yet begun
    Idle,

    /// An attempt is in flight, or the automatic retry is counting down
    Processing,

    /// Entitlement activated; terminal
    Success,

    /// Terminal until an explicit manual retry
    Error,
}

/// Point-in-time view of a reconciliation flow
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSnapshot {
    /// Current phase
    pub phase: Phase,

    /// Masked session id (first 20 characters, `"N/A"` when absent)
    pub display_session_id: String,

    /// Detail of the most recent failure; `None` outside the error phase
    pub last_error_detail: Option<String>,

    /// Whether the single automatic retry has been spent in this cycle
    pub auto_retry_consumed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Phase::Idle).unwrap(), "idle");
        assert_eq!(serde_json::to_value(Phase::Processing).unwrap(), "processing");
        assert_eq!(serde_json::to_value(Phase::Success).unwrap(), "success");
        assert_eq!(serde_json::to_value(Phase::Error).unwrap(), "error");
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let snapshot = FlowSnapshot {
            phase: Phase::Error,
            display_session_id: "cs_test_a1B2c3D4e5F6...".to_string(),
            last_error_detail: Some("Activation timed out".to_string()),
            auto_retry_consumed: true,
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["phase"], "error");
        assert_eq!(value["display_session_id"], "cs_test_a1B2c3D4e5F6...");
        assert_eq!(value["last_error_detail"], "Activation timed out");
        assert_eq!(value["auto_retry_consumed"], true);
    }
}
