//! HTTP Handlers

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use checkout_client::{SessionStatus, SubscriptionInfo};
use checkout_core::{BeginOutcome, CheckoutFlow, FlowSnapshot, Phase};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backend_configured: bool,
    pub backend_connected: bool,
    pub live_flows: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct FlowResponse {
    pub flow_id: Uuid,
    pub state: FlowSnapshot,
}

#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub outcome: BeginOutcome,
    pub state: FlowSnapshot,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend_connected = state.activator.health_check().await;

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        backend_configured: state.backend.is_some(),
        backend_connected,
        live_flows: state.flows.len(),
    })
}

/// Hosted-checkout redirect landing.
///
/// Creates a reconciliation flow from the raw query parameters and begins
/// processing immediately. Invalid parameters still produce a flow, already
/// in the error phase, so the UI has something to render.
pub async fn checkout_success(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<FlowResponse> {
    let flow = CheckoutFlow::from_query(
        &params,
        state.activator.clone(),
        state.notifier.clone(),
        state.flow_config,
    );
    let outcome = flow.begin();
    let snapshot = flow.snapshot();
    let flow_id = state.flows.insert(flow);

    tracing::info!(
        %flow_id,
        session_id = %snapshot.display_session_id,
        ?outcome,
        "checkout redirect landed"
    );

    Json(FlowResponse {
        flow_id,
        state: snapshot,
    })
}

/// Current presenter snapshot for a flow
pub async fn flow_state(
    State(state): State<AppState>,
    Path(flow_id): Path<Uuid>,
) -> Result<Json<FlowResponse>, HandlerError> {
    let flow = lookup_flow(&state, &flow_id)?;
    Ok(Json(FlowResponse {
        flow_id,
        state: flow.snapshot(),
    }))
}

/// Manual retry for a flow in the error phase
pub async fn flow_retry(
    State(state): State<AppState>,
    Path(flow_id): Path<Uuid>,
) -> Result<Json<RetryResponse>, HandlerError> {
    let flow = lookup_flow(&state, &flow_id)?;
    let outcome = flow.retry();
    tracing::info!(%flow_id, ?outcome, "manual retry requested");
    Ok(Json(RetryResponse {
        outcome,
        state: flow.snapshot(),
    }))
}

/// Post-success continue action: redirect into the application
pub async fn flow_continue(
    State(state): State<AppState>,
    Path(flow_id): Path<Uuid>,
) -> Result<Redirect, HandlerError> {
    let flow = lookup_flow(&state, &flow_id)?;
    if flow.snapshot().phase != Phase::Success {
        return Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "Activation has not completed".into(),
                code: "FLOW_NOT_COMPLETE".into(),
            }),
        ));
    }
    Ok(Redirect::to(&state.continue_url))
}

/// Tear down a flow instance
pub async fn flow_teardown(
    State(state): State<AppState>,
    Path(flow_id): Path<Uuid>,
) -> Result<StatusCode, HandlerError> {
    if state.flows.remove(&flow_id) {
        tracing::info!(%flow_id, "flow torn down");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(flow_not_found(&flow_id))
    }
}

/// Backend's record of a checkout session
pub async fn session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStatus>, HandlerError> {
    let backend = require_backend(&state)?;
    let status = backend.session_status(&session_id).await.map_err(|e| {
        tracing::error!("Session status query failed: {}", e);
        (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse {
                error: e.to_string(),
                code: "BACKEND_ERROR".into(),
            }),
        )
    })?;
    Ok(Json(status))
}

/// Subscription summary for the signed-in user
pub async fn subscription_info(
    State(state): State<AppState>,
) -> Result<Json<SubscriptionInfo>, HandlerError> {
    let backend = require_backend(&state)?;
    let info = backend.subscription_info().await.map_err(|e| {
        tracing::error!("Subscription query failed: {}", e);
        (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse {
                error: e.to_string(),
                code: "BACKEND_ERROR".into(),
            }),
        )
    })?;
    Ok(Json(info))
}

// ============================================================================
// Helpers
// ============================================================================

fn lookup_flow(state: &AppState, flow_id: &Uuid) -> Result<CheckoutFlow, HandlerError> {
    state.flows.get(flow_id).ok_or_else(|| flow_not_found(flow_id))
}

fn flow_not_found(flow_id: &Uuid) -> HandlerError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Unknown flow: {flow_id}"),
            code: "FLOW_NOT_FOUND".into(),
        }),
    )
}

fn require_backend(
    state: &AppState,
) -> Result<std::sync::Arc<checkout_client::BackendClient>, HandlerError> {
    state.backend.clone().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "Backend not configured".into(),
                code: "BACKEND_DISABLED".into(),
            }),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::response::IntoResponse;

    use checkout_client::MockActivator;
    use checkout_core::{FlowConfig, SubscriptionActivator, TracingNotifier};

    use crate::state::FlowRegistry;

    fn test_state(activator: Arc<dyn SubscriptionActivator>) -> AppState {
        AppState {
            flows: FlowRegistry::new(),
            activator,
            backend: None,
            notifier: Arc::new(TracingNotifier),
            continue_url: "/app/vault".into(),
            flow_config: FlowConfig::default(),
        }
    }

    fn redirect_params() -> HashMap<String, String> {
        let mut params = HashMap::new();
        params.insert("session_id".to_string(), "cs_test_a1b2c3".to_string());
        params.insert("plan".to_string(), "monthly".to_string());
        params
    }

    async fn wait_for_phase(flow: &CheckoutFlow, phase: Phase) -> FlowSnapshot {
        let mut rx = flow.subscribe();
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if snapshot.phase == phase {
                    return snapshot.clone();
                }
            }
            rx.changed().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_health_reports_mock_mode() {
        let state = test_state(Arc::new(MockActivator::new()));
        let Json(health) = health_check(State(state)).await;
        assert_eq!(health.status, "healthy");
        assert!(!health.backend_configured);
        assert!(health.backend_connected);
        assert_eq!(health.live_flows, 0);
    }

    #[tokio::test]
    async fn test_landing_creates_processing_flow() {
        let state = test_state(Arc::new(MockActivator::new()));
        let Json(response) =
            checkout_success(State(state.clone()), Query(redirect_params())).await;

        assert_eq!(response.state.phase, Phase::Processing);
        assert_eq!(response.state.display_session_id, "cs_test_a1b2c3");
        assert!(state.flows.get(&response.flow_id).is_some());
    }

    #[tokio::test]
    async fn test_landing_with_invalid_params_creates_error_flow() {
        let activator = Arc::new(MockActivator::new());
        let state = test_state(activator.clone());
        let mut params = HashMap::new();
        params.insert("session_id".to_string(), String::new());
        params.insert("plan".to_string(), "monthly".to_string());

        let Json(response) = checkout_success(State(state), Query(params)).await;
        assert_eq!(response.state.phase, Phase::Error);
        assert_eq!(response.state.display_session_id, "N/A");
        assert!(response.state.last_error_detail.is_some());
        assert_eq!(activator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_flow_state_unknown_id_is_404() {
        let state = test_state(Arc::new(MockActivator::new()));
        let err = flow_state(State(state), Path(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
        assert_eq!(err.1 .0.code, "FLOW_NOT_FOUND");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_continue_roundtrip() {
        // Two scripted failures exhaust the automatic retry, then a manual
        // retry succeeds and unlocks the continue redirect.
        let state = test_state(Arc::new(MockActivator::failing(2)));
        let Json(landing) =
            checkout_success(State(state.clone()), Query(redirect_params())).await;
        let flow = state.flows.get(&landing.flow_id).unwrap();

        wait_for_phase(&flow, Phase::Error).await;

        let early = flow_continue(State(state.clone()), Path(landing.flow_id))
            .await
            .unwrap_err();
        assert_eq!(early.0, StatusCode::CONFLICT);

        let Json(retry) = flow_retry(State(state.clone()), Path(landing.flow_id))
            .await
            .unwrap();
        assert_eq!(retry.outcome, BeginOutcome::Started);

        wait_for_phase(&flow, Phase::Success).await;

        let redirect = flow_continue(State(state), Path(landing.flow_id))
            .await
            .unwrap();
        let response = redirect.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(axum::http::header::LOCATION).unwrap(),
            "/app/vault"
        );
    }

    #[tokio::test]
    async fn test_teardown_removes_flow() {
        let state = test_state(Arc::new(MockActivator::new()));
        let Json(landing) =
            checkout_success(State(state.clone()), Query(redirect_params())).await;

        let status = flow_teardown(State(state.clone()), Path(landing.flow_id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let err = flow_teardown(State(state), Path(landing.flow_id))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_queries_without_backend_are_503() {
        let state = test_state(Arc::new(MockActivator::new()));
        let err = session_status(State(state.clone()), Path("cs_test_a1b2c3".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.1 .0.code, "BACKEND_DISABLED");

        let err = subscription_info(State(state)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_flow_response_wire_shape() {
        let state = test_state(Arc::new(MockActivator::new()));
        let Json(response) =
            checkout_success(State(state.clone()), Query(redirect_params())).await;

        let value = serde_json::to_value(&response).unwrap();
        assert!(value["flow_id"].is_string());
        assert_eq!(value["state"]["phase"], "processing");
        assert_eq!(value["state"]["auto_retry_consumed"], false);
    }
}
