//! checkout-flow HTTP Server
//!
//! Axum host for the premium checkout success flow: receives the hosted
//! checkout redirect, drives activation against the subscription backend,
//! and exposes flow state to the UI.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout_client::{BackendClient, MockActivator};
use checkout_core::{FlowConfig, SubscriptionActivator, TracingNotifier};

use crate::handlers::{
    checkout_success, flow_continue, flow_retry, flow_state, flow_teardown, health_check,
    session_status, subscription_info,
};
use crate::state::{AppState, FlowRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // Wire the activation backend; fall back to the mock when unconfigured
    let backend = BackendClient::from_env().ok().map(Arc::new);
    let activator: Arc<dyn SubscriptionActivator> = match &backend {
        Some(client) => {
            if client.health_check().await {
                tracing::info!("✓ Connected to subscription backend");
            } else {
                tracing::warn!("⚠ Subscription backend not reachable - activations will fail");
                tracing::warn!("  Check BACKEND_URL and that the backend is running");
            }
            client.clone()
        }
        None => {
            tracing::warn!("⚠ BACKEND_URL not set - running in demo mode with the mock activator");
            Arc::new(MockActivator::new())
        }
    };

    let continue_url = std::env::var("CONTINUE_URL").unwrap_or_else(|_| "/app/vault".into());

    // Build application state
    let state = AppState {
        flows: FlowRegistry::new(),
        activator,
        backend,
        notifier: Arc::new(TracingNotifier),
        continue_url,
        flow_config: FlowConfig::default(),
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        // Health & info
        .route("/health", get(health_check))
        // Hosted-checkout redirect landing
        .route("/checkout/success", get(checkout_success))
        // Flow lifecycle
        .route(
            "/api/checkout/flows/{flow_id}",
            get(flow_state).delete(flow_teardown),
        )
        .route("/api/checkout/flows/{flow_id}/retry", post(flow_retry))
        .route("/api/checkout/flows/{flow_id}/continue", get(flow_continue))
        // Backend queries
        .route("/api/checkout/sessions/{session_id}", get(session_status))
        .route("/api/subscription", get(subscription_info))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 checkout-flow server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health                               - Health check");
    tracing::info!("  GET    /checkout/success?session_id=&plan=   - Redirect landing");
    tracing::info!("  GET    /api/checkout/flows/{{id}}              - Flow snapshot");
    tracing::info!("  POST   /api/checkout/flows/{{id}}/retry        - Manual retry");
    tracing::info!("  GET    /api/checkout/flows/{{id}}/continue     - Continue after success");
    tracing::info!("  DELETE /api/checkout/flows/{{id}}              - Tear down flow");
    tracing::info!("  GET    /api/checkout/sessions/{{id}}           - Session status");
    tracing::info!("  GET    /api/subscription                     - Subscription summary");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
