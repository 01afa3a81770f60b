use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::metrics::RuntimeMetrics;
use crate::state::AgentState;

#[derive(Clone)]
struct HealthState {
    agent: Arc<str>,
    state: watch::Receiver<AgentState>,
    metrics: RuntimeMetrics,
}

/// `GET /api/health` and `GET /metrics` for one agent
///
/// Health is 503 once the agent is shutting down or has crashed. Inbound
/// routes of HTTP-facing agents are merged onto this router.
pub fn router(agent: &str, state: watch::Receiver<AgentState>, metrics: RuntimeMetrics) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .with_state(HealthState {
            agent: Arc::from(agent),
            state,
            metrics,
        })
}

async fn health(State(ctx): State<HealthState>) -> impl IntoResponse {
    let state = *ctx.state.borrow();
    let (code, status) = if state.is_terminal() {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    } else {
        (StatusCode::OK, "healthy")
    };

    (
        code,
        Json(serde_json::json!({
            "status": status,
            "agent": &*ctx.agent,
            "state": state,
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

async fn metrics_endpoint(State(ctx): State<HealthState>) -> impl IntoResponse {
    match ctx.metrics.render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// Serve `app` on `0.0.0.0:port` with CORS and request tracing
pub async fn serve(app: Router, port: u16) -> std::io::Result<()> {
    let app = app.layer(TraceLayer::new_for_http()).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP listening");
    axum::serve(listener, app).await
}
