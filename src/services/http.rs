//! HTTP surface for operators
//!
//! Serves the aggregated discovery stats, Prometheus metrics and probe
//! endpoints. The orchestrator embeds this router into its own server; the
//! library does not bind a listener itself.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::{ConferenceServices, DiscoveryStats};
use crate::metrics;
use crate::registry::Subsystem;

// ============================================================================
// App State
// ============================================================================

/// Shared state for the discovery HTTP surface
#[derive(Clone)]
pub struct AppState {
    /// The discovery facade
    pub services: Arc<ConferenceServices>,

    /// Router start time
    pub start_time: Instant,
}

impl AppState {
    /// Create state around a facade
    pub fn new(services: Arc<ConferenceServices>) -> Self {
        Self {
            services,
            start_time: Instant::now(),
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Liveness probe response
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub version: &'static str,
}

/// Readiness probe response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub watched_pools: Vec<Subsystem>,
}

// ============================================================================
// Router
// ============================================================================

/// Build the discovery router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(liveness_probe))
        .route("/health/ready", get(readiness_probe))
        .route("/stats", get(stats_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Handlers
// ============================================================================

/// Liveness probe handler
///
/// Succeeds whenever the process is running.
async fn liveness_probe(State(state): State<AppState>) -> (StatusCode, Json<LivenessResponse>) {
    (
        StatusCode::OK,
        Json(LivenessResponse {
            status: "healthy",
            uptime_secs: state.start_time.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Readiness probe handler
///
/// Ready once discovery is started; reports which pools are watched.
async fn readiness_probe(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let ready = state.services.is_started();
    let watched_pools = if ready {
        state.services.config().enabled_subsystems()
    } else {
        Vec::new()
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ReadinessResponse { ready, watched_pools }))
}

/// Aggregated discovery stats
async fn stats_handler(State(state): State<AppState>) -> Json<DiscoveryStats> {
    Json(state.services.stats().await)
}

/// Prometheus text exposition
async fn metrics_handler() -> impl IntoResponse {
    match metrics::render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            tracing::error!("Failed to render metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryConfig;
    use crate::presence::LocalPresenceSource;

    fn state_with_bridge_pool() -> AppState {
        let config = DiscoveryConfig::builder()
            .bridge("bridges@conference.example")
            .build()
            .unwrap();
        let facade = ConferenceServices::new(
            config,
            Arc::new(LocalPresenceSource::new()),
            Arc::new(LocalPresenceSource::new()),
        )
        .unwrap();
        AppState::new(Arc::new(facade))
    }

    #[tokio::test]
    async fn test_liveness_always_ok() {
        let state = state_with_bridge_pool();
        let (status, body) = liveness_probe(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "healthy");
    }

    #[tokio::test]
    async fn test_readiness_follows_lifecycle() {
        let state = state_with_bridge_pool();

        let (status, body) = readiness_probe(State(state.clone())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!body.ready);

        state.services.start().await.unwrap();
        let (status, body) = readiness_probe(State(state.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.watched_pools, vec![Subsystem::Bridge]);

        state.services.stop().await;
        let (status, _) = readiness_probe(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_stats_handler_serializes_active_pools() {
        let state = state_with_bridge_pool();
        state.services.start().await.unwrap();

        let Json(stats) = stats_handler(State(state.clone())).await;
        assert!(stats.bridge_selector.is_some());
        assert!(stats.gateway_detector.is_none());

        state.services.stop().await;
    }

    #[test]
    fn test_router_builds() {
        let config = DiscoveryConfig::default();
        let facade = ConferenceServices::new(
            config,
            Arc::new(LocalPresenceSource::new()),
            Arc::new(LocalPresenceSource::new()),
        )
        .unwrap();

        let _router = create_router(AppState::new(Arc::new(facade)));
    }
}
