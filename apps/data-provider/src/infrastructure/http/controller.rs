//! HTTP Controller (Driver Adapter)
//!
//! Axum-based REST API that delegates to the session guardian, the broker
//! session and the bar aggregator.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;

use super::error::ApiError;
use super::request::{HistoricalRequest, ScannerRequest};
use super::response::{HealthResponse, PositionsResponse, ScannerResponse};
use crate::application::ports::{BrokerSession, SessionGate};
use crate::application::services::{BarAggregator, FetchResult};
use crate::domain::market::{Position, ScannerType};
use crate::infrastructure::metrics::{get_metrics_handle, record_http_request};

/// Service name reported by `/health`.
pub const SERVICE_NAME: &str = "data-provider";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Liveness gate for the broker session.
    pub gate: Arc<dyn SessionGate>,
    /// Broker session for direct reads.
    pub session: Arc<dyn BrokerSession>,
    /// Historical bar service.
    pub aggregator: Arc<BarAggregator>,
    /// Application version.
    pub version: String,
    /// Process start, for uptime.
    pub started_at: Instant,
}

impl AppState {
    /// Create handler state.
    #[must_use]
    pub fn new(
        gate: Arc<dyn SessionGate>,
        session: Arc<dyn BrokerSession>,
        aggregator: Arc<BarAggregator>,
        version: String,
    ) -> Self {
        Self {
            gate,
            session,
            aggregator,
            version,
            started_at: Instant::now(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("version", &self.version)
            .field("aggregator", &self.aggregator)
            .finish_non_exhaustive()
    }
}

/// Create the HTTP router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
        .route("/metrics", get(metrics))
        .route("/api/positions", get(get_positions))
        .route("/api/historical", post(get_historical))
        .route("/api/scanner", post(get_scanner))
        .route_layer(middleware::from_fn(track_requests))
        .with_state(state)
}

// =============================================================================
// API Handlers
// =============================================================================

async fn get_positions(
    State(state): State<AppState>,
) -> Result<Json<PositionsResponse>, ApiError> {
    if !state.gate.ensure_live().await {
        return Err(ApiError::Unavailable);
    }

    let positions = state
        .session
        .list_positions()
        .await
        .map_err(|e| ApiError::Internal(format!("failed to fetch positions: {e}")))?;

    tracing::info!(count = positions.len(), "Served positions");
    Ok(Json(PositionsResponse {
        positions: positions.into_iter().map(Position::from).collect(),
        timestamp: Utc::now(),
    }))
}

async fn get_historical(
    State(state): State<AppState>,
    Json(request): Json<HistoricalRequest>,
) -> Result<Json<FetchResult>, ApiError> {
    if request.start_date > request.end_date {
        return Err(ApiError::BadRequest(format!(
            "start_date {} is after end_date {}",
            request.start_date, request.end_date
        )));
    }

    let bars = state
        .aggregator
        .fetch(&request.symbols, request.start_date, request.end_date)
        .await?;
    Ok(Json(bars))
}

async fn get_scanner(
    State(state): State<AppState>,
    Json(request): Json<ScannerRequest>,
) -> Result<Json<ScannerResponse>, ApiError> {
    let scanner_type = ScannerType::parse(&request.scanner_type).ok_or_else(|| {
        ApiError::BadRequest(format!("unknown scanner type: {}", request.scanner_type))
    })?;

    if !state.gate.ensure_live().await {
        return Err(ApiError::Unavailable);
    }

    let data = state
        .session
        .scanners(scanner_type, request.date, request.count, request.ascending)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to fetch scanner data: {e}")))?;

    tracing::info!(%scanner_type, rows = data.len(), "Served scanner");
    Ok(Json(ScannerResponse {
        data,
        timestamp: Utc::now(),
    }))
}

// =============================================================================
// Health Handlers
// =============================================================================

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        last_login_time: state.gate.last_login_time(),
    })
}

async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if state.gate.last_login_time().is_some() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

// =============================================================================
// Middleware
// =============================================================================

async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path().to_string(), |p| p.as_str().to_string());

    let response = next.run(request).await;
    record_http_request(&route, response.status().as_u16());
    response
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use chrono::{DateTime, FixedOffset, NaiveDate};
    use tower::ServiceExt;

    use super::*;
    use crate::application::ports::{
        BrokerError, BrokerPosition, KbarCallback, SessionUsage, TickSource,
    };
    use crate::domain::bars::RawTick;
    use crate::domain::market::ScannerItem;

    struct StubGate {
        live: bool,
        last_login: Option<DateTime<Utc>>,
    }

    #[async_trait]
    impl SessionGate for StubGate {
        async fn ensure_live(&self) -> bool {
            self.live
        }

        fn last_login_time(&self) -> Option<DateTime<Utc>> {
            self.last_login
        }
    }

    struct EmptySession;

    #[async_trait]
    impl BrokerSession for EmptySession {
        async fn login(&self, _: &str, _: &str) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn activate_ca(&self, _: &Path, _: &str) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn usage(&self) -> Result<SessionUsage, BrokerError> {
            Ok(SessionUsage::default())
        }

        async fn list_positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
            Ok(Vec::new())
        }

        async fn kbars(
            &self,
            _: &str,
            _: NaiveDate,
            _: NaiveDate,
            _: Duration,
            _: KbarCallback,
        ) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn scanners(
            &self,
            _: ScannerType,
            _: NaiveDate,
            _: u32,
            _: bool,
        ) -> Result<Vec<ScannerItem>, BrokerError> {
            Ok(Vec::new())
        }
    }

    struct NoTicks;

    #[async_trait]
    impl TickSource for NoTicks {
        async fn fetch_ticks(&self, _: &str, _: NaiveDate, _: NaiveDate) -> Vec<RawTick> {
            Vec::new()
        }
    }

    fn create_test_state(live: bool, last_login: Option<DateTime<Utc>>) -> AppState {
        let gate: Arc<dyn SessionGate> = Arc::new(StubGate { live, last_login });
        let aggregator = BarAggregator::new(
            Arc::clone(&gate),
            Arc::new(NoTicks),
            FixedOffset::east_opt(0).unwrap(),
        );
        AppState::new(
            gate,
            Arc::new(EmptySession),
            Arc::new(aggregator),
            "0.1.0".to_string(),
        )
    }

    async fn get(app: Router, uri: &str) -> Response {
        app.oneshot(HttpRequest::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn liveness_returns_ok() {
        let response = get(create_router(create_test_state(true, None)), "/healthz").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn readiness_requires_a_login() {
        let response = get(create_router(create_test_state(true, None)), "/readyz").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = get(
            create_router(create_test_state(true, Some(Utc::now()))),
            "/readyz",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "READY");
    }

    #[tokio::test]
    async fn health_reports_service_and_login_time() {
        let at = Utc::now();
        let response = get(create_router(create_test_state(false, Some(at))), "/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        let health: HealthResponse = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.service, "data-provider");
        assert_eq!(health.version, "0.1.0");
        assert_eq!(health.last_login_time, Some(at));
    }

    #[tokio::test]
    async fn positions_unavailable_when_session_dead() {
        let response = get(
            create_router(create_test_state(false, None)),
            "/api/positions",
        )
        .await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_text(response).await.contains("detail"));
    }

    #[tokio::test]
    async fn historical_rejects_inverted_range() {
        let body = serde_json::json!({
            "symbols": ["2330"],
            "start_date": "2024-01-05",
            "end_date": "2024-01-02"
        });

        let response = create_router(create_test_state(true, None))
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/api/historical")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let response = get(create_router(create_test_state(true, None)), "/api/orders").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
