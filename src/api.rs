//! HTTP API exposing the aggregated snapshot
//!
//! Serves the latest refresh result per stage and lets a client trigger a new
//! cycle or look up a single block.

use axum::{
    extract::{Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::aggregator::{Aggregator, RefreshRequest, Snapshot, StageError, StageOutcome};
use crate::error::{ErrorKind, ExplorerError};
use crate::fetcher::Endpoint;
use crate::types::ChainHeight;

/// Shared handler state
pub struct ApiState {
    pub aggregator: Aggregator,
    /// Endpoints used when a refresh request does not name its own.
    pub defaults: RefreshRequest,
}

impl ApiState {
    pub fn new(aggregator: Aggregator, defaults: RefreshRequest) -> Self {
        Self {
            aggregator,
            defaults,
        }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    InvalidInput(String),
    NotFound(String),
    StageFailed(StageError),
    Superseded,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, kind) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::StageFailed(error) => {
                let status = if error.kind == ErrorKind::NotFound {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::BAD_GATEWAY
                };
                (status, error.message, Some(error.kind))
            }
            ApiError::Superseded => (
                StatusCode::CONFLICT,
                ExplorerError::Cancelled.to_string(),
                Some(ErrorKind::Cancelled),
            ),
        };

        (status, Json(ErrorResponse { error: message, kind })).into_response()
    }
}

impl From<ExplorerError> for ApiError {
    fn from(err: ExplorerError) -> Self {
        match err {
            ExplorerError::Cancelled => ApiError::Superseded,
            ExplorerError::InvalidEndpoint { .. } | ExplorerError::InvalidHeight(_) => {
                ApiError::InvalidInput(err.to_string())
            }
            other => ApiError::StageFailed(StageError::from(&other)),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct RefreshBody {
    pub rpc_url: Option<String>,
    pub rest_url: Option<String>,
    pub height: Option<String>,
}

impl RefreshBody {
    fn into_request(self, defaults: &RefreshRequest) -> Result<RefreshRequest, ExplorerError> {
        let rpc = match self.rpc_url {
            Some(url) => Endpoint::parse(&url)?,
            None => defaults.rpc.clone(),
        };
        let rest = match self.rest_url {
            Some(url) => Endpoint::parse(&url)?,
            None => defaults.rest.clone(),
        };
        let height = self
            .height
            .filter(|h| !h.trim().is_empty())
            .map(|h| ChainHeight::parse(&h))
            .transpose()?;
        Ok(RefreshRequest::new(rpc, rest).with_height(height))
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

async fn current_snapshot(state: &ApiState) -> Result<Arc<Snapshot>, ApiError> {
    state
        .aggregator
        .snapshot()
        .await
        .ok_or_else(|| ApiError::NotFound("No refresh has completed yet".to_string()))
}

fn stage_response<T: Serialize>(stage: &StageOutcome<T>) -> Result<Response, ApiError> {
    match stage {
        StageOutcome::Ready { value } => Ok(Json(value).into_response()),
        StageOutcome::Failed { error } => Err(ApiError::StageFailed(error.clone())),
        StageOutcome::Skipped { reason } => Err(ApiError::NotFound(reason.clone())),
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status, duration and the published cycle.
async fn logging_middleware(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let cycle = state
        .aggregator
        .snapshot()
        .await
        .map_or(0, |snapshot| snapshot.cycle);

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        cycle = %cycle,
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints
pub fn build_api_router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(true);

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/snapshot", get(get_snapshot))
        .route("/refresh", post(refresh))
        .route("/height", get(get_height))
        .route("/block", get(get_block))
        .route("/block/:height", get(lookup_block))
        .route("/transactions", get(get_transactions))
        .route("/accounts", get(get_accounts))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            logging_middleware,
        ))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(cors)
}

pub async fn run_api_server(state: Arc<ApiState>, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_api_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "api.listening");

    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn health_check(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let cycle = state.aggregator.snapshot().await.map(|s| s.cycle);
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "last_cycle": cycle,
    }))
}

async fn get_snapshot(State(state): State<Arc<ApiState>>) -> Result<Json<Snapshot>, ApiError> {
    let snapshot = current_snapshot(&state).await?;
    Ok(Json(snapshot.as_ref().clone()))
}

async fn refresh(
    State(state): State<Arc<ApiState>>,
    body: Option<Json<RefreshBody>>,
) -> Result<Json<Snapshot>, ApiError> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    let request = body.into_request(&state.defaults)?;
    let snapshot = state.aggregator.refresh(request).await?;
    Ok(Json(snapshot.as_ref().clone()))
}

async fn get_height(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    stage_response(&current_snapshot(&state).await?.height)
}

async fn get_block(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    stage_response(&current_snapshot(&state).await?.block)
}

async fn get_transactions(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    stage_response(&current_snapshot(&state).await?.transactions)
}

async fn get_accounts(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    stage_response(&current_snapshot(&state).await?.accounts)
}

/// `latest` asks the node for its newest block.
async fn lookup_block(
    State(state): State<Arc<ApiState>>,
    Path(height): Path<String>,
) -> Result<Response, ApiError> {
    let height = match height.as_str() {
        "latest" => None,
        raw => Some(ChainHeight::parse(raw)?),
    };

    let rpc = match state.aggregator.snapshot().await {
        Some(snapshot) => Endpoint::parse(&snapshot.rpc_url)?,
        None => state.defaults.rpc.clone(),
    };

    let snapshot = state.aggregator.lookup_block(&rpc, height).await?;
    stage_response(&snapshot.block)
}
