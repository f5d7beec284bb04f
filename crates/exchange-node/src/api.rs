//! HTTP API for the exchange.

use crate::engine::{
    CitizenView, IndexAdjustment, Market, Registration, StabilityOffer, StabilityReceipt,
    TribunalOutcome, TribunalRequest, VoteHistoryEntry, VoteReceipt, VoteRequest,
    DEFAULT_CITIZEN_EVENT_LIMIT, DEFAULT_EVENT_LIMIT, DEFAULT_HISTORY_LIMIT,
};
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use exchange_core::tribunal::{catalog, TribunalTypeInfo};
use exchange_core::vote::QuotaStatus;
use exchange_core::{Event, MarketError, SystemState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

type AppState = Arc<Market>;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Header naming the acting user.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Largest page any event listing returns.
pub const MAX_EVENT_LIMIT: usize = 200;

/// Build the API router.
pub fn build_router(market: AppState) -> Router {
    // CORS layer for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        // Players
        .route("/api/auth/register", post(register))
        // Votes
        .route("/api/votes", post(cast_vote))
        .route("/api/votes/quota/:target_citizen_id", get(vote_quota))
        .route("/api/votes/history", get(vote_history))
        // Citizens
        .route("/api/citizens/:id", get(get_citizen))
        .route(
            "/api/citizens/:id/stability",
            get(stability_quote).post(activate_stability),
        )
        .route("/api/citizens/:id/index", patch(adjust_index))
        // Events and tribunal
        .route("/api/events", get(recent_events))
        .route("/api/events/citizen/:id", get(citizen_events))
        .route("/api/events/tribunal/state", get(tribunal_state))
        .route("/api/events/tribunal", post(trigger_tribunal))
        .route("/api/events/tribunal/types", get(tribunal_types))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(market)
}

// --- Errors ---

/// A market error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub MarketError);

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl From<MarketError> for ApiError {
    fn from(e: MarketError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self(MarketError::invalid(e.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        let body = ErrorBody {
            error: self.0.to_string(),
            code: self.0.code(),
        };
        (status, Json(body)).into_response()
    }
}

/// HTTP status for each market error.
pub fn status_for(e: &MarketError) -> StatusCode {
    match e {
        MarketError::Unauthenticated => StatusCode::UNAUTHORIZED,
        MarketError::InvalidInput(_)
        | MarketError::InvalidDuration(_)
        | MarketError::SelfVoteForbidden
        | MarketError::AlreadyActive
        | MarketError::IndexTooLow => StatusCode::BAD_REQUEST,
        MarketError::NotFound(_) => StatusCode::NOT_FOUND,
        MarketError::MarketHalted => StatusCode::LOCKED,
        MarketError::AccountCooldown
        | MarketError::QuotaExceeded
        | MarketError::PerTargetLimitExceeded
        | MarketError::Cooldown
        | MarketError::DailyCapReached => StatusCode::TOO_MANY_REQUESTS,
        MarketError::StoreFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn actor(headers: &HeaderMap) -> Option<&str> {
    headers.get(ACTOR_HEADER).and_then(|v| v.to_str().ok())
}

#[derive(Debug, Default, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

impl LimitQuery {
    fn or(&self, default: usize) -> usize {
        self.limit.unwrap_or(default).min(MAX_EVENT_LIMIT)
    }
}

// --- Health ---

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "Dystopian Exchange running",
    })
}

// --- Players ---

#[derive(Debug, Default, Deserialize)]
struct RegisterRequest {
    alias: Option<String>,
}

/// The body is optional: an empty request registers with a generated alias.
async fn register(State(market): State<AppState>, body: Bytes) -> ApiResult<Registration> {
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        RegisterRequest::default()
    } else {
        serde_json::from_slice::<RegisterRequest>(&body)
            .map_err(|e| MarketError::invalid(format!("invalid body: {e}")))?
    };
    Ok(Json(market.register_citizen(req.alias.as_deref())?))
}

// --- Votes ---

async fn cast_vote(
    State(market): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> ApiResult<VoteReceipt> {
    // A halted market answers 423 before the body is looked at.
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) if !market.is_halted()? => return Err(rejection.into()),
        Err(_) => VoteRequest::default(),
    };
    Ok(Json(market.cast_vote(actor(&headers), &req)?))
}

async fn vote_quota(
    State(market): State<AppState>,
    headers: HeaderMap,
    Path(target_citizen_id): Path<String>,
) -> ApiResult<QuotaStatus> {
    Ok(Json(market.vote_quota(actor(&headers), &target_citizen_id)?))
}

#[derive(Debug, Serialize)]
struct VoteHistoryResponse {
    votes: Vec<VoteHistoryEntry>,
}

async fn vote_history(
    State(market): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> ApiResult<VoteHistoryResponse> {
    let limit = query.or(DEFAULT_HISTORY_LIMIT);
    let votes = market.vote_history(actor(&headers), limit)?;
    Ok(Json(VoteHistoryResponse { votes }))
}

// --- Citizens ---

async fn get_citizen(
    State(market): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<CitizenView> {
    Ok(Json(market.citizen(&id)?))
}

async fn stability_quote(
    State(market): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StabilityOffer> {
    Ok(Json(market.stability_quote(&id)?))
}

#[derive(Debug, Deserialize)]
struct StabilityRequest {
    minutes: u32,
}

async fn activate_stability(
    State(market): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StabilityRequest>, JsonRejection>,
) -> ApiResult<StabilityReceipt> {
    let Json(req) = payload?;
    Ok(Json(market.activate_stability(&id, req.minutes)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdjustIndexRequest {
    delta_percent: f64,
    #[serde(default)]
    reason: String,
}

async fn adjust_index(
    State(market): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AdjustIndexRequest>, JsonRejection>,
) -> ApiResult<IndexAdjustment> {
    let Json(req) = payload?;
    Ok(Json(market.adjust_index(&id, req.delta_percent, &req.reason)?))
}

// --- Events and tribunal ---

async fn recent_events(
    State(market): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<Event>> {
    Ok(Json(market.recent_events(query.or(DEFAULT_EVENT_LIMIT))?))
}

async fn citizen_events(
    State(market): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<Event>> {
    let limit = query.or(DEFAULT_CITIZEN_EVENT_LIMIT);
    Ok(Json(market.citizen_events(&id, limit)?))
}

async fn tribunal_state(State(market): State<AppState>) -> ApiResult<SystemState> {
    Ok(Json(market.tribunal_state()?))
}

async fn trigger_tribunal(
    State(market): State<AppState>,
    payload: Result<Json<TribunalRequest>, JsonRejection>,
) -> ApiResult<TribunalOutcome> {
    let Json(req) = payload?;
    Ok(Json(market.trigger_tribunal(&req)?))
}

async fn tribunal_types() -> Json<Vec<TribunalTypeInfo>> {
    Json(catalog())
}
