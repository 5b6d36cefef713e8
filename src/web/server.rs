use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::RankEngine;
use crate::error::RankError;
use crate::metrics::render_metrics;
use crate::rank::{HostId, SeedClass};
use crate::session::{CrawlEvent, EventAck, SessionInfo};
use crate::trust::{ranked_reports, RankOrder, RankReport};

/// Web API server
/// 外部クローラーからのクロール結果受け口 + ランキング閲覧用API
pub struct WebServer {
    engine: Arc<RankEngine>,
    config: Arc<Config>,
}

#[derive(Clone)]
struct AppState {
    engine: Arc<RankEngine>,
}

#[derive(Deserialize)]
struct RanksQuery {
    limit: Option<usize>,
    order: Option<RankOrder>,
    seed: Option<SeedClass>,
}

#[derive(Deserialize)]
struct HostQuery {
    url: String,
}

#[derive(Deserialize)]
struct JournalQuery {
    host: Option<String>,
    limit: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenSession {
    seed_url: String,
    #[serde(default)]
    seed_kind: Option<SeedClass>,
    crawl_limit: Option<u32>,
}

/// Error body for the JSON API
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<RankError> for ApiError {
    fn from(e: RankError) -> Self {
        let status = match e {
            RankError::UnknownHost(_) | RankError::UnknownSession(_) => StatusCode::NOT_FOUND,
            RankError::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
            RankError::SessionClosed(_) => StatusCode::CONFLICT,
        };
        Self { status, message: e.to_string() }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

impl WebServer {
    pub fn new(engine: Arc<RankEngine>, config: Arc<Config>) -> Self {
        Self { engine, config }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        if !self.config.web.enabled {
            info!("Web API disabled");
            return Ok(());
        }

        let addr = format!("{}:{}", self.config.web.address, self.config.web.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("🌐 Web API listening on http://{}", addr);

        serve(listener, self.engine.clone()).await
    }
}

/// Serve the API on an already-bound listener
pub async fn serve(listener: tokio::net::TcpListener, engine: Arc<RankEngine>) -> anyhow::Result<()> {
    axum::serve(listener, router(engine)).await?;
    Ok(())
}

pub fn router(engine: Arc<RankEngine>) -> Router {
    let state = AppState { engine };

    Router::new()
        .route("/api/stats", get(api_stats))
        .route("/api/ranks", get(api_ranks))
        .route("/api/host", get(api_host))
        .route("/api/sessions", get(api_sessions).post(api_open_session))
        .route("/api/sessions/:id/events", post(api_session_event))
        .route("/api/journal", get(api_journal))
        .route("/api/snapshot", post(api_snapshot))
        .route("/metrics", get(api_metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Stats API
async fn api_stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.engine.get_stats())
}

/// Ranked hosts
async fn api_ranks(
    State(state): State<AppState>,
    Query(params): Query<RanksQuery>,
) -> Json<Vec<RankReport>> {
    let limit = params.limit.unwrap_or(100);
    let ranker = state.engine.sessions().ranker();
    let ranker = ranker.lock();
    Json(ranked_reports(
        ranker.store(),
        params.order.unwrap_or_default(),
        params.seed,
        limit,
    ))
}

/// One host. Looking a host up never creates its record.
async fn api_host(
    State(state): State<AppState>,
    Query(params): Query<HostQuery>,
) -> Result<Json<RankReport>, ApiError> {
    let host = HostId::from_url(&params.url)?;
    let ranker = state.engine.sessions().ranker();
    let ranker = ranker.lock();
    let store = ranker.store();
    let record = store
        .get(&host)
        .ok_or_else(|| RankError::UnknownHost(host.clone()))?;
    Ok(Json(RankReport::new(&host, record, store.config())))
}

async fn api_sessions(State(state): State<AppState>) -> Json<Vec<SessionInfo>> {
    Json(state.engine.sessions().list())
}

async fn api_open_session(
    State(state): State<AppState>,
    Json(body): Json<OpenSession>,
) -> Result<(StatusCode, Json<SessionInfo>), ApiError> {
    let sessions = state.engine.sessions();
    let id = sessions.open(&body.seed_url, body.seed_kind, body.crawl_limit)?;
    let info = sessions.get(id).ok_or(RankError::UnknownSession(id))?;
    Ok((StatusCode::CREATED, Json(info)))
}

/// Crawl event intake
async fn api_session_event(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(event): Json<CrawlEvent>,
) -> Result<Json<EventAck>, ApiError> {
    match state.engine.sessions().handle_event(id, event) {
        Ok(ack) => Ok(Json(ack)),
        Err(e) => {
            warn!("Rejected event for session {}: {}", id, e);
            Err(e.into())
        }
    }
}

/// Journal API with search
async fn api_journal(
    State(state): State<AppState>,
    Query(params): Query<JournalQuery>,
) -> Json<serde_json::Value> {
    let limit = params.limit.unwrap_or(100);
    let entries = state.engine.journal().search(params.host.as_deref(), limit);
    Json(serde_json::json!({
        "entries": entries,
        "stats": state.engine.journal().get_stats(),
    }))
}

/// Flush the snapshot now
async fn api_snapshot(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let hosts = state.engine.flush_snapshot().await?;
    Ok(Json(serde_json::json!({
        "saved": state.engine.config.snapshot.enabled,
        "hosts": hosts,
    })))
}

async fn api_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        render_metrics(&state.engine),
    )
}
