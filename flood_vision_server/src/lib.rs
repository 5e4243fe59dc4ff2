use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use flood_vision::core_modules::grounding::{FactSheet, FactStore};
use flood_vision::core_modules::mask_renderer::PNG_CONTENT_TYPE;
use flood_vision::core_modules::overlay_store::{DirOverlayStore, MemoryOverlayStore, OverlayStore};
use flood_vision::core_modules::raster_loader::{HttpImagerySource, ImagerySource};
use flood_vision::pipeline::{AnalysisReport, AnalysisRequest, ClaimSummary, DamageGate, ExecutionMode};
use flood_vision::DamageError;
use serde::{Deserialize, Serialize};

pub mod config;

pub use config::ServerConfig;

/// Maps engine errors onto HTTP status codes.
#[derive(Debug)]
pub struct ApiError(pub DamageError);

impl From<DamageError> for ApiError {
    fn from(e: DamageError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DamageError::NoEstimateYet(_) | DamageError::OverlayNotFound(_) => StatusCode::NOT_FOUND,
            e if e.is_caller_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("Request failed: {}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub mode: ExecutionMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayoutQuery {
    pub area: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutAnswer {
    pub claim_id: String,
    pub requested_area: f64,
    pub damaged_area: f64,
    pub unit_value: f64,
    pub payout: f64,
    pub as_of: DateTime<Utc>,
}

pub async fn health<S: ImagerySource + 'static>(State(gate): State<Arc<DamageGate<S>>>) -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        mode: gate.mode(),
    })
}

pub async fn analyze<S: ImagerySource + 'static>(
    State(gate): State<Arc<DamageGate<S>>>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<AnalysisReport>, ApiError> {
    Ok(Json(gate.analyze(&request).await?))
}

pub async fn claim_facts<S: ImagerySource + 'static>(
    State(gate): State<Arc<DamageGate<S>>>,
    Path(claim_id): Path<String>,
) -> Result<Json<FactSheet>, ApiError> {
    Ok(Json(gate.facts().current_facts(&claim_id)?))
}

pub async fn claim_history<S: ImagerySource + 'static>(
    State(gate): State<Arc<DamageGate<S>>>,
    Path(claim_id): Path<String>,
) -> Result<Json<Vec<FactSheet>>, ApiError> {
    Ok(Json(gate.facts().history(&claim_id)?))
}

pub async fn claim_summary<S: ImagerySource + 'static>(
    State(gate): State<Arc<DamageGate<S>>>,
    Path(claim_id): Path<String>,
) -> Result<Json<ClaimSummary>, ApiError> {
    Ok(Json(gate.facts().claim_summary(&claim_id)?))
}

pub async fn claim_payout<S: ImagerySource + 'static>(
    State(gate): State<Arc<DamageGate<S>>>,
    Path(claim_id): Path<String>,
    Query(query): Query<PayoutQuery>,
) -> Result<Json<PayoutAnswer>, ApiError> {
    let facts = gate.facts().current_facts(&claim_id)?;
    let payout = facts.payout_for_area(query.area)?;
    Ok(Json(PayoutAnswer {
        claim_id,
        requested_area: query.area,
        damaged_area: facts.damaged_area,
        unit_value: facts.unit_value,
        payout,
        as_of: facts.as_of,
    }))
}

pub async fn overlay<S: ImagerySource + 'static>(
    State(gate): State<Arc<DamageGate<S>>>,
    Path(reference): Path<String>,
) -> Result<Response, ApiError> {
    let png = gate.overlays().get(&reference)?;
    Ok(([(header::CONTENT_TYPE, PNG_CONTENT_TYPE)], Bytes::from(png)).into_response())
}

pub fn router<S: ImagerySource + 'static>(gate: Arc<DamageGate<S>>) -> Router {
    Router::new()
        .route("/", get(health::<S>))
        .route("/healthz", get(health::<S>))
        .route("/api/analyze", post(analyze::<S>))
        .route("/api/claims/:claim_id/facts", get(claim_facts::<S>))
        .route("/api/claims/:claim_id/history", get(claim_history::<S>))
        .route("/api/claims/:claim_id/summary", get(claim_summary::<S>))
        .route("/api/claims/:claim_id/payout", get(claim_payout::<S>))
        .route("/api/overlays/:reference", get(overlay::<S>))
        .with_state(gate)
}

/// Builds the gate described by `cfg`, binds its address and serves it on a background task.
pub async fn start_server(cfg: ServerConfig) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let overlays: Arc<dyn OverlayStore> = match &cfg.overlay_dir {
        Some(dir) => Arc::new(DirOverlayStore::new(dir)?),
        None => Arc::new(MemoryOverlayStore::new()),
    };
    let source = HttpImagerySource::new(cfg.imagery.clone());
    let gate = DamageGate::new(cfg.analysis, source, overlays, Arc::new(FactStore::new()))?;
    let app = router(Arc::new(gate));

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    log::info!(
        "Flood damage server listening on http://{} (mode={}, overlays={})",
        cfg.bind_addr,
        cfg.analysis.mode,
        cfg.overlay_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "memory".into()),
    );
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::error!("Server stopped: {e}");
        }
    });
    Ok(server)
}
