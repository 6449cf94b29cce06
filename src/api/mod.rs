//! HTTP surface for catalog imports.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;
use crate::domain::aggregates::ImportRun;
use crate::domain::events::{self, DomainEvent};
use crate::import::{DuplicatePolicy, ImportDriver};
use crate::{ImportError, ImportReport, StoreError};

#[derive(Clone)]
pub struct AppState {
    pub driver: ImportDriver,
    pub nats: Option<async_nats::Client>,
}

impl AppState {
    async fn publish(&self, events: Vec<DomainEvent>) {
        if let Some(client) = &self.nats {
            events::publish(client, events).await;
        }
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "o2-nutrition-catalog"})) }))
        .route("/api/v1/imports", get(list_imports).post(upload_import))
        .route("/api/v1/imports/:id", get(get_import))
        .route("/api/v1/imports/:id/process", post(process_import))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Error response; the body is always an [`ImportReport`] with `success: false`.
#[derive(Debug)]
pub struct ApiError(StatusCode, String);

impl From<ImportError> for ApiError {
    fn from(e: ImportError) -> Self {
        let status = match &e {
            ImportError::RunNotFound(_) => StatusCode::NOT_FOUND,
            ImportError::InvalidTransition { .. } => StatusCode::CONFLICT,
            ImportError::UploadUnavailable { .. } | ImportError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self(status, e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self { ImportError::from(e).into() }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ImportReport::failure(self.1))).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadParams { pub file_name: Option<String> }

async fn upload_import(State(s): State<AppState>, Query(p): Query<UploadParams>, body: Bytes) -> Result<(StatusCode, Json<ImportRun>), ApiError> {
    if body.is_empty() {
        return Err(ApiError(StatusCode::BAD_REQUEST, "Uploaded file is empty".to_string()));
    }
    let file_name = p.file_name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| "upload.csv".to_string());
    let mut run = s.driver.submit(&file_name, &body).await?;
    s.publish(run.take_events()).await;
    Ok((StatusCode::CREATED, Json(run)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams { pub limit: Option<i64> }

async fn list_imports(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<Vec<ImportRun>>, ApiError> {
    let limit = p.limit.unwrap_or(50).clamp(1, 200);
    Ok(Json(s.driver.runs().list(limit).await?))
}

async fn get_import(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ImportRun>, ApiError> {
    Ok(Json(s.driver.load(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ProcessParams { pub policy: Option<DuplicatePolicy> }

async fn process_import(State(s): State<AppState>, Path(id): Path<Uuid>, Query(p): Query<ProcessParams>) -> Result<Json<ImportReport>, ApiError> {
    let mut run = s.driver.load(id).await?;
    let policy = p.policy.unwrap_or(s.driver.options().policy);
    let result = s.driver.process_with(&mut run, policy).await;
    s.publish(run.take_events()).await;
    Ok(Json(ImportReport::from_summary(&result?)))
}
