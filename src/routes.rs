use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{collections::HashMap, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::{
    backend::{BackendError, GenerationService, HttpBackend},
    config::ConsoleConfig,
    export::{all_scripts_text, script_filename, script_text, seo_csv},
    listing::{CollectionListing, ListingCache, ListingRefresher},
    models::{ContentKind, ImagesReport, OverlayPosition, RegenerationTarget, ScriptsReport, SeoReport, TargetCollection, DEFAULT_FONT_SIZE},
    templates::{upload_batch, BatchReport, LibraryView, TemplateCategory, UploadFile},
    workflow::{RegenerationWorkflow, WorkflowError, WorkflowView},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConsoleConfig>,
    pub backend: Arc<HttpBackend>,
    pub listing: Arc<ListingCache>,
    pub workflows: Arc<RwLock<HashMap<Uuid, RegenerationWorkflow>>>,
}

impl AppState {
    pub fn new(config: ConsoleConfig) -> Result<Self, BackendError> {
        let backend = Arc::new(HttpBackend::new(&config)?);
        Ok(Self {
            config: Arc::new(config),
            listing: Arc::new(ListingCache::new(Arc::clone(&backend))),
            backend,
            workflows: Arc::default(),
        })
    }

    fn workflow(&self, id: Uuid) -> Result<RegenerationWorkflow, ApiError> {
        self.workflows.read().get(&id).cloned().ok_or(ApiError::NotFound)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/workflows", post(open_workflow))
        .route("/api/workflows/:id", get(get_workflow).delete(cancel_workflow))
        .route("/api/workflows/:id/prompt", put(set_prompt))
        .route("/api/workflows/:id/overlays", post(add_overlay))
        .route("/api/workflows/:id/overlays/:index", delete(remove_overlay))
        .route("/api/workflows/:id/submit", post(submit_workflow))
        .route("/api/listing/:collection", get(get_listing))
        .route("/api/listing/:collection/targets", get(get_targets))
        .route("/api/templates", get(list_templates))
        .route("/api/templates/upload", post(upload_templates))
        .route("/api/templates/:filename", delete(delete_template))
        .route("/api/export/seo", get(export_seo_csv))
        .route("/api/export/scripts", get(export_all_scripts))
        .route("/api/export/scripts/:slot_id", get(export_script))
        .route("/api/export/images", get(export_images_report))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    NotFound,
    BadRequest(String),
    Workflow(WorkflowError),
    Backend(BackendError),
}

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self { ApiError::Workflow(e) }
}

impl From<BackendError> for ApiError {
    fn from(e: BackendError) -> Self { ApiError::Backend(e) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::Workflow(e) if e.is_validation() => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Workflow(e) => (StatusCode::CONFLICT, e.to_string()),
            ApiError::Backend(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct OpenedWorkflow {
    pub id: Uuid,
    pub view: WorkflowView,
}

#[derive(Debug, Deserialize)]
pub struct PromptBody {
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct OverlayBody {
    pub text: String,
    #[serde(default)]
    pub position: OverlayPosition,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
}

fn default_font_size() -> u32 { DEFAULT_FONT_SIZE }

#[derive(Debug, Serialize)]
pub struct OverlayAdded {
    pub added: bool,
    pub view: WorkflowView,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "timestamp": Utc::now().to_rfc3339() }))
}

pub async fn open_workflow(
    State(state): State<AppState>,
    Json(target): Json<RegenerationTarget>,
) -> Result<Json<OpenedWorkflow>, ApiError> {
    let service: Arc<dyn GenerationService> = state.backend.clone();
    let refresher: Arc<dyn ListingRefresher> = state.listing.clone();
    let workflow = RegenerationWorkflow::open(target, service, refresher, state.config.reconciliation)?;
    let id = Uuid::new_v4();
    let view = workflow.view();

    let mut guard = state.workflows.write();
    // Reconciled or cancelled workflows are dropped lazily.
    guard.retain(|_, wf| wf.is_open());
    guard.insert(id, workflow);
    tracing::info!(%id, open = guard.len(), "Registered workflow");
    Ok(Json(OpenedWorkflow { id, view }))
}

/// Returns the view; a closed workflow is reported once and then forgotten.
pub async fn get_workflow(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<WorkflowView>, ApiError> {
    let view = state.workflow(id)?.view();
    if !view.open {
        state.workflows.write().remove(&id);
    }
    Ok(Json(view))
}

pub async fn set_prompt(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<PromptBody>,
) -> Result<Json<WorkflowView>, ApiError> {
    let workflow = state.workflow(id)?;
    workflow.set_prompt(body.prompt)?;
    Ok(Json(workflow.view()))
}

pub async fn add_overlay(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<OverlayBody>,
) -> Result<Json<OverlayAdded>, ApiError> {
    let workflow = state.workflow(id)?;
    let added = workflow.add_overlay(&body.text, body.position, body.font_size)?;
    Ok(Json(OverlayAdded { added, view: workflow.view() }))
}

pub async fn remove_overlay(
    Path((id, index)): Path<(Uuid, usize)>,
    State(state): State<AppState>,
) -> Result<Json<WorkflowView>, ApiError> {
    let workflow = state.workflow(id)?;
    workflow.remove_overlay(index)?;
    Ok(Json(workflow.view()))
}

pub async fn submit_workflow(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<WorkflowView>, ApiError> {
    // Clone out of the registry so the lock is not held across the backend call.
    let workflow = state.workflow(id)?;
    workflow.submit().await?;
    Ok(Json(workflow.view()))
}

pub async fn cancel_workflow(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    let workflow = state.workflow(id)?;
    workflow.cancel()?;
    state.workflows.write().remove(&id);
    Ok(StatusCode::NO_CONTENT)
}

fn parse_collection(raw: &str) -> Result<TargetCollection, ApiError> {
    raw.parse().map_err(ApiError::BadRequest)
}

pub async fn get_listing(Path(collection): Path<String>, State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let collection = parse_collection(&collection)?;
    let listing: Option<CollectionListing> = state.listing.latest(collection).await?;
    Ok(Json(json!({ "collection": collection, "data": listing })))
}

pub async fn get_targets(
    Path(collection): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<RegenerationTarget>>, ApiError> {
    let collection = parse_collection(&collection)?;
    state.listing.latest(collection).await?;
    Ok(Json(state.listing.targets(collection)))
}

fn attachment(content_type: &'static str, filename: &str, body: String) -> Response {
    let mut headers = axum::http::HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    (StatusCode::OK, headers, body).into_response()
}

pub async fn export_seo_csv(State(state): State<AppState>) -> Result<Response, ApiError> {
    let report = state.backend.fetch_content::<SeoReport>(ContentKind::Seo).await?.ok_or(ApiError::NotFound)?;
    tracing::info!(rows = report.optimizations.len(), "📄 Exporting SEO optimizations");
    Ok(attachment("text/csv; charset=utf-8", "seo_optimizations.csv", seo_csv(&report)))
}

pub async fn export_all_scripts(State(state): State<AppState>) -> Result<Response, ApiError> {
    let report = state.backend.fetch_content::<ScriptsReport>(ContentKind::Scripts).await?.ok_or(ApiError::NotFound)?;
    tracing::info!(scripts = report.scripts.len(), "📄 Exporting all scripts");
    Ok(attachment("text/plain; charset=utf-8", "all_scripts.txt", all_scripts_text(&report.scripts)))
}

pub async fn export_images_report(State(state): State<AppState>) -> Result<Response, ApiError> {
    let report = state.backend.fetch_content::<ImagesReport>(ContentKind::Images).await?.ok_or(ApiError::NotFound)?;
    let body = serde_json::to_string_pretty(&report).map_err(|e| ApiError::Backend(BackendError::Decode(e.to_string())))?;
    Ok(attachment("application/json", "images_report.json", body))
}

pub async fn export_script(Path(slot_id): Path<String>, State(state): State<AppState>) -> Result<Response, ApiError> {
    let report = state.backend.fetch_content::<ScriptsReport>(ContentKind::Scripts).await?.ok_or(ApiError::NotFound)?;
    let script = report.scripts.iter().find(|s| s.slot_id == slot_id).ok_or(ApiError::NotFound)?;
    Ok(attachment("text/plain; charset=utf-8", &script_filename(script), script_text(script)))
}

pub async fn list_templates(State(state): State<AppState>) -> Result<Json<LibraryView>, ApiError> {
    let listing = state.backend.list_templates().await?;
    Ok(Json(LibraryView::from(&listing)))
}

#[derive(Debug, Serialize)]
pub struct UploadSummary {
    #[serde(flatten)]
    pub report: BatchReport,
    pub summary: String,
}

/// Multipart form with a `category` field and any number of file fields.
pub async fn upload_templates(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadSummary>, ApiError> {
    let mut category = None;
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::BadRequest(e.body_text()))? {
        if field.name() == Some("category") {
            let raw = field.text().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
            category = Some(raw.trim().parse::<TemplateCategory>().map_err(ApiError::BadRequest)?);
            continue;
        }
        let Some(name) = field.file_name().map(str::to_string) else { continue };
        let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.body_text()))?;
        files.push(UploadFile::new(name, bytes));
    }

    let category = category.ok_or_else(|| ApiError::BadRequest("missing category field".to_string()))?;
    if files.is_empty() {
        return Err(ApiError::BadRequest("no files in upload".to_string()));
    }
    let report = upload_batch(&state.backend, category, &files).await;
    Ok(Json(UploadSummary { summary: report.summary(), report }))
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    #[serde(default)]
    pub category: Option<String>,
}

pub async fn delete_template(
    Path(filename): Path<String>,
    Query(query): Query<CategoryQuery>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let raw = query.category.ok_or_else(|| ApiError::BadRequest("missing category query parameter".to_string()))?;
    let category = raw.parse::<TemplateCategory>().map_err(ApiError::BadRequest)?;
    state.backend.delete_template(&filename, category).await?;
    Ok(StatusCode::NO_CONTENT)
}
