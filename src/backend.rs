use crate::config::ConsoleConfig;
use crate::models::{ContentEnvelope, ContentKind, RegenerationRequest, RegenerationTarget, TemplatesListing};
use crate::templates::{TemplateCategory, UploadFile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header::LAST_MODIFIED, multipart, Client, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tracing::{info, warn, error};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("could not reach the backend: {0}")]
    Transport(String),
    #[error("backend rejected the request ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Rejected { status: u16, detail: Option<String> },
    #[error("unexpected backend response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Operator-facing reason. Backend details are passed through verbatim.
    pub fn reason(&self) -> String {
        match self {
            BackendError::Rejected { detail: Some(detail), .. } => detail.clone(),
            BackendError::Rejected { detail: None, .. } => "unknown error".to_string(),
            BackendError::Transport(_) => "could not connect to the backend".to_string(),
            BackendError::Decode(_) => "unexpected response from the backend".to_string(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() { BackendError::Decode(e.to_string()) } else { BackendError::Transport(e.to_string()) }
    }
}

/// The generation side of the backend, as seen by a regeneration workflow.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Returns once the backend has accepted the request for asynchronous processing.
    async fn regenerate(&self, request: &RegenerationRequest) -> Result<(), BackendError>;

    /// Whether the stored asset has been rewritten at or after `since`.
    async fn asset_ready(&self, target: &RegenerationTarget, since: DateTime<Utc>) -> Result<bool, BackendError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

/// HTTP client for the content engine API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(config: &ConsoleConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self { client, base_url: config.backend_url.clone() })
    }

    /// Appends percent-encoded path segments to the base url.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn asset_url(&self, target: &RegenerationTarget) -> Url {
        let mut segments: Vec<&str> = target.target.asset_segments().to_vec();
        segments.push(target.filename.as_str());
        self.endpoint(&segments)
    }

    pub async fn list_templates(&self) -> Result<TemplatesListing, BackendError> {
        let url = self.endpoint(&["api", "templates"]);
        let response = self.client.get(url).send().await?;
        let listing = check_status(response).await?.json::<TemplatesListing>().await?;
        info!(templates = listing.templates.len(), brand_assets = listing.brand_assets.len(), fonts = listing.fonts.len(), "📚 Fetched template library");
        Ok(listing)
    }

    pub async fn upload_template(&self, category: TemplateCategory, file: &UploadFile) -> Result<(), BackendError> {
        let url = self.endpoint(&["api", "templates", "upload"]);
        let part = multipart::Part::bytes(file.bytes.to_vec()).file_name(file.name.clone());
        let form = multipart::Form::new()
            .part("file", part)
            .text("category", category.as_str());

        info!(file = %file.name, category = category.as_str(), bytes = file.bytes.len(), "📤 Uploading template file");
        let response = self.client.post(url).multipart(form).send().await?;
        check_status(response).await?;
        Ok(())
    }

    pub async fn delete_template(&self, filename: &str, category: TemplateCategory) -> Result<(), BackendError> {
        let url = self.endpoint(&["api", "templates", filename]);
        let response = self.client
            .delete(url)
            .query(&[("category", category.as_str())])
            .send()
            .await?;
        check_status(response).await?;
        info!(file = filename, category = category.as_str(), "🗑️ Deleted template file");
        Ok(())
    }

    /// `Ok(None)` when the backend has not produced this kind of content yet.
    pub async fn fetch_content<T: DeserializeOwned>(&self, kind: ContentKind) -> Result<Option<T>, BackendError> {
        let url = self.endpoint(&["api", "content", kind.as_str()]);
        let response = self.client.get(url).send().await?;
        let envelope = check_status(response).await?.json::<ContentEnvelope<T>>().await?;
        if envelope.data.is_none() {
            info!(kind = kind.as_str(), "No content generated yet");
        }
        Ok(envelope.data)
    }
}

#[async_trait]
impl GenerationService for HttpBackend {
    async fn regenerate(&self, request: &RegenerationRequest) -> Result<(), BackendError> {
        let url = self.endpoint(&["api", "images", "regenerate"]);
        info!(
            file = %request.target.filename,
            collection = %request.target.target,
            overlays = request.text_overlays.len(),
            "🔗 Posting regeneration request to {}", url
        );

        let response = self.client.post(url).json(&request.payload()).send().await.map_err(|e| {
            error!("❌ Regeneration request did not reach the backend: {}", e);
            BackendError::Transport(e.to_string())
        })?;
        let response = check_status(response).await?;
        info!("📥 Regeneration accepted with status {}", response.status());
        Ok(())
    }

    async fn asset_ready(&self, target: &RegenerationTarget, since: DateTime<Utc>) -> Result<bool, BackendError> {
        let response = self.client.get(self.asset_url(target)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let response = check_status(response).await?;
        let modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok());
        Ok(match modified {
            // Last-Modified has second precision.
            Some(modified) => modified.timestamp() >= since.timestamp(),
            None => true,
        })
    }
}

/// Passes 2xx responses through, turns anything else into `Rejected` with the body's `detail`.
async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.detail)
        .map(|d| match d {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
    warn!(status = status.as_u16(), "❌ Backend error response: {}", body);
    Err(BackendError::Rejected { status: status.as_u16(), detail })
}
