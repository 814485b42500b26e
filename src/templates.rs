use crate::backend::HttpBackend;
use crate::models::{FileMeta, FontMeta, TemplatesListing};
use bytes::Bytes;
use serde::{Serialize, Deserialize};
use std::{fmt, str::FromStr};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateCategory {
    Template,
    Logo,
    Font,
}

impl TemplateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateCategory::Template => "template",
            TemplateCategory::Logo => "logo",
            TemplateCategory::Font => "font",
        }
    }

    pub fn accepted_extensions(&self) -> &'static [&'static str] {
        match self {
            TemplateCategory::Template => &["png", "jpg", "jpeg", "svg", "psd"],
            TemplateCategory::Logo => &["png", "jpg", "jpeg", "svg"],
            TemplateCategory::Font => &["ttf", "otf", "woff", "woff2"],
        }
    }

    pub fn accepts(&self, filename: &str) -> bool {
        filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .is_some_and(|ext| self.accepted_extensions().contains(&ext.as_str()))
    }
}

impl fmt::Display for TemplateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for TemplateCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "template" => Ok(TemplateCategory::Template),
            "logo" => Ok(TemplateCategory::Logo),
            "font" => Ok(TemplateCategory::Font),
            other => Err(format!("unknown template category '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self { name: name.into(), bytes: bytes.into() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        if self.failed == 0 {
            format!("{} file(s) uploaded", self.succeeded)
        } else {
            format!("{} succeeded, {} failed", self.succeeded, self.failed)
        }
    }
}

/// Uploads one file at a time. A failing file is counted and the batch moves on.
pub async fn upload_batch(backend: &HttpBackend, category: TemplateCategory, files: &[UploadFile]) -> BatchReport {
    let mut report = BatchReport::default();
    for file in files {
        if !category.accepts(&file.name) {
            warn!(file = %file.name, %category, "Skipping file with unsupported extension");
            report.failed += 1;
            continue;
        }
        match backend.upload_template(category, file).await {
            Ok(()) => report.succeeded += 1,
            Err(e) => {
                warn!(file = %file.name, "❌ Upload failed: {}", e);
                report.failed += 1;
            }
        }
    }
    info!(succeeded = report.succeeded, failed = report.failed, "📦 Upload batch finished");
    report
}

/// One library file as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryEntry {
    pub name: String,
    pub size: u64,
    pub size_label: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<&FileMeta> for LibraryEntry {
    fn from(meta: &FileMeta) -> Self {
        Self {
            name: meta.name.clone(),
            size: meta.size,
            size_label: format_size(meta.size),
            kind: Some(meta.kind.clone()).filter(|k| !k.is_empty()),
            url: meta.url.clone(),
        }
    }
}

impl From<&FontMeta> for LibraryEntry {
    fn from(meta: &FontMeta) -> Self {
        Self { name: meta.name.clone(), size: meta.size, size_label: format_size(meta.size), kind: None, url: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibraryView {
    pub templates: Vec<LibraryEntry>,
    pub brand_assets: Vec<LibraryEntry>,
    pub fonts: Vec<LibraryEntry>,
}

impl From<&TemplatesListing> for LibraryView {
    fn from(listing: &TemplatesListing) -> Self {
        Self {
            templates: listing.templates.iter().map(LibraryEntry::from).collect(),
            brand_assets: listing.brand_assets.iter().map(LibraryEntry::from).collect(),
            fonts: listing.fonts.iter().map(LibraryEntry::from).collect(),
        }
    }
}

pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / KB)
    } else {
        format!("{:.1} MB", bytes as f64 / (KB * KB))
    }
}
