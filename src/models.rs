use serde::{Serialize, Deserialize};
use std::{fmt, str::FromStr};

pub const MIN_FONT_SIZE: u32 = 16;
pub const MAX_FONT_SIZE: u32 = 120;
pub const DEFAULT_FONT_SIZE: u32 = 48;
pub const DEFAULT_SIDE: u32 = 1080;

/// Backend bucket an asset lives in. Decides which listing gets refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetCollection {
    Images,
    Carousels,
}

impl TargetCollection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetCollection::Images => "images",
            TargetCollection::Carousels => "carousels",
        }
    }

    /// Path segments under which the backend serves a stored asset of this collection.
    pub fn asset_segments(&self) -> &'static [&'static str] {
        match self {
            TargetCollection::Images => &["api", "images"],
            TargetCollection::Carousels => &["api", "carousels", "slides"],
        }
    }
}

impl fmt::Display for TargetCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for TargetCollection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "images" => Ok(TargetCollection::Images),
            "carousels" => Ok(TargetCollection::Carousels),
            other => Err(format!("unknown collection '{other}', use images or carousels")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayPosition {
    Top,
    #[default]
    Center,
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub text: String,
    pub position: OverlayPosition,
    pub font_size: u32,
}

/// The asset a regeneration request is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenerationTarget {
    pub filename: String,
    /// Human label such as "instagram post" or "carousel slide 3".
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    pub target: TargetCollection,
    pub width: u32,
    pub height: u32,
}

fn default_kind() -> String { "image".to_string() }

impl RegenerationTarget {
    pub fn new(filename: impl Into<String>, kind: impl Into<String>, target: TargetCollection, width: u32, height: u32) -> Self {
        Self { filename: filename.into(), kind: kind.into(), target, width, height }
    }
}

/// A fully validated request, built right before submission and dropped afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegenerationRequest {
    pub target: RegenerationTarget,
    pub prompt: String,
    pub text_overlays: Vec<TextOverlay>,
}

impl RegenerationRequest {
    pub fn payload(&self) -> RegeneratePayload<'_> {
        RegeneratePayload {
            filename: &self.target.filename,
            prompt: &self.prompt,
            width: self.target.width,
            height: self.target.height,
            text_overlays: &self.text_overlays,
            target: self.target.target,
        }
    }
}

/// Wire body of `POST /api/images/regenerate`.
#[derive(Debug, Serialize)]
pub struct RegeneratePayload<'a> {
    pub filename: &'a str,
    pub prompt: &'a str,
    pub width: u32,
    pub height: u32,
    pub text_overlays: &'a [TextOverlay],
    pub target: TargetCollection,
}

// --- Template library ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontMeta {
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatesListing {
    #[serde(default)]
    pub templates: Vec<FileMeta>,
    #[serde(default)]
    pub brand_assets: Vec<FileMeta>,
    #[serde(default)]
    pub fonts: Vec<FontMeta>,
}

// --- Generated content ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Scripts,
    Seo,
    Images,
    Carousels,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Scripts => "scripts",
            ContentKind::Seo => "seo",
            ContentKind::Images => "images",
            ContentKind::Carousels => "carousels",
        }
    }
}

impl From<TargetCollection> for ContentKind {
    fn from(collection: TargetCollection) -> Self {
        match collection {
            TargetCollection::Images => ContentKind::Images,
            TargetCollection::Carousels => ContentKind::Carousels,
        }
    }
}

/// `{data: ...}` envelope of the content endpoints. Missing or null data means nothing generated yet.
#[derive(Debug, Deserialize)]
pub struct ContentEnvelope<T> {
    pub data: Option<T>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImagesReport {
    #[serde(default)]
    pub images_generated: Vec<GeneratedImage>,
    #[serde(default)]
    pub total_images: Option<u32>,
    #[serde(default)]
    pub summary: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub dimensions: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub slot_id: Option<String>,
}

impl GeneratedImage {
    pub fn regeneration_target(&self) -> Option<RegenerationTarget> {
        let filename = self.filename.as_deref().filter(|f| !f.is_empty())?;
        let (width, height) = parse_dimensions(self.dimensions.as_deref());
        let kind = self.kind.as_deref().unwrap_or("image").replace('_', " ");
        Some(RegenerationTarget::new(filename, kind, TargetCollection::Images, width, height))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarouselsReport {
    #[serde(default)]
    pub carousels: Vec<Carousel>,
    #[serde(default)]
    pub total_carousels: Option<u32>,
    #[serde(default)]
    pub total_slides_generated: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Carousel {
    #[serde(default)]
    pub slot_id: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub total_slides: Option<u32>,
    #[serde(default)]
    pub slides: Vec<CarouselSlide>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarouselSlide {
    #[serde(default)]
    pub slide_number: u32,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl CarouselSlide {
    /// Slides are always rendered square.
    pub fn regeneration_target(&self) -> Option<RegenerationTarget> {
        let filename = self.filename.as_deref().filter(|f| !f.is_empty())?;
        Some(RegenerationTarget::new(
            filename,
            format!("carousel slide {}", self.slide_number),
            TargetCollection::Carousels,
            DEFAULT_SIDE,
            DEFAULT_SIDE,
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptsReport {
    #[serde(default)]
    pub scripts: Vec<Script>,
    #[serde(default)]
    pub total_scripts: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub slot_id: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub language: String,
    pub hook: Option<String>,
    pub script_body: Option<String>,
    pub cta: Option<String>,
    pub caption: Option<String>,
    pub visual_notes: Option<String>,
    pub word_count: Option<u32>,
    pub estimated_duration_seconds: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoReport {
    #[serde(default)]
    pub optimizations: Vec<SeoOptimization>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoOptimization {
    #[serde(default)]
    pub slot_id: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub optimized_title: Option<String>,
    #[serde(default)]
    pub hashtags: Hashtags,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hashtags {
    #[serde(default)]
    pub primary: Vec<String>,
    #[serde(default)]
    pub secondary: Vec<String>,
    #[serde(default)]
    pub long_tail: Vec<String>,
    #[serde(default)]
    pub branded: Vec<String>,
    #[serde(default)]
    pub trending: Vec<String>,
}

/// Parses `"{w}x{h}"`. Each side falls back to 1080 when missing, unparsable or zero.
pub fn parse_dimensions(dims: Option<&str>) -> (u32, u32) {
    let Some(dims) = dims else { return (DEFAULT_SIDE, DEFAULT_SIDE) };
    let mut parts = dims.split('x');
    let width = parts.next().map(leading_number).unwrap_or(DEFAULT_SIDE);
    let height = parts.next().map(leading_number).unwrap_or(DEFAULT_SIDE);
    (width, height)
}

fn leading_number(part: &str) -> u32 {
    let digits: String = part.trim_start().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok().filter(|n| *n > 0).unwrap_or(DEFAULT_SIDE)
}
