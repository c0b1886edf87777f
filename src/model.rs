use serde::{Deserialize, Serialize};

/// Where an album was listed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AlbumSource {
    #[default]
    Owned,
    Shared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub source: AlbumSource,
}

impl Album {
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: AlbumSource) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            source,
        }
    }
}

/// Summary of one media item as returned by an album listing.
///
/// Listings carry the full item payload; only the id is needed to rotate, the
/// rest is kept so a persisted photo set round-trips what the service sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
}

impl PhotoRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: None,
            product_url: None,
        }
    }
}

/// Photo set of a selected album. Slots may be empty when the persisted or
/// listed payload contained holes; those slots never resolve to a photo.
pub type PhotoSet = Vec<Option<PhotoRef>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoMetadata>,
}

/// Full metadata of one media item, fetched per rotation tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoDetail {
    pub id: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub product_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_metadata: Option<MediaMetadata>,
}

impl PhotoDetail {
    pub fn is_video(&self) -> bool {
        self.media_metadata
            .as_ref()
            .is_some_and(|meta| meta.video.is_some())
    }
}
