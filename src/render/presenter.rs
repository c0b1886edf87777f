use crate::model::PhotoDetail;
use crate::platform::capability::PlatformCapability;

/// URL suffix selecting the downloadable video variant.
const VIDEO_SUFFIX: &str = "=dv";

/// URLs derived from one photo record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUrls {
    pub image_url: Option<String>,
    pub product_url: String,
    pub video_url: Option<String>,
}

impl MediaUrls {
    /// Appends the height constraint to the base URL; records without one
    /// have no displayable image.
    pub fn from_detail(photo: &PhotoDetail, display_height: u32) -> Self {
        let base = photo.base_url.trim();
        let image_url = (!base.is_empty()).then(|| format!("{base}=h{display_height}"));
        let video_url = (!base.is_empty() && photo.is_video()).then(|| format!("{base}{VIDEO_SUFFIX}"));
        Self {
            image_url,
            product_url: photo.product_url.clone(),
            video_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presentation {
    /// Nothing to show.
    Empty,
    /// Still image composed by the frame renderer.
    Still { image_url: String },
    /// Click-to-play inline video with a still poster frame.
    InlineVideo { src: String, poster: String },
    /// Link out to the service's viewer; the device cannot play the video inline.
    ExternalLink { product_url: String },
}

/// Picks the presentation variant for `photo` on this device.
pub fn present(
    photo: Option<&PhotoDetail>,
    capability: PlatformCapability,
    display_height: u32,
) -> Presentation {
    let Some(photo) = photo else {
        return Presentation::Empty;
    };
    let urls = MediaUrls::from_detail(photo, display_height);
    if photo.is_video() && !capability.inline_video() {
        if urls.product_url.is_empty() {
            return Presentation::Empty;
        }
        return Presentation::ExternalLink {
            product_url: urls.product_url,
        };
    }
    match (urls.video_url, urls.image_url) {
        (Some(src), Some(poster)) => Presentation::InlineVideo { src, poster },
        (None, Some(image_url)) => Presentation::Still { image_url },
        _ => Presentation::Empty,
    }
}

/// Click state of the inline video. Playback is always user initiated and
/// resets whenever the source changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoPlayback {
    src: String,
    clicked: bool,
}

impl VideoPlayback {
    /// Tracks the current source; a different source clears the click.
    pub fn sync(&mut self, src: &str) {
        if self.src != src {
            self.src = src.to_string();
            self.clicked = false;
        }
    }

    /// Returns the source to start playing, if any.
    pub fn click(&mut self) -> Option<&str> {
        if self.src.is_empty() {
            return None;
        }
        self.clicked = true;
        Some(&self.src)
    }

    pub fn clicked(&self) -> bool {
        self.clicked
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
