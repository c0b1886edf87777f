use crate::error::Error;
use crate::model::{Album, AlbumSource, PhotoDetail, PhotoRef};

/// User affordances exposed by the photos widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetCommand {
    /// Pick an album by its position in the visible catalog.
    SelectAlbum(usize),
    /// Back out to album selection.
    SelectOther,
    NextPhoto,
    SetSignedIn(bool),
    ToggleCollapsed,
    /// Start the inline video currently on screen.
    ClickVideo,
}

/// Completion of a photo-service call, delivered back to the widget loop.
#[derive(Debug)]
pub enum ServiceEvent {
    AlbumsListed {
        source: AlbumSource,
        result: Result<Vec<Album>, Error>,
    },
    PhotosListed {
        album_id: String,
        result: Result<Vec<Option<PhotoRef>>, Error>,
    },
    PhotoFetched(Result<PhotoDetail, Error>),
}

/// Asks the frame renderer to compose and fade in the image at `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderImage {
    pub url: String,
}
