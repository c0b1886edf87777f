use std::sync::Arc;

use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};

use crate::events::ServiceEvent;
use crate::model::{Album, AlbumSource};
use crate::service::PhotoService;

/// Visible album collection, fed by the owned and shared listings.
pub struct AlbumCatalog {
    service: Arc<dyn PhotoService>,
    page_size: u32,
    albums: Vec<Album>,
}

impl AlbumCatalog {
    pub fn new(service: Arc<dyn PhotoService>, page_size: u32) -> Self {
        Self {
            service,
            page_size,
            albums: Vec::new(),
        }
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    pub fn get(&self, index: usize) -> Option<&Album> {
        self.albums.get(index)
    }

    /// Issues the owned and shared listings independently; each completion is
    /// delivered to `events` as it resolves. Does nothing while signed out.
    pub fn refresh(&self, signed_in: bool, events: &Sender<ServiceEvent>) {
        if !signed_in {
            debug!("album refresh skipped; signed out");
            return;
        }
        for source in [AlbumSource::Owned, AlbumSource::Shared] {
            let service = Arc::clone(&self.service);
            let events = events.clone();
            let page_size = self.page_size;
            tokio::spawn(async move {
                let result = match source {
                    AlbumSource::Owned => service.list_owned_albums(page_size).await,
                    AlbumSource::Shared => service.list_shared_albums(page_size).await,
                };
                // A closed channel means the widget is gone.
                let _ = events.send(ServiceEvent::AlbumsListed { source, result }).await;
            });
        }
    }

    /// Appends one listing. Duplicates across owned and shared are kept.
    pub fn extend(&mut self, source: AlbumSource, albums: Vec<Album>) {
        info!(?source, count = albums.len(), "albums listed");
        self.albums.extend(albums);
    }

    pub fn apply(&mut self, source: AlbumSource, result: Result<Vec<Album>, crate::error::Error>) {
        match result {
            Ok(albums) => self.extend(source, albums),
            Err(err) => warn!(?source, "album listing failed: {err}"),
        }
    }
}
