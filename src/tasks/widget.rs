use std::sync::Arc;

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::Configuration;
use crate::events::{RenderImage, ServiceEvent, WidgetCommand};
use crate::model::Album;
use crate::platform::capability::PlatformCapability;
use crate::render::presenter::{present, Presentation, VideoPlayback};
use crate::service::PhotoService;
use crate::storage::UserStorage;
use crate::tasks::catalog::AlbumCatalog;
use crate::tasks::rotation::{RotationOptions, RotationPhase, RotationScheduler};

const FALLBACK_TITLE: &str = "Photos";

/// Everything the host shows for the photos widget.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetView {
    pub title: String,
    pub collapsed: bool,
    pub albums: Vec<Album>,
    pub selected_album: Option<Album>,
    pub phase: RotationPhase,
    pub presentation: Presentation,
    pub video_clicked: bool,
}

impl Default for WidgetView {
    fn default() -> Self {
        Self {
            title: FALLBACK_TITLE.to_string(),
            collapsed: false,
            albums: Vec::new(),
            selected_album: None,
            phase: RotationPhase::Idle,
            presentation: Presentation::Empty,
            video_clicked: false,
        }
    }
}

/// Photo slideshow widget: album catalog, rotation and presentation state
/// driven from one event loop.
pub struct PhotosWidget {
    catalog: AlbumCatalog,
    scheduler: RotationScheduler,
    capability: PlatformCapability,
    display_height: u32,
    collapsed: bool,
    playback: VideoPlayback,
    last_rendered: Option<String>,
    render_tx: Option<Sender<RenderImage>>,
    view_tx: watch::Sender<WidgetView>,
    events_tx: Sender<ServiceEvent>,
}

/// Handles returned alongside a new widget.
pub struct WidgetChannels {
    pub service_events: Receiver<ServiceEvent>,
    pub view: watch::Receiver<WidgetView>,
}

impl PhotosWidget {
    pub fn new(
        service: Arc<dyn PhotoService>,
        storage: UserStorage,
        cfg: &Configuration,
        signed_in: bool,
        render_tx: Option<Sender<RenderImage>>,
    ) -> (Self, WidgetChannels) {
        let (events_tx, service_events) = mpsc::channel(32);
        let (view_tx, view) = watch::channel(WidgetView::default());
        let scheduler = RotationScheduler::new(
            Arc::clone(&service),
            storage,
            events_tx.clone(),
            RotationOptions {
                interval: cfg.rotation_interval,
                photos_page_size: cfg.photos_page_size,
                rng_seed: cfg.rng_seed,
            },
            signed_in,
        );
        let widget = Self {
            catalog: AlbumCatalog::new(service, cfg.albums_page_size),
            scheduler,
            capability: PlatformCapability::detect(cfg.device.as_ref()),
            display_height: cfg.surface.height,
            collapsed: false,
            playback: VideoPlayback::default(),
            last_rendered: None,
            render_tx,
            view_tx,
            events_tx,
        };
        (
            widget,
            WidgetChannels {
                service_events,
                view,
            },
        )
    }

    pub fn scheduler(&self) -> &RotationScheduler {
        &self.scheduler
    }

    pub fn catalog(&self) -> &AlbumCatalog {
        &self.catalog
    }

    /// Restores persisted rotation first so the widget shows photos before
    /// the service answers, then lists albums.
    pub fn mount(&mut self) {
        let restored = self.scheduler.restore();
        debug!(restored, "photos widget mounted");
        self.catalog
            .refresh(self.scheduler.signed_in(), &self.events_tx);
        self.sync();
    }

    pub fn handle_command(&mut self, cmd: WidgetCommand) {
        debug!(?cmd, "widget command");
        match cmd {
            WidgetCommand::SelectAlbum(index) => match self.catalog.get(index).cloned() {
                Some(album) => self.scheduler.select_album(album),
                None => warn!(index, "no album at index"),
            },
            WidgetCommand::SelectOther => {
                self.scheduler.select_other();
                self.playback.reset();
                self.last_rendered = None;
            }
            WidgetCommand::NextPhoto => {
                if self.scheduler.phase() == RotationPhase::Rotating {
                    self.scheduler.advance();
                } else {
                    debug!(phase = ?self.scheduler.phase(), "next photo ignored; not rotating");
                }
            }
            WidgetCommand::SetSignedIn(signed_in) => {
                if self.scheduler.set_signed_in(signed_in) {
                    self.catalog.refresh(true, &self.events_tx);
                }
            }
            WidgetCommand::ToggleCollapsed => self.collapsed = !self.collapsed,
            WidgetCommand::ClickVideo => match self.playback.click() {
                Some(src) => info!(%src, "playing video"),
                None => debug!("no video to play"),
            },
        }
        self.sync();
    }

    pub fn handle_event(&mut self, event: ServiceEvent) {
        match event {
            ServiceEvent::AlbumsListed { source, result } => self.catalog.apply(source, result),
            ServiceEvent::PhotosListed { album_id, result } => {
                self.scheduler.on_photos_listed(&album_id, result)
            }
            ServiceEvent::PhotoFetched(result) => {
                self.scheduler.on_photo_fetched(result);
            }
        }
        self.sync();
    }

    fn presentation(&self) -> Presentation {
        if self.scheduler.selected_album().is_none() {
            return Presentation::Empty;
        }
        present(
            self.scheduler.current_photo(),
            self.capability,
            self.display_height,
        )
    }

    /// Pushes presentation changes to the renderer and publishes the view.
    fn sync(&mut self) {
        let presentation = self.presentation();
        // Leaving the inline video drops its click state.
        match &presentation {
            Presentation::InlineVideo { src, .. } => self.playback.sync(src),
            Presentation::Still { image_url } => {
                self.playback.reset();
                self.request_render(image_url);
            }
            Presentation::ExternalLink { .. } | Presentation::Empty => self.playback.reset(),
        }
        let video_clicked = matches!(presentation, Presentation::InlineVideo { .. })
            && self.playback.clicked();

        let selected_album = self.scheduler.selected_album().cloned();
        let title = selected_album
            .as_ref()
            .map(|album| album.title.clone())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| FALLBACK_TITLE.to_string());
        let view = WidgetView {
            title,
            collapsed: self.collapsed,
            albums: self.catalog.albums().to_vec(),
            selected_album,
            phase: self.scheduler.phase(),
            presentation,
            video_clicked,
        };
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }

    fn request_render(&mut self, url: &str) {
        if self.last_rendered.as_deref() == Some(url) {
            return;
        }
        self.last_rendered = Some(url.to_string());
        let Some(render_tx) = self.render_tx.as_ref() else {
            return;
        };
        match render_tx.try_send(RenderImage {
            url: url.to_string(),
        }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!(%url, "renderer busy; dropping frame request"),
            Err(TrySendError::Closed(_)) => debug!("renderer gone"),
        }
    }

    /// Drives the widget until `cancel` fires. Cancelling is unmounting: the
    /// timer is dropped and late service completions are discarded.
    #[instrument(skip_all)]
    pub async fn run(
        mut self,
        mut service_events: Receiver<ServiceEvent>,
        mut commands: Receiver<WidgetCommand>,
        cancel: CancellationToken,
    ) -> Result<()> {
        self.mount();
        loop {
            select! {
                _ = cancel.cancelled() => {
                    info!("unmounting photos widget");
                    break;
                }

                Some(cmd) = commands.recv() => self.handle_command(cmd),

                Some(event) = service_events.recv() => self.handle_event(event),

                _ = self.scheduler.tick() => {
                    self.scheduler.advance();
                    self.sync();
                }
            }
        }
        self.scheduler.teardown();
        Ok(())
    }
}
