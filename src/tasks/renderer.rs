use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use image::RgbaImage;
use tokio::select;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Configuration, SurfaceSize};
use crate::events::RenderImage;
use crate::render::compositor::{decode_rgba8, FadeIn, PreparedImage, Surface};
use crate::service::PhotoService;

/// Receives composed frames.
pub trait FrameSink: Send {
    /// Called once per animation frame.
    fn frame(&mut self, _surface: &RgbaImage, _opacity: f32) {}
    /// Called when a fade-in reaches full opacity.
    fn finished(&mut self, surface: &RgbaImage);
    /// Called when an image could not be shown and the surface was blanked.
    fn blank(&mut self, _surface: &RgbaImage) {}
}

/// Writes every fully faded-in frame to a PNG file.
#[derive(Debug)]
pub struct PngFrameSink {
    path: PathBuf,
}

impl PngFrameSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl FrameSink for PngFrameSink {
    fn finished(&mut self, surface: &RgbaImage) {
        match surface.save(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "frame written"),
            Err(err) => warn!(path = %self.path.display(), "failed to write frame: {err}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RendererOptions {
    pub surface: SurfaceSize,
    pub background: [u8; 3],
    pub fade_step: f32,
    pub frame_interval: Duration,
}

impl From<&Configuration> for RendererOptions {
    fn from(cfg: &Configuration) -> Self {
        Self {
            surface: cfg.surface,
            background: cfg.background_color,
            fade_step: cfg.fade_step,
            frame_interval: cfg.frame_interval,
        }
    }
}

struct Animation {
    image: PreparedImage,
    fade: FadeIn,
}

type Loaded = (String, Option<PreparedImage>);

/// Fetches, decodes and fades in each requested image.
///
/// A newer request supersedes a pending load. A loaded image replaces any
/// fade in progress and starts again from zero opacity.
pub async fn run(
    mut requests: Receiver<RenderImage>,
    media: Arc<dyn PhotoService>,
    mut sink: impl FrameSink,
    options: RendererOptions,
    cancel: CancellationToken,
) -> Result<()> {
    let mut surface = Surface::new(
        options.surface.width,
        options.surface.height,
        options.background,
    );
    let mut frames = interval(options.frame_interval);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut loading: Option<JoinHandle<Loaded>> = None;
    let mut animation: Option<Animation> = None;

    loop {
        select! {
            _ = cancel.cancelled() => break,

            maybe_req = requests.recv() => {
                let Some(RenderImage { url }) = maybe_req else {
                    debug!("render request channel closed");
                    break;
                };
                if let Some(previous) = loading.take() {
                    previous.abort();
                }
                debug!(%url, "loading image");
                loading = Some(spawn_load(Arc::clone(&media), url, options.surface));
            }

            joined = async {
                match loading.as_mut() {
                    Some(handle) => handle.await,
                    None => std::future::pending().await,
                }
            }, if loading.is_some() => {
                loading = None;
                match joined {
                    Ok((url, Some(image))) => {
                        debug!(%url, strategy = ?image.rect.strategy, "image ready; fading in");
                        animation = Some(Animation { image, fade: FadeIn::new(options.fade_step) });
                        frames.reset();
                    }
                    Ok((url, None)) => {
                        warn!(%url, "image unavailable; rendering nothing");
                        animation = None;
                        surface.clear();
                        sink.blank(surface.pixels());
                    }
                    Err(err) if err.is_cancelled() => {}
                    Err(err) => warn!("image load task failed: {err}"),
                }
            }

            _ = frames.tick(), if animation.is_some() => {
                let Some(current) = animation.as_mut() else { continue };
                match current.fade.next_opacity() {
                    Some(opacity) => {
                        surface.draw(&current.image, opacity);
                        sink.frame(surface.pixels(), opacity);
                        if current.fade.is_done() {
                            sink.finished(surface.pixels());
                            animation = None;
                        }
                    }
                    None => animation = None,
                }
            }
        }
    }

    if let Some(pending) = loading.take() {
        pending.abort();
    }
    Ok(())
}

fn spawn_load(media: Arc<dyn PhotoService>, url: String, surface: SurfaceSize) -> JoinHandle<Loaded> {
    tokio::spawn(async move {
        let bytes = match media.fetch_media(&url).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%url, "image download failed: {err}");
                return (url, None);
            }
        };
        let decoded = tokio::task::spawn_blocking(move || {
            let rgba = decode_rgba8(&bytes)?;
            PreparedImage::new(&rgba, surface.width, surface.height)
        })
        .await;
        match decoded {
            Ok(Ok(image)) => (url, Some(image)),
            Ok(Err(err)) => {
                warn!(%url, "image decode failed: {err:#}");
                (url, None)
            }
            Err(err) => {
                warn!(%url, "image decode task failed: {err}");
                (url, None)
            }
        }
    })
}
