mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{png, FakeService};
use image::{Rgba, RgbaImage};
use photo_dashboard::config::SurfaceSize;
use photo_dashboard::events::RenderImage;
use photo_dashboard::tasks::renderer::{self, FrameSink, RendererOptions};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct Recorded {
    opacities: Vec<f32>,
    finished: Vec<RgbaImage>,
    blanks: usize,
}

#[derive(Clone, Default)]
struct RecordingSink(Arc<Mutex<Recorded>>);

impl FrameSink for RecordingSink {
    fn frame(&mut self, _surface: &RgbaImage, opacity: f32) {
        self.0.lock().unwrap().opacities.push(opacity);
    }

    fn finished(&mut self, surface: &RgbaImage) {
        self.0.lock().unwrap().finished.push(surface.clone());
    }

    fn blank(&mut self, _surface: &RgbaImage) {
        self.0.lock().unwrap().blanks += 1;
    }
}

fn options() -> RendererOptions {
    RendererOptions {
        surface: SurfaceSize {
            width: 12,
            height: 8,
        },
        background: [255, 255, 255],
        fade_step: 0.25,
        frame_interval: Duration::from_millis(2),
    }
}

async fn eventually(sink: &RecordingSink, what: &str, pred: impl Fn(&Recorded) -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            if pred(&sink.0.lock().unwrap()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timeout waiting for {what}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn portrait_image_fades_in_with_cleared_sides() {
    let mut service = FakeService::default();
    service
        .media
        .insert("https://m/p=h8".into(), png(6, 10, [255, 0, 0, 255]));
    let service = Arc::new(service);
    let sink = RecordingSink::default();
    let (tx, rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(renderer::run(rx, service, sink.clone(), options(), cancel.clone()));

    tx.send(RenderImage {
        url: "https://m/p=h8".into(),
    })
    .await
    .unwrap();

    eventually(&sink, "finished fade", |r| !r.finished.is_empty()).await;
    {
        let recorded = sink.0.lock().unwrap();
        assert_eq!(recorded.opacities, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        let frame = &recorded.finished[0];
        assert_eq!(frame.dimensions(), (12, 8));
        assert_eq!(frame.get_pixel(6, 4), &Rgba([255, 0, 0, 255]));
        assert_eq!(frame.get_pixel(0, 4), &Rgba([255, 255, 255, 255]));
        assert_eq!(frame.get_pixel(11, 4), &Rgba([255, 255, 255, 255]));
    }

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn undecodable_media_renders_nothing() {
    let mut service = FakeService::default();
    service.media.insert("https://m/bad".into(), b"not an image".to_vec());
    let service = Arc::new(service);
    let sink = RecordingSink::default();
    let (tx, rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(renderer::run(rx, service, sink.clone(), options(), cancel.clone()));

    tx.send(RenderImage {
        url: "https://m/bad".into(),
    })
    .await
    .unwrap();
    tx.send(RenderImage {
        url: "https://m/missing".into(),
    })
    .await
    .unwrap();

    eventually(&sink, "blank frame", |r| r.blanks >= 1).await;
    {
        let recorded = sink.0.lock().unwrap();
        assert!(recorded.opacities.is_empty());
        assert!(recorded.finished.is_empty());
    }

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_image_restarts_the_fade() {
    let mut service = FakeService::default();
    service.media.insert("https://m/a".into(), png(4, 2, [0, 0, 255, 255]));
    service.media.insert("https://m/b".into(), png(4, 2, [0, 255, 0, 255]));
    let service = Arc::new(service);
    let sink = RecordingSink::default();
    let (tx, rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let slow = RendererOptions {
        frame_interval: Duration::from_millis(20),
        fade_step: 0.1,
        ..options()
    };
    let handle = tokio::spawn(renderer::run(rx, service, sink.clone(), slow, cancel.clone()));

    tx.send(RenderImage { url: "https://m/a".into() }).await.unwrap();
    eventually(&sink, "first fade under way", |r| r.opacities.len() >= 2).await;
    tx.send(RenderImage { url: "https://m/b".into() }).await.unwrap();

    eventually(&sink, "second fade finished", |r| !r.finished.is_empty()).await;
    {
        let recorded = sink.0.lock().unwrap();
        assert_eq!(recorded.finished.len(), 1, "only the replacing image completes");
        let restarts = recorded.opacities.iter().filter(|o| **o == 0.0).count();
        assert_eq!(restarts, 2);
        assert_eq!(recorded.finished[0].get_pixel(6, 4), &Rgba([0, 255, 0, 255]));
    }

    cancel.cancel();
    handle.await.unwrap().unwrap();
}
