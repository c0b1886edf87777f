#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt};
use image::{ImageFormat, Rgba, RgbaImage};
use photo_dashboard::error::{Error, ServiceResult};
use photo_dashboard::model::{Album, AlbumSource, MediaMetadata, PhotoDetail, PhotoRef, VideoMetadata};
use photo_dashboard::service::PhotoService;
use photo_dashboard::storage::{KeyValueStore, MemoryStore, UserStorage};

/// In-memory photo service that records every call it receives.
#[derive(Default)]
pub struct FakeService {
    pub owned: Vec<Album>,
    pub shared: Vec<Album>,
    pub photos: HashMap<String, Vec<Option<PhotoRef>>>,
    pub details: HashMap<String, PhotoDetail>,
    pub media: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl FakeService {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl PhotoService for FakeService {
    fn list_owned_albums(&self, page_size: u32) -> BoxFuture<'_, ServiceResult<Vec<Album>>> {
        self.record(format!("owned:{page_size}"));
        let albums = self.owned.clone();
        async move { Ok(albums) }.boxed()
    }

    fn list_shared_albums(&self, page_size: u32) -> BoxFuture<'_, ServiceResult<Vec<Album>>> {
        self.record(format!("shared:{page_size}"));
        let albums = self.shared.clone();
        async move { Ok(albums) }.boxed()
    }

    fn list_album_photos<'a>(
        &'a self,
        album_id: &'a str,
        page_size: u32,
    ) -> BoxFuture<'a, ServiceResult<Vec<Option<PhotoRef>>>> {
        self.record(format!("photos:{album_id}:{page_size}"));
        let photos = self.photos.get(album_id).cloned();
        async move { photos.ok_or(Error::SignedOut) }.boxed()
    }

    fn get_photo<'a>(&'a self, photo_id: &'a str) -> BoxFuture<'a, ServiceResult<PhotoDetail>> {
        self.record(format!("photo:{photo_id}"));
        let detail = self.details.get(photo_id).cloned();
        async move { detail.ok_or(Error::SignedOut) }.boxed()
    }

    fn fetch_media<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ServiceResult<Vec<u8>>> {
        self.record(format!("media:{url}"));
        let bytes = self.media.get(url).cloned();
        async move { bytes.ok_or(Error::SignedOut) }.boxed()
    }
}

pub fn album(id: &str, title: &str, source: AlbumSource) -> Album {
    Album::new(id, title, source)
}

pub fn still(id: &str) -> PhotoDetail {
    PhotoDetail {
        id: id.to_string(),
        base_url: format!("https://media.test/{id}"),
        product_url: format!("https://photos.test/{id}"),
        mime_type: Some("image/jpeg".to_string()),
        filename: None,
        media_metadata: Some(MediaMetadata::default()),
    }
}

pub fn video(id: &str) -> PhotoDetail {
    let mut detail = still(id);
    detail.mime_type = Some("video/mp4".to_string());
    detail.media_metadata = Some(MediaMetadata {
        video: Some(VideoMetadata::default()),
        ..MediaMetadata::default()
    });
    detail
}

pub fn refs(ids: &[&str]) -> Vec<Option<PhotoRef>> {
    ids.iter().map(|id| Some(PhotoRef::new(*id))).collect()
}

pub fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn photos_storage(store: &Arc<MemoryStore>) -> UserStorage {
    let store: Arc<dyn KeyValueStore> = store.clone();
    UserStorage::new(store, "tester", "PHOTOS")
}
