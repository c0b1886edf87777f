//! Photo-library service seam and its REST client.

use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{Error, ServiceResult};
use crate::model::{Album, AlbumSource, PhotoDetail, PhotoRef};

/// Asynchronous photo-library operations used by the widget.
///
/// Injected at construction so tests can substitute a fake.
pub trait PhotoService: Send + Sync {
    fn list_owned_albums(&self, page_size: u32) -> BoxFuture<'_, ServiceResult<Vec<Album>>>;
    fn list_shared_albums(&self, page_size: u32) -> BoxFuture<'_, ServiceResult<Vec<Album>>>;
    fn list_album_photos<'a>(
        &'a self,
        album_id: &'a str,
        page_size: u32,
    ) -> BoxFuture<'a, ServiceResult<Vec<Option<PhotoRef>>>>;
    fn get_photo<'a>(&'a self, photo_id: &'a str) -> BoxFuture<'a, ServiceResult<PhotoDetail>>;
    /// Downloads media bytes (image variants addressed by URL).
    fn fetch_media<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ServiceResult<Vec<u8>>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumsPage {
    #[serde(default)]
    albums: Vec<RawAlbum>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharedAlbumsPage {
    #[serde(default)]
    shared_albums: Vec<RawAlbum>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAlbum {
    id: String,
    #[serde(default)]
    title: String,
}

impl RawAlbum {
    fn into_album(self, source: AlbumSource) -> Album {
        Album::new(self.id, self.title, source)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaItemsPage {
    #[serde(default)]
    media_items: Vec<Option<PhotoRef>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    album_id: &'a str,
    page_size: u32,
}

/// REST client for the photo-library API. Holds a bearer token obtained by an
/// external sign-in flow.
#[derive(Debug, Clone)]
pub struct PhotosLibraryClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl PhotosLibraryClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> ServiceResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("photo-dashboard/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn signed_in(&self) -> bool {
        self.token.is_some()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorized(&self, req: RequestBuilder) -> ServiceResult<RequestBuilder> {
        let token = self.token.as_deref().ok_or(Error::SignedOut)?;
        Ok(req.bearer_auth(token))
    }

    async fn send_json<T: DeserializeOwned>(&self, endpoint: &str, req: RequestBuilder) -> ServiceResult<T> {
        let res = self.authorized(req)?.send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(Error::Status {
                endpoint: endpoint.to_string(),
                status,
            });
        }
        let body = res.bytes().await?;
        debug!(endpoint, bytes = body.len(), "photo service response");
        Ok(serde_json::from_slice(&body)?)
    }

    #[instrument(skip(self))]
    async fn owned_albums(&self, page_size: u32) -> ServiceResult<Vec<Album>> {
        let url = self.endpoint("v1/albums");
        let req = self.http.get(&url).query(&[("pageSize", page_size)]);
        let page: AlbumsPage = self.send_json("albums.list", req).await?;
        Ok(page
            .albums
            .into_iter()
            .map(|a| a.into_album(AlbumSource::Owned))
            .collect())
    }

    #[instrument(skip(self))]
    async fn shared_albums(&self, page_size: u32) -> ServiceResult<Vec<Album>> {
        let url = self.endpoint("v1/sharedAlbums");
        let req = self.http.get(&url).query(&[("pageSize", page_size)]);
        let page: SharedAlbumsPage = self.send_json("sharedAlbums.list", req).await?;
        Ok(page
            .shared_albums
            .into_iter()
            .map(|a| a.into_album(AlbumSource::Shared))
            .collect())
    }

    #[instrument(skip(self))]
    async fn album_photos(&self, album_id: &str, page_size: u32) -> ServiceResult<Vec<Option<PhotoRef>>> {
        let url = self.endpoint("v1/mediaItems:search");
        let req = self.http.post(&url).json(&SearchRequest {
            album_id,
            page_size,
        });
        let page: MediaItemsPage = self.send_json("mediaItems.search", req).await?;
        Ok(page.media_items)
    }

    #[instrument(skip(self))]
    async fn photo(&self, photo_id: &str) -> ServiceResult<PhotoDetail> {
        let url = self.endpoint(&format!("v1/mediaItems/{photo_id}"));
        let req = self.http.get(&url);
        self.send_json("mediaItems.get", req).await
    }

    async fn media(&self, url: &str) -> ServiceResult<Vec<u8>> {
        // Media URLs are pre-authorized by the service; no bearer token is attached.
        let res = self.http.get(url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(Error::Status {
                endpoint: "media".to_string(),
                status,
            });
        }
        Ok(res.bytes().await?.to_vec())
    }
}

impl PhotoService for PhotosLibraryClient {
    fn list_owned_albums(&self, page_size: u32) -> BoxFuture<'_, ServiceResult<Vec<Album>>> {
        self.owned_albums(page_size).boxed()
    }

    fn list_shared_albums(&self, page_size: u32) -> BoxFuture<'_, ServiceResult<Vec<Album>>> {
        self.shared_albums(page_size).boxed()
    }

    fn list_album_photos<'a>(
        &'a self,
        album_id: &'a str,
        page_size: u32,
    ) -> BoxFuture<'a, ServiceResult<Vec<Option<PhotoRef>>>> {
        self.album_photos(album_id, page_size).boxed()
    }

    fn get_photo<'a>(&'a self, photo_id: &'a str) -> BoxFuture<'a, ServiceResult<PhotoDetail>> {
        self.photo(photo_id).boxed()
    }

    fn fetch_media<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ServiceResult<Vec<u8>>> {
        self.media(url).boxed()
    }
}
