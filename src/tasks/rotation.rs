use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::Sender;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::events::ServiceEvent;
use crate::model::{Album, PhotoDetail, PhotoRef, PhotoSet};
use crate::service::PhotoService;
use crate::storage::UserStorage;

pub const STORE_ALBUM_KEY: &str = "ALBUM";
pub const STORE_PHOTOS_KEY: &str = "PHOTOS";
pub const STORE_PHOTO_KEY: &str = "PHOTO";

/// Random draws before falling back to a draw over resolvable entries only.
const MAX_PICK_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPhase {
    /// No album selected.
    Idle,
    /// Album selected, photo set not yet received.
    Loading,
    /// Photo set present, timer armed.
    Rotating,
}

#[derive(Debug, Clone, Default)]
pub struct RotationOptions {
    pub interval: Option<Duration>,
    pub photos_page_size: u32,
    pub rng_seed: Option<u64>,
}

/// The single repeating timer of a widget. Re-arming replaces the previous
/// interval, so at most one is ever live.
#[derive(Debug)]
pub struct RotationTimer {
    period: Option<Duration>,
    interval: Option<Interval>,
    armed: bool,
}

impl RotationTimer {
    pub fn new(period: Option<Duration>) -> Self {
        Self {
            period,
            interval: None,
            armed: false,
        }
    }

    pub fn arm(&mut self) {
        self.clear();
        self.interval = self.period.map(|period| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        self.armed = true;
    }

    pub fn clear(&mut self) {
        self.interval = None;
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Resolves on the next period. Pends forever while cleared or when no
    /// period is configured.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

/// Uniform pick over `set`. Slots that do not resolve are redrawn; after
/// [`MAX_PICK_ATTEMPTS`] misses the draw is restricted to resolvable slots.
pub fn pick_random<'a, R: Rng>(set: &'a [Option<PhotoRef>], rng: &mut R) -> Option<&'a PhotoRef> {
    if set.is_empty() {
        return None;
    }
    for attempt in 0..MAX_PICK_ATTEMPTS {
        let index = rng.random_range(0..set.len());
        match set.get(index).and_then(Option::as_ref) {
            Some(photo) => return Some(photo),
            None => warn!(index, attempt, "photo index did not resolve; retrying"),
        }
    }
    let resolvable: Vec<&PhotoRef> = set.iter().flatten().collect();
    if resolvable.is_empty() {
        return None;
    }
    Some(resolvable[rng.random_range(0..resolvable.len())])
}

/// Owns the selected album, its photo set, the current photo and the timer
/// that advances through the set.
pub struct RotationScheduler {
    service: Arc<dyn PhotoService>,
    storage: UserStorage,
    events: Sender<ServiceEvent>,
    photos_page_size: u32,
    signed_in: bool,
    phase: RotationPhase,
    selected_album: Option<Album>,
    photo_set: PhotoSet,
    current_photo: Option<PhotoDetail>,
    timer: RotationTimer,
    rng: StdRng,
}

impl RotationScheduler {
    pub fn new(
        service: Arc<dyn PhotoService>,
        storage: UserStorage,
        events: Sender<ServiceEvent>,
        options: RotationOptions,
        signed_in: bool,
    ) -> Self {
        if options.interval.is_none() {
            warn!("no rotation interval configured; photos only change on request");
        }
        let rng = match options.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            service,
            storage,
            events,
            photos_page_size: options.photos_page_size,
            signed_in,
            phase: RotationPhase::Idle,
            selected_album: None,
            photo_set: Vec::new(),
            current_photo: None,
            timer: RotationTimer::new(options.interval),
            rng,
        }
    }

    pub fn phase(&self) -> RotationPhase {
        self.phase
    }

    pub fn selected_album(&self) -> Option<&Album> {
        self.selected_album.as_ref()
    }

    pub fn photo_set(&self) -> &[Option<PhotoRef>] {
        &self.photo_set
    }

    pub fn current_photo(&self) -> Option<&PhotoDetail> {
        self.current_photo.as_ref()
    }

    pub fn timer_armed(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn signed_in(&self) -> bool {
        self.signed_in
    }

    /// Resumes from persisted album and photo set. Partial or malformed state
    /// is abandoned and the scheduler stays idle.
    pub fn restore(&mut self) -> bool {
        let album = match self.storage.get_json::<Album>(STORE_ALBUM_KEY) {
            Ok(album) => album,
            Err(err) => {
                warn!("restoring album from storage failed: {err:#}");
                return false;
            }
        };
        let photos = match self.storage.get_json::<PhotoSet>(STORE_PHOTOS_KEY) {
            Ok(photos) => photos,
            Err(err) => {
                warn!("restoring photo set from storage failed: {err:#}");
                return false;
            }
        };
        let (Some(album), Some(photos)) = (album, photos) else {
            debug!("no album to restore");
            return false;
        };

        let current = match self.storage.get_json::<PhotoDetail>(STORE_PHOTO_KEY) {
            Ok(current) => current,
            Err(err) => {
                debug!("ignoring stored photo: {err:#}");
                None
            }
        };
        self.current_photo =
            current.filter(|detail| photos.iter().flatten().any(|p| p.id == detail.id));

        info!(album = %album.id, photos = photos.len(), "restored rotation from storage");
        self.selected_album = Some(album);
        self.photo_set = photos;
        self.start_rotation();
        true
    }

    pub fn select_album(&mut self, album: Album) {
        info!(album = %album.id, title = %album.title, "album selected");
        self.storage.set_json(STORE_ALBUM_KEY, Some(&album));
        // The stored set belongs to the previous album until the new listing lands.
        self.storage.set_json::<PhotoSet>(STORE_PHOTOS_KEY, None);
        self.timer.clear();
        self.photo_set.clear();
        self.selected_album = Some(album);
        self.phase = RotationPhase::Loading;
        self.request_photo_set();
    }

    fn request_photo_set(&self) {
        if !self.signed_in {
            debug!("photo set request deferred; signed out");
            return;
        }
        let Some(album) = self.selected_album.as_ref() else {
            return;
        };
        let service = Arc::clone(&self.service);
        let events = self.events.clone();
        let album_id = album.id.clone();
        let page_size = self.photos_page_size;
        tokio::spawn(async move {
            let result = service.list_album_photos(&album_id, page_size).await;
            let _ = events
                .send(ServiceEvent::PhotosListed { album_id, result })
                .await;
        });
    }

    pub fn on_photos_listed(&mut self, album_id: &str, result: Result<PhotoSet, Error>) {
        let expected = self
            .selected_album
            .as_ref()
            .is_some_and(|album| album.id == album_id);
        if !expected || self.phase != RotationPhase::Loading {
            debug!(album = album_id, "dropping photo set for an album no longer loading");
            return;
        }
        match result {
            Ok(photos) => {
                info!(album = album_id, count = photos.len(), "photo set received");
                self.storage.set_json(STORE_PHOTOS_KEY, Some(&photos));
                self.photo_set = photos;
                self.start_rotation();
            }
            Err(err) => warn!(album = album_id, "listing album photos failed: {err}"),
        }
    }

    /// Enters `Rotating`, re-arms the timer and shows a first photo right away.
    pub fn start_rotation(&mut self) {
        debug!(photos = self.photo_set.len(), "starting rotation");
        self.phase = RotationPhase::Rotating;
        self.timer.arm();
        self.advance();
    }

    /// Picks the next photo and requests its details. Returns the pick.
    pub fn advance(&mut self) -> Option<PhotoRef> {
        let picked = pick_random(&self.photo_set, &mut self.rng).cloned();
        match &picked {
            Some(photo) => self.fetch_photo(&photo.id),
            None => debug!("nothing to rotate"),
        }
        picked
    }

    fn fetch_photo(&self, id: &str) {
        if !self.signed_in {
            debug!(photo = id, "photo fetch skipped; signed out");
            return;
        }
        let service = Arc::clone(&self.service);
        let events = self.events.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            let result = service.get_photo(&id).await;
            let _ = events.send(ServiceEvent::PhotoFetched(result)).await;
        });
    }

    /// Latest arrival wins, even when responses overtake each other. Details
    /// arriving outside `Rotating` belong to an album no longer shown.
    pub fn on_photo_fetched(&mut self, result: Result<PhotoDetail, Error>) -> bool {
        if self.phase != RotationPhase::Rotating {
            debug!(phase = ?self.phase, "dropping photo detail; not rotating");
            return false;
        }
        match result {
            Ok(detail) => {
                debug!(photo = %detail.id, "current photo updated");
                self.storage.set_json(STORE_PHOTO_KEY, Some(&detail));
                self.current_photo = Some(detail);
                true
            }
            Err(err) => {
                warn!("fetching photo details failed: {err}");
                false
            }
        }
    }

    /// Back to album selection. Persists "no album" so a reload stays idle.
    pub fn select_other(&mut self) {
        info!("album selection cleared");
        self.timer.clear();
        self.selected_album = None;
        self.phase = RotationPhase::Idle;
        self.storage.set_json::<Album>(STORE_ALBUM_KEY, None);
    }

    /// Returns true when this call signed the widget in.
    pub fn set_signed_in(&mut self, signed_in: bool) -> bool {
        let became_signed_in = !self.signed_in && signed_in;
        self.signed_in = signed_in;
        if became_signed_in && self.selected_album.is_some() {
            if self.photo_set.is_empty() {
                self.request_photo_set();
            } else {
                self.start_rotation();
            }
        }
        became_signed_in
    }

    /// Waits for the next timer period.
    pub async fn tick(&mut self) {
        self.timer.tick().await;
    }

    pub fn teardown(&mut self) {
        self.timer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(ids: &[&str]) -> PhotoSet {
        ids.iter().map(|id| Some(PhotoRef::new(*id))).collect()
    }

    #[test]
    fn pick_stays_within_the_set() {
        let set = refs(&["p1", "p2", "p3"]);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let picked = pick_random(&set, &mut rng).unwrap();
            assert!(["p1", "p2", "p3"].contains(&picked.id.as_str()));
        }
    }

    #[test]
    fn pick_skips_unresolvable_slots() {
        let mut set: PhotoSet = vec![None; 50];
        set.push(Some(PhotoRef::new("only")));
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            assert_eq!(pick_random(&set, &mut rng).unwrap().id, "only");
        }
    }

    #[test]
    fn pick_abandons_when_nothing_resolves() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(pick_random(&[], &mut rng).is_none());
        assert!(pick_random(&[None, None], &mut rng).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_without_period_never_fires() {
        let mut timer = RotationTimer::new(None);
        timer.arm();
        assert!(timer.is_armed());
        let fired = tokio::time::timeout(Duration::from_secs(3600), timer.tick()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_keeps_a_single_interval() {
        let mut timer = RotationTimer::new(Some(Duration::from_secs(10)));
        timer.arm();
        tokio::time::advance(Duration::from_secs(4)).await;
        timer.arm();
        // The first interval would have fired at t=10; the re-armed one fires at t=14.
        let early = tokio::time::timeout(Duration::from_secs(9), timer.tick()).await;
        assert!(early.is_err());
        let on_time = tokio::time::timeout(Duration::from_secs(2), timer.tick()).await;
        assert!(on_time.is_ok());
    }
}
