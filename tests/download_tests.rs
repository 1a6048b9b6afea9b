//! End-to-end download flow tests against in-memory doubles.
//!
//! The fakes stand in for Deezer, Spotify and Telegram; the SQLite
//! layers run against in-memory databases. Downloads write real files
//! into scoped temporary directories so delivery sees actual paths.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use rusqlite::Connection;

use spotizer::{
    cache::DownloadCache,
    download::DownloadManager,
    error::{Error, Result},
    link::{ContentRef, ContentType},
    providers::{Acquisition, ForeignItem, ForeignProvider, ListingInfo, NativeProvider, TrackInfo},
    settings::{Quality, SettingsStore, UserSettings},
    transport::{AudioMeta, Delivery, Transport},
};

const USER: i64 = 42;

#[derive(Clone)]
struct FakeTrack {
    title: &'static str,
    artist: &'static str,
    duration: u64,
}

/// Deezer double with a fixed catalog and download counters.
struct FakeNative {
    tracks: HashMap<&'static str, FakeTrack>,
    listings: HashMap<&'static str, Vec<&'static str>>,
    failing: HashSet<&'static str>,
    search_hit: Option<&'static str>,
    track_downloads: AtomicUsize,
    bundle_downloads: AtomicUsize,
}

impl FakeNative {
    fn new() -> Self {
        let mut tracks = HashMap::new();
        tracks.insert(
            "1341166",
            FakeTrack {
                title: "One More Time",
                artist: "Daft Punk",
                duration: 320,
            },
        );
        tracks.insert(
            "1",
            FakeTrack {
                title: "Nightcall",
                artist: "Kavinsky",
                duration: 258,
            },
        );
        tracks.insert(
            "2",
            FakeTrack {
                title: "Odessa",
                artist: "Caribou",
                duration: 242,
            },
        );
        tracks.insert(
            "3",
            FakeTrack {
                title: "Midnight City",
                artist: "M83",
                duration: 244,
            },
        );

        let mut listings = HashMap::new();
        listings.insert("302127", vec!["1", "2", "3"]);

        Self {
            tracks,
            listings,
            failing: HashSet::new(),
            search_hit: None,
            track_downloads: AtomicUsize::new(0),
            bundle_downloads: AtomicUsize::new(0),
        }
    }

    fn track_info(&self, id: &str) -> Result<FakeTrack> {
        self.tracks
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("no such track: {id}")))
    }

    fn acquire(&self, file_name: &str, track: &FakeTrack) -> Result<Acquisition> {
        let workdir = tempfile::tempdir()?;
        let path = workdir.path().join(file_name);
        std::fs::write(&path, b"audio bytes")?;
        Ok(Acquisition::new(
            path,
            track.title.to_owned(),
            track.artist.to_owned(),
            String::new(),
            Duration::from_secs(track.duration),
            workdir,
        ))
    }
}

#[async_trait]
impl NativeProvider for FakeNative {
    async fn track(&self, id: &str) -> Result<TrackInfo> {
        let track = self.track_info(id)?;
        Ok(TrackInfo {
            id: id.to_owned(),
            title: track.title.to_owned(),
            artist: track.artist.to_owned(),
            album: String::new(),
            duration: Duration::from_secs(track.duration),
            url: format!("https://www.deezer.com/track/{id}"),
        })
    }

    async fn listing(&self, _content_type: ContentType, id: &str) -> Result<ListingInfo> {
        let track_ids = self
            .listings
            .get(id)
            .ok_or_else(|| Error::not_found(format!("no such listing: {id}")))?;
        Ok(ListingInfo {
            id: id.to_owned(),
            title: String::from("Test Album"),
            artist: String::from("Various Artists"),
            track_ids: track_ids.iter().map(|&id| id.to_owned()).collect(),
        })
    }

    async fn track_list(&self, content_type: ContentType, id: &str) -> Result<Vec<String>> {
        if content_type == ContentType::Track {
            return Ok(vec![id.to_owned()]);
        }
        Ok(self.listing(content_type, id).await?.track_ids)
    }

    async fn search_first(
        &self,
        _content_type: ContentType,
        _query: &str,
    ) -> Result<Option<String>> {
        Ok(self.search_hit.map(str::to_owned))
    }

    async fn download_track(&self, id: &str, _quality: Quality) -> Result<Acquisition> {
        if self.failing.contains(id) {
            return Err(Error::unavailable(format!("track {id} is unavailable")));
        }
        let track = self.track_info(id)?;
        self.track_downloads.fetch_add(1, Ordering::SeqCst);
        self.acquire(&format!("{} - {}.mp3", track.artist, track.title), &track)
    }

    async fn download_bundle(
        &self,
        reference: &ContentRef,
        _quality: Quality,
    ) -> Result<Acquisition> {
        let info = self.listing(reference.content_type, &reference.id).await?;
        self.bundle_downloads.fetch_add(1, Ordering::SeqCst);
        let bundle = FakeTrack {
            title: "Test Album",
            artist: "Various Artists",
            duration: 0,
        };
        let mut acquisition = self.acquire("bundle.zip", &bundle)?;
        acquisition.title = info.title;
        acquisition.artist = info.artist;
        Ok(acquisition)
    }
}

/// Spotify double that counts metadata calls.
struct FakeForeign {
    calls: AtomicUsize,
}

#[async_trait]
impl ForeignProvider for FakeForeign {
    async fn item(&self, _content_type: ContentType, _id: &str) -> Result<ForeignItem> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ForeignItem {
            title: String::from("One More Time"),
            primary_artist: String::from("Daft Punk"),
        })
    }

    async fn search_tracks(&self, _: &str, _: u32) -> Result<Vec<TrackInfo>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

/// Everything the transport was asked to send, in order.
#[derive(Clone, Debug, Eq, PartialEq)]
enum Sent {
    AudioFile { file_name: String },
    CachedAudio { file_id: String },
    DocumentFile { file_name: String },
    CachedDocument { file_id: String },
    Text(String),
}

struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    uploads: AtomicUsize,
}

impl RecordingTransport {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            uploads: AtomicUsize::new(0),
        }
    }

    fn record(&self, entry: Sent) {
        self.sent.lock().unwrap().push(entry);
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn next_file_id(&self) -> String {
        format!("file-{}", self.uploads.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_audio_file(
        &self,
        _user_id: i64,
        path: &Path,
        _meta: &AudioMeta,
    ) -> Result<Delivery> {
        assert!(path.exists(), "delivered path must exist: {path:?}");
        let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
        self.record(Sent::AudioFile {
            file_name: file_name.clone(),
        });
        Ok(Delivery {
            file_id: self.next_file_id(),
            file_name,
        })
    }

    async fn send_cached_audio(&self, _user_id: i64, file_id: &str, _meta: &AudioMeta) -> Result<()> {
        self.record(Sent::CachedAudio {
            file_id: file_id.to_owned(),
        });
        Ok(())
    }

    async fn send_document_file(
        &self,
        _user_id: i64,
        path: &Path,
        file_name: &str,
    ) -> Result<Delivery> {
        assert!(path.exists(), "delivered path must exist: {path:?}");
        self.record(Sent::DocumentFile {
            file_name: file_name.to_owned(),
        });
        Ok(Delivery {
            file_id: self.next_file_id(),
            file_name: file_name.to_owned(),
        })
    }

    async fn send_cached_document(&self, _user_id: i64, file_id: &str) -> Result<()> {
        self.record(Sent::CachedDocument {
            file_id: file_id.to_owned(),
        });
        Ok(())
    }

    async fn send_text(&self, _user_id: i64, text: &str) -> Result<()> {
        self.record(Sent::Text(text.to_owned()));
        Ok(())
    }
}

struct Harness {
    manager: DownloadManager,
    native: Arc<FakeNative>,
    foreign: Arc<FakeForeign>,
    transport: Arc<RecordingTransport>,
    settings: Arc<SettingsStore>,
}

fn harness_with(native: FakeNative) -> Harness {
    let conn = Arc::new(Mutex::new(
        Connection::open_in_memory().expect("in-memory database"),
    ));
    let settings = Arc::new(SettingsStore::new(Arc::clone(&conn)).expect("settings schema"));
    let cache = Arc::new(DownloadCache::new(conn).expect("cache schema"));

    let native = Arc::new(native);
    let foreign = Arc::new(FakeForeign {
        calls: AtomicUsize::new(0),
    });
    let transport = Arc::new(RecordingTransport::new());

    let manager = DownloadManager::new(
        Arc::clone(&native) as Arc<dyn NativeProvider>,
        Arc::clone(&foreign) as Arc<dyn ForeignProvider>,
        Arc::clone(&transport) as Arc<dyn Transport>,
        cache,
        Arc::clone(&settings),
    );

    Harness {
        manager,
        native,
        foreign,
        transport,
        settings,
    }
}

fn harness() -> Harness {
    harness_with(FakeNative::new())
}

fn tracks_mode(settings: &SettingsStore) {
    settings
        .set(
            USER,
            UserSettings {
                quality: Quality::MP3_320,
                bundle: false,
            },
        )
        .expect("settings");
}

#[tokio::test]
async fn downloads_a_track_then_serves_it_from_cache() {
    let h = harness();

    let first = h
        .manager
        .process_request(USER, "https://www.deezer.com/track/1341166")
        .await;
    assert!(first.success, "{}", first.message);
    assert_eq!(h.native.track_downloads.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.transport.sent(),
        vec![Sent::AudioFile {
            file_name: String::from("Daft Punk - One More Time.mp3"),
        }]
    );

    let second = h
        .manager
        .process_request(USER, "https://www.deezer.com/track/1341166")
        .await;
    assert!(second.success, "{}", second.message);

    // No second download; the stored file reference is re-sent.
    assert_eq!(h.native.track_downloads.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.transport.sent().last(),
        Some(&Sent::CachedAudio {
            file_id: String::from("file-1"),
        })
    );
}

#[tokio::test]
async fn album_tracks_are_delivered_in_catalog_order() {
    let h = harness();
    tracks_mode(&h.settings);

    let outcome = h
        .manager
        .process_request(USER, "https://www.deezer.com/album/302127")
        .await;
    assert!(outcome.success, "{}", outcome.message);

    assert_eq!(
        h.transport.sent(),
        vec![
            Sent::AudioFile {
                file_name: String::from("Kavinsky - Nightcall.mp3"),
            },
            Sent::AudioFile {
                file_name: String::from("Caribou - Odessa.mp3"),
            },
            Sent::AudioFile {
                file_name: String::from("M83 - Midnight City.mp3"),
            },
            Sent::DocumentFile {
                file_name: String::from("deezer_302127.m3u"),
            },
        ]
    );
}

#[tokio::test]
async fn repeated_album_request_reuses_every_track() {
    let h = harness();
    tracks_mode(&h.settings);

    h.manager
        .process_request(USER, "https://www.deezer.com/album/302127")
        .await;
    let outcome = h
        .manager
        .process_request(USER, "https://www.deezer.com/album/302127")
        .await;
    assert!(outcome.success, "{}", outcome.message);

    assert_eq!(h.native.track_downloads.load(Ordering::SeqCst), 3);

    // Re-sends keep the original catalog order.
    let replay: Vec<Sent> = h.transport.sent().split_off(4);
    assert_eq!(
        replay,
        vec![
            Sent::CachedAudio {
                file_id: String::from("file-1"),
            },
            Sent::CachedAudio {
                file_id: String::from("file-2"),
            },
            Sent::CachedAudio {
                file_id: String::from("file-3"),
            },
            Sent::DocumentFile {
                file_name: String::from("deezer_302127.m3u"),
            },
        ]
    );
}

#[tokio::test]
async fn one_failing_track_does_not_abort_the_batch() {
    let mut native = FakeNative::new();
    native.failing.insert("2");
    let h = harness_with(native);
    tracks_mode(&h.settings);

    let outcome = h
        .manager
        .process_request(USER, "https://www.deezer.com/album/302127")
        .await;
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.message, "Delivered 2 of 3 tracks.");
    assert_eq!(h.native.track_downloads.load(Ordering::SeqCst), 2);

    let sent = h.transport.sent();
    let notices: Vec<&Sent> = sent
        .iter()
        .filter(|entry| matches!(entry, Sent::Text(_)))
        .collect();
    assert_eq!(notices.len(), 1);
    assert!(matches!(notices[0], Sent::Text(text) if text.contains('2')));

    // The two delivered tracks still get a manifest.
    assert!(sent.iter().any(|entry| matches!(
        entry,
        Sent::DocumentFile { file_name } if file_name == "deezer_302127.m3u"
    )));
}

#[tokio::test]
async fn single_delivered_track_gets_no_manifest() {
    let mut native = FakeNative::new();
    native.failing.insert("1");
    native.failing.insert("3");
    let h = harness_with(native);
    tracks_mode(&h.settings);

    let outcome = h
        .manager
        .process_request(USER, "https://www.deezer.com/album/302127")
        .await;
    assert!(outcome.success, "{}", outcome.message);

    assert!(!h
        .transport
        .sent()
        .iter()
        .any(|entry| matches!(entry, Sent::DocumentFile { .. })));
}

#[tokio::test]
async fn albums_bundle_into_one_archive_by_default() {
    let h = harness();

    let outcome = h
        .manager
        .process_request(USER, "https://www.deezer.com/album/302127")
        .await;
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(h.native.bundle_downloads.load(Ordering::SeqCst), 1);
    assert_eq!(h.native.track_downloads.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.transport.sent(),
        vec![Sent::DocumentFile {
            file_name: String::from("Various Artists - Test Album.zip"),
        }]
    );

    let second = h
        .manager
        .process_request(USER, "https://www.deezer.com/album/302127")
        .await;
    assert!(second.success, "{}", second.message);
    assert_eq!(h.native.bundle_downloads.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.transport.sent().last(),
        Some(&Sent::CachedDocument {
            file_id: String::from("file-1"),
        })
    );
}

#[tokio::test]
async fn quality_change_reads_as_a_cache_miss() {
    let h = harness();

    h.manager
        .process_request(USER, "https://www.deezer.com/track/1341166")
        .await;
    assert_eq!(h.native.track_downloads.load(Ordering::SeqCst), 1);

    h.settings.set_quality(USER, Quality::FLAC).expect("quality");
    let outcome = h
        .manager
        .process_request(USER, "https://www.deezer.com/track/1341166")
        .await;
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(h.native.track_downloads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn bridges_spotify_tracks_through_catalog_search() {
    let mut native = FakeNative::new();
    native.search_hit = Some("1341166");
    let h = harness_with(native);

    let outcome = h
        .manager
        .process_request(
            USER,
            "https://open.spotify.com/track/0DiWol3AO6WpXZgp0goxAV",
        )
        .await;
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(h.foreign.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.native.track_downloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn bridges_spotify_albums_into_one_archive() {
    let mut native = FakeNative::new();
    native.search_hit = Some("302127");
    let h = harness_with(native);

    let outcome = h
        .manager
        .process_request(
            USER,
            "https://open.spotify.com/album/4aawyAB9vmqN3uQ7FjRGTy",
        )
        .await;
    assert!(outcome.success, "{}", outcome.message);

    // One metadata fetch, one archive download, no per-track downloads.
    assert_eq!(h.foreign.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.native.bundle_downloads.load(Ordering::SeqCst), 1);
    assert_eq!(h.native.track_downloads.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.transport.sent(),
        vec![Sent::DocumentFile {
            file_name: String::from("Various Artists - Test Album.zip"),
        }]
    );

    // The bridged reference hits the same cache row a Deezer link would.
    let second = h
        .manager
        .process_request(
            USER,
            "https://open.spotify.com/album/4aawyAB9vmqN3uQ7FjRGTy",
        )
        .await;
    assert!(second.success, "{}", second.message);
    assert_eq!(h.native.bundle_downloads.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.transport.sent().last(),
        Some(&Sent::CachedDocument {
            file_id: String::from("file-1"),
        })
    );
}

#[tokio::test]
async fn cached_and_fresh_tracks_keep_catalog_order() {
    let h = harness();
    tracks_mode(&h.settings);

    // Warm the cache with the album's middle track only.
    let single = h
        .manager
        .process_request(USER, "https://www.deezer.com/track/2")
        .await;
    assert!(single.success, "{}", single.message);
    assert_eq!(h.native.track_downloads.load(Ordering::SeqCst), 1);

    let outcome = h
        .manager
        .process_request(USER, "https://www.deezer.com/album/302127")
        .await;
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(h.native.track_downloads.load(Ordering::SeqCst), 3);

    // The cached track is re-sent in its listing position, not first
    // or last.
    let album_sends: Vec<Sent> = h.transport.sent().split_off(1);
    assert_eq!(
        album_sends,
        vec![
            Sent::AudioFile {
                file_name: String::from("Kavinsky - Nightcall.mp3"),
            },
            Sent::CachedAudio {
                file_id: String::from("file-1"),
            },
            Sent::AudioFile {
                file_name: String::from("M83 - Midnight City.mp3"),
            },
            Sent::DocumentFile {
                file_name: String::from("deezer_302127.m3u"),
            },
        ]
    );
}

#[tokio::test]
async fn rejects_spotify_playlists_before_any_network_call() {
    let h = harness();

    let outcome = h
        .manager
        .process_request(
            USER,
            "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M",
        )
        .await;
    assert!(!outcome.success);
    assert!(outcome.message.contains("not supported"));
    assert_eq!(h.foreign.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.native.track_downloads.load(Ordering::SeqCst), 0);
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn rejects_plain_text_and_unknown_links() {
    let h = harness();

    let outcome = h.manager.process_request(USER, "one more time").await;
    assert!(!outcome.success);

    let outcome = h
        .manager
        .process_request(USER, "https://example.com/track/123")
        .await;
    assert!(!outcome.success);

    assert_eq!(h.native.track_downloads.load(Ordering::SeqCst), 0);
    assert!(h.transport.sent().is_empty());
}
