//! Provider interfaces consumed by the download flow.
//!
//! The orchestrator talks to the catalogs through these traits so that
//! the flow can be exercised against in-memory doubles. Production
//! implementations live in [`crate::deezer`] and [`crate::spotify`].

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use tempfile::TempDir;

use crate::{
    error::Result,
    link::{ContentRef, ContentType},
    settings::Quality,
};

/// Metadata for a single Deezer track.
#[derive(Clone, Debug)]
pub struct TrackInfo {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: Duration,
    pub url: String,
}

/// Metadata for an album or playlist, with its track listing in
/// provider order. That order is canonical for manifest numbering.
#[derive(Clone, Debug)]
pub struct ListingInfo {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub track_ids: Vec<String>,
}

/// Title and primary artist of a Spotify item, as needed for bridging.
#[derive(Clone, Debug)]
pub struct ForeignItem {
    pub title: String,
    pub primary_artist: String,
}

/// A freshly downloaded artifact on local disk.
///
/// The file lives inside a scoped working directory that is removed
/// when this value is dropped, on success and failure paths alike.
#[derive(Debug)]
pub struct Acquisition {
    /// Audio file or archive inside the working directory.
    pub path: PathBuf,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: Duration,

    /// Owns the on-disk working directory.
    _workdir: TempDir,
}

impl Acquisition {
    #[must_use]
    pub fn new(
        path: PathBuf,
        title: String,
        artist: String,
        album: String,
        duration: Duration,
        workdir: TempDir,
    ) -> Self {
        Self {
            path,
            title,
            artist,
            album,
            duration,
            _workdir: workdir,
        }
    }
}

/// The catalog audio is downloaded from (Deezer).
#[async_trait]
pub trait NativeProvider: Send + Sync {
    /// Fetches metadata for a single track.
    async fn track(&self, id: &str) -> Result<TrackInfo>;

    /// Fetches album/playlist metadata with its ordered track listing.
    async fn listing(&self, content_type: ContentType, id: &str) -> Result<ListingInfo>;

    /// Expands a reference to its ordered track IDs.
    ///
    /// A track expands to itself; albums and playlists expand to their
    /// listing order. Fails as a whole if the listing cannot be
    /// fetched, since the track count is unknown until then.
    async fn track_list(&self, content_type: ContentType, id: &str) -> Result<Vec<String>>;

    /// Searches the catalog, returning the first hit's ID if any.
    async fn search_first(&self, content_type: ContentType, query: &str)
        -> Result<Option<String>>;

    /// Downloads a single track at the given quality.
    async fn download_track(&self, id: &str, quality: Quality) -> Result<Acquisition>;

    /// Downloads an album or playlist as a single archive.
    async fn download_bundle(&self, reference: &ContentRef, quality: Quality)
        -> Result<Acquisition>;
}

/// The secondary catalog, used for search and metadata only (Spotify).
#[async_trait]
pub trait ForeignProvider: Send + Sync {
    /// Fetches title and primary artist for a track or album.
    async fn item(&self, content_type: ContentType, id: &str) -> Result<ForeignItem>;

    /// Searches the catalog for tracks, returning at most `limit` hits.
    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<TrackInfo>>;
}
