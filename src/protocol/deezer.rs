//! Deezer public API types.
//!
//! Covers the subset of `api.deezer.com` that the bot uses: single-item
//! metadata, track listings for albums and playlists, and catalog search.
//!
//! # Wire Format
//!
//! Track response:
//! ```json
//! {
//!     "id": 1341166,
//!     "title": "One More Time",
//!     "link": "https://www.deezer.com/track/1341166",
//!     "duration": 320,
//!     "artist": { "name": "Daft Punk" },
//!     "album": { "title": "Discovery" }
//! }
//! ```
//!
//! Album and playlist responses embed their tracks:
//! ```json
//! {
//!     "id": 302127,
//!     "title": "Discovery",
//!     "artist": { "name": "Daft Punk" },
//!     "tracks": { "data": [{ "id": 1341166, ... }] }
//! }
//! ```
//!
//! Errors come back with HTTP 200 and an error envelope instead of the
//! payload, so every response type carries an optional `error` field.

use std::time::Duration;

use serde::Deserialize;
use serde_with::{formats::Flexible, serde_as, DurationSeconds};

/// Error envelope returned in-band by the Deezer API.
#[derive(Clone, Debug, Deserialize)]
pub struct ApiError {
    /// Error class, e.g. `DataException`.
    #[serde(default, rename = "type")]
    pub typ: String,

    /// Human-readable message.
    #[serde(default)]
    pub message: String,

    /// Numeric error code, e.g. 800 for "no data".
    #[serde(default)]
    pub code: i64,
}

/// Artist as embedded in track, album and search responses.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Artist {
    #[serde(default)]
    pub name: String,
}

/// Album as embedded in track responses.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AlbumRef {
    #[serde(default)]
    pub title: String,
}

/// A single track, from `/track/{id}` or embedded in a listing.
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: u64,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub link: String,

    #[serde_as(as = "DurationSeconds<u64, Flexible>")]
    #[serde(default)]
    pub duration: Duration,

    #[serde(default)]
    pub artist: Artist,

    #[serde(default)]
    pub album: AlbumRef,

    pub error: Option<ApiError>,
}

/// Embedded track listing of an album or playlist.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TrackList {
    #[serde(default)]
    pub data: Vec<Track>,
}

/// Album or playlist metadata with its full track listing.
///
/// Playlists carry a `creator` instead of an `artist`; both are mapped
/// here and the first one present wins.
#[derive(Clone, Debug, Deserialize)]
pub struct Listing {
    #[serde(default)]
    pub id: u64,

    #[serde(default)]
    pub title: String,

    pub artist: Option<Artist>,

    /// Playlist owner, Deezer's name for the same concept.
    pub creator: Option<Artist>,

    #[serde(default)]
    pub tracks: TrackList,

    pub error: Option<ApiError>,
}

impl Listing {
    /// Artist or playlist creator name, whichever is present.
    #[must_use]
    pub fn artist_name(&self) -> &str {
        self.artist
            .as_ref()
            .or(self.creator.as_ref())
            .map_or("", |artist| artist.name.as_str())
    }
}

/// A search hit from `/search/track` or `/search/album`.
#[derive(Clone, Debug, Deserialize)]
pub struct SearchHit {
    pub id: u64,

    /// Track title or album title, depending on the scope.
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub artist: Artist,
}

/// Response from the search endpoints.
#[derive(Clone, Debug, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub data: Vec<SearchHit>,

    #[serde(default)]
    pub total: u64,

    pub error: Option<ApiError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_track_response() {
        let body = r#"{
            "id": 1341166,
            "title": "One More Time",
            "link": "https://www.deezer.com/track/1341166",
            "duration": 320,
            "artist": { "name": "Daft Punk" },
            "album": { "title": "Discovery" }
        }"#;

        let track: Track = serde_json::from_str(body).expect("track should parse");
        assert_eq!(track.id, 1_341_166);
        assert_eq!(track.duration, Duration::from_secs(320));
        assert_eq!(track.artist.name, "Daft Punk");
        assert!(track.error.is_none());
    }

    #[test]
    fn parses_playlist_listing_with_creator() {
        let body = r#"{
            "id": 908622995,
            "title": "Rock Classics",
            "creator": { "name": "deezer-rock" },
            "tracks": { "data": [
                { "id": 1, "title": "A", "duration": 100 },
                { "id": 2, "title": "B", "duration": 200 }
            ]}
        }"#;

        let listing: Listing = serde_json::from_str(body).expect("listing should parse");
        assert_eq!(listing.artist_name(), "deezer-rock");
        let ids: Vec<u64> = listing.tracks.data.iter().map(|t| t.id).collect();
        assert_eq!(ids, [1, 2]);
    }

    #[test]
    fn parses_error_envelope() {
        let body = r#"{
            "error": { "type": "DataException", "message": "no data", "code": 800 }
        }"#;

        let track: Track = serde_json::from_str(body).expect("envelope should parse");
        let error = track.error.expect("error should be set");
        assert_eq!(error.code, 800);
    }
}
