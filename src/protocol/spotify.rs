//! Spotify Web API types.
//!
//! Covers the client-credentials token grant, single-item metadata and
//! catalog search.
//!
//! # Wire Format
//!
//! Token grant:
//! ```json
//! {
//!     "access_token": "NgCXRK...MzYjw",
//!     "token_type": "Bearer",
//!     "expires_in": 3600
//! }
//! ```
//!
//! Track metadata (abridged):
//! ```json
//! {
//!     "id": "11dFghVXANMlKmJXsNCbNl",
//!     "name": "Cut To The Feeling",
//!     "artists": [{ "name": "Carly Rae Jepsen" }],
//!     "duration_ms": 207959
//! }
//! ```

use std::time::Duration;

use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use veil::Redact;

/// Response to a client-credentials token request.
#[serde_as]
#[derive(Clone, Deserialize, Redact)]
pub struct TokenResponse {
    /// Bearer token for subsequent API calls.
    #[redact]
    pub access_token: String,

    /// Always `Bearer` for this grant.
    #[serde(default)]
    pub token_type: String,

    /// Token lifetime, typically one hour.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub expires_in: Duration,
}

/// Artist as embedded in tracks and albums.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Artist {
    #[serde(default)]
    pub name: String,
}

/// A Spotify track, from `/v1/tracks/{id}` or a search page.
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Ordered; the first entry is the primary artist.
    #[serde(default)]
    pub artists: Vec<Artist>,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default)]
    pub duration_ms: Duration,
}

/// A Spotify album, from `/v1/albums/{id}`.
#[derive(Clone, Debug, Deserialize)]
pub struct Album {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub artists: Vec<Artist>,
}

/// One page of search results.
#[derive(Clone, Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,

    #[serde(default)]
    pub total: u64,
}

/// Response from `/v1/search`.
///
/// Only the scopes we request are present; the others stay `None`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchResults {
    pub tracks: Option<Page<Track>>,
    pub albums: Option<Page<Album>>,
}
