//! Link classification for Deezer and Spotify URLs.
//!
//! Incoming links are parsed as URLs first; the host selects the
//! provider and the path is matched against a fixed set of patterns to
//! classify the content as track, album or playlist and extract the
//! content ID. Matching the host separately keeps a provider URL
//! smuggled into another site's query string from classifying. The
//! patterns are disjoint on the path keyword, so at most one can
//! match; a locale prefix segment (`deezer.com/en/track/...`) is
//! accepted for Deezer links.
//!
//! Classification never fails with an error: an unrecognized link is an
//! explicit [`Resolution::NotRecognized`] outcome that callers branch on.

use std::{fmt, str::FromStr, sync::OnceLock};

use regex_lite::Regex;

use crate::error::{Error, Result};

/// What a link points at.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ContentType {
    /// A single track.
    Track,
    /// A full album.
    Album,
    /// A user playlist.
    Playlist,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Track => "track",
            Self::Album => "album",
            Self::Playlist => "playlist",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "track" => Ok(Self::Track),
            "album" => Ok(Self::Album),
            "playlist" => Ok(Self::Playlist),
            other => Err(Error::invalid_argument(format!(
                "unknown content type: {other}"
            ))),
        }
    }
}

/// Which catalog a reference belongs to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Provider {
    /// Deezer, the catalog audio is downloaded from.
    Deezer,
    /// Spotify, used for search and metadata only.
    Spotify,
}

/// A parsed reference to provider content.
///
/// Immutable once parsed. Deezer IDs are numeric, Spotify IDs are
/// base-62 strings; both are carried as strings since every consumer
/// (API paths, cache keys) wants them that way.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ContentRef {
    pub provider: Provider,
    pub content_type: ContentType,
    pub id: String,
}

impl ContentRef {
    /// The canonical Deezer URL for this reference.
    ///
    /// Only meaningful for Deezer references; used to hand a clean URL
    /// to the external downloader regardless of what the user pasted.
    #[must_use]
    pub fn deezer_url(&self) -> String {
        format!("https://www.deezer.com/{}/{}", self.content_type, self.id)
    }
}

/// Outcome of classifying a link.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Resolution {
    /// A Deezer link, ready for expansion and download.
    Deezer(ContentRef),
    /// A Spotify link, needs bridging to the Deezer catalog first.
    Spotify(ContentRef),
    /// Syntactically a URL, but not a link we know how to handle.
    NotRecognized,
}

/// Per-provider path patterns, ordered track / album / playlist.
///
/// Matched against the parsed URL's path only, anchored at its start;
/// first match wins, and the path keywords make the patterns disjoint.
fn deezer_patterns() -> &'static [(ContentType, Regex)] {
    static PATTERNS: OnceLock<Vec<(ContentType, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (ContentType::Track, r"^(?:/[a-z]{2})?/track/(\d+)"),
            (ContentType::Album, r"^(?:/[a-z]{2})?/album/(\d+)"),
            (ContentType::Playlist, r"^(?:/[a-z]{2})?/playlist/(\d+)"),
        ]
        .into_iter()
        .map(|(typ, pattern)| {
            (
                typ,
                Regex::new(pattern).expect("deezer link pattern should compile"),
            )
        })
        .collect()
    })
}

fn spotify_patterns() -> &'static [(ContentType, Regex)] {
    static PATTERNS: OnceLock<Vec<(ContentType, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (ContentType::Track, r"^/track/([a-zA-Z0-9]+)"),
            (ContentType::Album, r"^/album/([a-zA-Z0-9]+)"),
            (ContentType::Playlist, r"^/playlist/([a-zA-Z0-9]+)"),
        ]
        .into_iter()
        .map(|(typ, pattern)| {
            (
                typ,
                Regex::new(pattern).expect("spotify link pattern should compile"),
            )
        })
        .collect()
    })
}

/// Whether the host is Deezer proper or one of its subdomains.
fn is_deezer_host(host: &str) -> bool {
    host == "deezer.com" || host.ends_with(".deezer.com")
}

/// Checks that the input is a syntactically valid absolute URL.
///
/// This is the generic validation gate that runs before classification;
/// plain text short-circuits to a user-facing "invalid link" message.
#[must_use]
pub fn is_valid_url(input: &str) -> bool {
    url::Url::parse(input).is_ok_and(|url| url.has_host())
}

/// Classifies a link as Deezer or Spotify content.
///
/// The host decides the provider before any pattern runs, so provider
/// paths appearing in another site's query string never classify. The
/// input should already have passed [`is_valid_url`]; anything else
/// simply comes back as [`Resolution::NotRecognized`].
#[must_use]
pub fn resolve(input: &str) -> Resolution {
    let Ok(url) = url::Url::parse(input) else {
        return Resolution::NotRecognized;
    };
    let Some(host) = url.host_str() else {
        return Resolution::NotRecognized;
    };
    let path = url.path();

    if is_deezer_host(host) {
        for (content_type, pattern) in deezer_patterns() {
            if let Some(captures) = pattern.captures(path) {
                return Resolution::Deezer(ContentRef {
                    provider: Provider::Deezer,
                    content_type: *content_type,
                    id: captures[1].to_owned(),
                });
            }
        }
    } else if host == "open.spotify.com" {
        for (content_type, pattern) in spotify_patterns() {
            if let Some(captures) = pattern.captures(path) {
                return Resolution::Spotify(ContentRef {
                    provider: Provider::Spotify,
                    content_type: *content_type,
                    id: captures[1].to_owned(),
                });
            }
        }
    }

    Resolution::NotRecognized
}
