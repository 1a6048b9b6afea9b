//! Bridging Spotify references onto the Deezer catalog.
//!
//! Spotify never serves audio here; a Spotify link is translated to its
//! Deezer equivalent by searching the Deezer catalog for
//! `"{title} {primary artist}"` and taking the first hit. That match is
//! best-effort, not verified identity.
//!
//! Spotify playlists are rejected outright, before any network call.
//! That is a product restriction, not a technical one: playlist
//! contents differ too much between catalogs for a title search to
//! mean anything.

use std::fmt;

use crate::{
    link::{ContentRef, ContentType, Provider},
    providers::{ForeignProvider, NativeProvider},
};

/// Why a reference could not be bridged.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Unresolvable {
    /// The Spotify metadata fetch failed.
    MetadataFetch,
    /// Deezer search returned no results for the title/artist query.
    NoEquivalent,
}

impl fmt::Display for Unresolvable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MetadataFetch => "metadata fetch failed",
            Self::NoEquivalent => "no equivalent found",
        };
        write!(f, "{s}")
    }
}

/// Outcome of a bridge attempt.
///
/// Callers must branch on every case; none of these are errors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The Deezer reference to continue with.
    Resolved(ContentRef),
    /// Spotify playlists are never bridged.
    Unsupported,
    /// No Deezer equivalent could be determined.
    Unresolvable(Unresolvable),
}

/// Bridges a Spotify reference onto the Deezer catalog.
///
/// Only tracks and albums are supported. The caller reports an
/// [`Outcome::Unresolvable`] to the user and aborts the current
/// request; the bot session itself is unaffected.
pub async fn to_native(
    reference: &ContentRef,
    foreign: &dyn ForeignProvider,
    native: &dyn NativeProvider,
) -> Outcome {
    if reference.content_type == ContentType::Playlist {
        return Outcome::Unsupported;
    }

    let item = match foreign.item(reference.content_type, &reference.id).await {
        Ok(item) => item,
        Err(e) => {
            warn!("bridging {} {}: {e}", reference.content_type, reference.id);
            return Outcome::Unresolvable(Unresolvable::MetadataFetch);
        }
    };

    let query = format!("{} {}", item.title, item.primary_artist);
    match native.search_first(reference.content_type, &query).await {
        Ok(Some(id)) => Outcome::Resolved(ContentRef {
            provider: Provider::Deezer,
            content_type: reference.content_type,
            id,
        }),
        Ok(None) => {
            warn!("no deezer equivalent for \"{query}\"");
            Outcome::Unresolvable(Unresolvable::NoEquivalent)
        }
        Err(e) => {
            warn!("deezer search for \"{query}\": {e}");
            Outcome::Unresolvable(Unresolvable::NoEquivalent)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::{
        error::{Error, Result},
        providers::{Acquisition, ForeignItem, ListingInfo, TrackInfo},
        settings::Quality,
    };

    struct FakeSpotify {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ForeignProvider for FakeSpotify {
        async fn item(&self, _: ContentType, _: &str) -> Result<ForeignItem> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::unavailable("spotify is down"));
            }
            Ok(ForeignItem {
                title: String::from("Discovery"),
                primary_artist: String::from("Daft Punk"),
            })
        }

        async fn search_tracks(&self, _: &str, _: u32) -> Result<Vec<TrackInfo>> {
            unimplemented!("not used by the bridge")
        }
    }

    struct FakeDeezer {
        calls: AtomicUsize,
        hit: Option<&'static str>,
        seen_query: std::sync::Mutex<String>,
    }

    #[async_trait]
    impl NativeProvider for FakeDeezer {
        async fn track(&self, _: &str) -> Result<TrackInfo> {
            unimplemented!("not used by the bridge")
        }

        async fn listing(&self, _: ContentType, _: &str) -> Result<ListingInfo> {
            unimplemented!("not used by the bridge")
        }

        async fn track_list(&self, _: ContentType, _: &str) -> Result<Vec<String>> {
            unimplemented!("not used by the bridge")
        }

        async fn search_first(&self, _: ContentType, query: &str) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen_query.lock().unwrap() = query.to_owned();
            Ok(self.hit.map(str::to_owned))
        }

        async fn download_track(&self, _: &str, _: Quality) -> Result<Acquisition> {
            unimplemented!("not used by the bridge")
        }

        async fn download_bundle(&self, _: &ContentRef, _: Quality) -> Result<Acquisition> {
            unimplemented!("not used by the bridge")
        }
    }

    fn spotify_ref(content_type: ContentType) -> ContentRef {
        ContentRef {
            provider: Provider::Spotify,
            content_type,
            id: String::from("4aawyAB9vmqN3uQ7FjRGTy"),
        }
    }

    #[tokio::test]
    async fn resolves_album_through_title_artist_search() {
        let spotify = FakeSpotify {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let deezer = FakeDeezer {
            calls: AtomicUsize::new(0),
            hit: Some("302127"),
            seen_query: std::sync::Mutex::new(String::new()),
        };

        let outcome = to_native(&spotify_ref(ContentType::Album), &spotify, &deezer).await;
        assert_eq!(
            outcome,
            Outcome::Resolved(ContentRef {
                provider: Provider::Deezer,
                content_type: ContentType::Album,
                id: String::from("302127"),
            })
        );
        assert_eq!(*deezer.seen_query.lock().unwrap(), "Discovery Daft Punk");
    }

    #[tokio::test]
    async fn rejects_playlists_before_any_call() {
        let spotify = FakeSpotify {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let deezer = FakeDeezer {
            calls: AtomicUsize::new(0),
            hit: Some("1"),
            seen_query: std::sync::Mutex::new(String::new()),
        };

        let outcome = to_native(&spotify_ref(ContentType::Playlist), &spotify, &deezer).await;
        assert_eq!(outcome, Outcome::Unsupported);
        assert_eq!(spotify.calls.load(Ordering::SeqCst), 0);
        assert_eq!(deezer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn metadata_failure_is_unresolvable() {
        let spotify = FakeSpotify {
            calls: AtomicUsize::new(0),
            fail: true,
        };
        let deezer = FakeDeezer {
            calls: AtomicUsize::new(0),
            hit: Some("1"),
            seen_query: std::sync::Mutex::new(String::new()),
        };

        let outcome = to_native(&spotify_ref(ContentType::Track), &spotify, &deezer).await;
        assert_eq!(
            outcome,
            Outcome::Unresolvable(Unresolvable::MetadataFetch)
        );
        assert_eq!(deezer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_search_is_unresolvable() {
        let spotify = FakeSpotify {
            calls: AtomicUsize::new(0),
            fail: false,
        };
        let deezer = FakeDeezer {
            calls: AtomicUsize::new(0),
            hit: None,
            seen_query: std::sync::Mutex::new(String::new()),
        };

        let outcome = to_native(&spotify_ref(ContentType::Track), &spotify, &deezer).await;
        assert_eq!(outcome, Outcome::Unresolvable(Unresolvable::NoEquivalent));
    }
}
