//! The download request flow.
//!
//! One [`DownloadManager::process_request`] call handles one pasted
//! link end to end: classify, bridge Spotify references onto Deezer,
//! check the cache, acquire whatever is missing, deliver, and record
//! deliveries for next time.
//!
//! # Flow
//!
//! 1. Generic URL syntax validation; plain text is rejected up front.
//! 2. Load the user's settings, falling back to defaults on a miss.
//! 3. Spotify links are bridged to Deezer (playlists rejected).
//! 4. Albums and playlists with bundling enabled take the bundle path:
//!    one cache key, one archive.
//! 5. Everything else expands to track IDs and is handled per track,
//!    sequentially and in catalog order. One failing track is reported
//!    and skipped; the batch carries on.
//!
//! A batch counts as successful when at least one item reached the
//! user. Cache reads that fail are treated as misses; cache writes
//! that fail are logged and ignored, because the user already has the
//! file by then.

use std::sync::Arc;

use crate::{
    bridge,
    cache::{CachedArtifact, DownloadCache, NewArtifact},
    error::Result,
    link::{self, ContentRef, ContentType, Resolution},
    manifest::{Entry, Manifest},
    providers::{Acquisition, ForeignProvider, NativeProvider},
    settings::{Quality, SettingsStore, UserSettings},
    transport::{AudioMeta, Transport},
};

/// Aggregate result of one request, as reported back to the routing
/// layer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Owns the collaborators for the download flow.
///
/// Clients are constructed once at startup and injected; the manager
/// holds no other state, so one instance serves all users.
pub struct DownloadManager {
    native: Arc<dyn NativeProvider>,
    foreign: Arc<dyn ForeignProvider>,
    transport: Arc<dyn Transport>,
    cache: Arc<DownloadCache>,
    settings: Arc<SettingsStore>,
}

impl DownloadManager {
    #[must_use]
    pub fn new(
        native: Arc<dyn NativeProvider>,
        foreign: Arc<dyn ForeignProvider>,
        transport: Arc<dyn Transport>,
        cache: Arc<DownloadCache>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self {
            native,
            foreign,
            transport,
            cache,
            settings,
        }
    }

    /// Handles one pasted link for one user.
    ///
    /// Never returns an error: every failure mode is folded into the
    /// [`Outcome`] so the routing layer only has to relay the message.
    pub async fn process_request(&self, user_id: i64, url: &str) -> Outcome {
        info!("processing download request from {user_id}: {url}");

        if !link::is_valid_url(url) {
            return Outcome::failed(
                "Invalid URL format. Please send a valid Deezer or Spotify link.",
            );
        }

        let settings = self.settings.get(user_id).unwrap_or_else(|e| {
            warn!("loading settings for {user_id}: {e}; using defaults");
            UserSettings::defaults()
        });

        let reference = match link::resolve(url) {
            Resolution::Deezer(reference) => reference,
            Resolution::Spotify(reference) => {
                match bridge::to_native(&reference, self.foreign.as_ref(), self.native.as_ref())
                    .await
                {
                    bridge::Outcome::Resolved(native) => native,
                    bridge::Outcome::Unsupported => {
                        return Outcome::failed(
                            "Spotify playlists are not supported yet. Please use a Deezer link.",
                        );
                    }
                    bridge::Outcome::Unresolvable(cause) => {
                        return Outcome::failed(format!(
                            "Couldn't match this Spotify link on Deezer: {cause}."
                        ));
                    }
                }
            }
            Resolution::NotRecognized => {
                return Outcome::failed(
                    "This link is not recognized. Send a Deezer or Spotify track, album or playlist link.",
                );
            }
        };

        if reference.content_type != ContentType::Track && settings.bundle {
            self.process_bundle(user_id, &reference, settings.quality)
                .await
        } else {
            self.process_tracks(user_id, &reference, settings.quality)
                .await
        }
    }

    /// Album/playlist as a single archive: one cache key, one download.
    async fn process_bundle(
        &self,
        user_id: i64,
        reference: &ContentRef,
        quality: Quality,
    ) -> Outcome {
        if let Some(hit) =
            self.cached(user_id, &reference.id, reference.content_type, quality)
        {
            debug!(
                "bundle cache hit for {} {}",
                reference.content_type, reference.id
            );
            return match self
                .transport
                .send_cached_document(user_id, &hit.file_id)
                .await
            {
                Ok(()) => Outcome::ok("Sent the archive from your download history."),
                Err(e) => {
                    error!("re-sending cached archive to {user_id}: {e}");
                    Outcome::failed("Couldn't re-send the cached archive.")
                }
            };
        }

        let acquisition = match self
            .native
            .download_bundle(reference, quality)
            .await
        {
            Ok(acquisition) => acquisition,
            Err(e) => {
                error!(
                    "downloading {} {}: {e}",
                    reference.content_type, reference.id
                );
                return Outcome::failed("The download failed. Please try again later.");
            }
        };

        let file_name = archive_file_name(&acquisition);
        let delivery = match self
            .transport
            .send_document_file(user_id, &acquisition.path, &file_name)
            .await
        {
            Ok(delivery) => delivery,
            Err(e) => {
                error!("delivering archive to {user_id}: {e}");
                return Outcome::failed("Couldn't deliver the archive.");
            }
        };

        self.record(
            user_id,
            &NewArtifact {
                content_id: &reference.id,
                content_type: reference.content_type,
                quality,
                file_id: &delivery.file_id,
                file_name: &delivery.file_name,
                title: &acquisition.title,
                artist: &acquisition.artist,
                album: &acquisition.album,
                duration: acquisition.duration,
                url: &reference.deezer_url(),
            },
        );

        Outcome::ok("Download completed successfully.")
    }

    /// Individual tracks, sequentially and in catalog order.
    async fn process_tracks(
        &self,
        user_id: i64,
        reference: &ContentRef,
        quality: Quality,
    ) -> Outcome {
        let track_ids = match self
            .native
            .track_list(reference.content_type, &reference.id)
            .await
        {
            Ok(track_ids) => track_ids,
            Err(e) => {
                // The track count is unknown until the listing call
                // succeeds, so there is nothing partial to salvage.
                error!(
                    "expanding {} {}: {e}",
                    reference.content_type, reference.id
                );
                return Outcome::failed("Couldn't fetch the track listing for this link.");
            }
        };

        let mut manifest = Manifest::new();
        let mut failures = 0_usize;

        for track_id in &track_ids {
            match self.process_one_track(user_id, track_id, quality).await
            {
                Ok(entry) => manifest.push(entry),
                Err(e) => {
                    warn!("track {track_id} for {user_id}: {e}");
                    failures += 1;
                    let notice = format!("Couldn't fetch track {track_id}, skipping it.");
                    if let Err(e) = self.transport.send_text(user_id, &notice).await {
                        error!("notifying {user_id} about track {track_id}: {e}");
                    }
                }
            }
        }

        if manifest.len() > 1 {
            if let Err(e) = self.deliver_manifest(user_id, reference, &manifest).await {
                error!("delivering manifest to {user_id}: {e}");
            }
        }

        if manifest.is_empty() {
            Outcome::failed("None of the tracks could be downloaded.")
        } else if failures > 0 {
            Outcome::ok(format!(
                "Delivered {} of {} tracks.",
                manifest.len(),
                track_ids.len()
            ))
        } else {
            Outcome::ok("Download completed successfully.")
        }
    }

    /// One track: cache hit re-send, or download, deliver and record.
    ///
    /// Tracks are cached as tracks regardless of whether they were
    /// requested directly or through a listing. The temporary download
    /// directory is dropped on every exit path.
    async fn process_one_track(
        &self,
        user_id: i64,
        track_id: &str,
        quality: Quality,
    ) -> Result<Entry> {
        if let Some(hit) = self.cached(user_id, track_id, ContentType::Track, quality) {
            debug!("track cache hit for {track_id}");
            let meta = AudioMeta {
                title: hit.title.clone(),
                performer: hit.artist.clone(),
                duration: hit.duration,
            };
            self.transport
                .send_cached_audio(user_id, &hit.file_id, &meta)
                .await?;
            return Ok(Entry {
                title: hit.title,
                duration: hit.duration,
                file_name: hit.file_name,
            });
        }

        let acquisition: Acquisition = self.native.download_track(track_id, quality).await?;

        let meta = AudioMeta {
            title: acquisition.title.clone(),
            performer: acquisition.artist.clone(),
            duration: acquisition.duration,
        };
        let delivery = self
            .transport
            .send_audio_file(user_id, &acquisition.path, &meta)
            .await?;

        self.record(
            user_id,
            &NewArtifact {
                content_id: track_id,
                content_type: ContentType::Track,
                quality,
                file_id: &delivery.file_id,
                file_name: &delivery.file_name,
                title: &acquisition.title,
                artist: &acquisition.artist,
                album: &acquisition.album,
                duration: acquisition.duration,
                url: &format!("https://www.deezer.com/track/{track_id}"),
            },
        );

        Ok(Entry {
            title: acquisition.title.clone(),
            duration: acquisition.duration,
            file_name: delivery.file_name,
        })
    }

    /// Writes the manifest to a temporary file and sends it as a
    /// document. The file is removed when the handle drops.
    async fn deliver_manifest(
        &self,
        user_id: i64,
        reference: &ContentRef,
        manifest: &Manifest,
    ) -> Result<()> {
        let file = tempfile::Builder::new()
            .prefix("spotizer-")
            .suffix(".m3u")
            .tempfile()?;
        tokio::fs::write(file.path(), manifest.render()).await?;

        let file_name = format!("deezer_{}.m3u", reference.id);
        self.transport
            .send_document_file(user_id, file.path(), &file_name)
            .await?;
        Ok(())
    }

    /// Cache read with fail-open semantics: an error reads as a miss
    /// and the item is downloaded again.
    fn cached(
        &self,
        user_id: i64,
        content_id: &str,
        content_type: ContentType,
        quality: Quality,
    ) -> Option<CachedArtifact> {
        match self.cache.lookup(user_id, content_id, content_type, quality) {
            Ok(hit) => hit,
            Err(e) => {
                warn!("cache lookup for {user_id}/{content_id}: {e}; treating as miss");
                None
            }
        }
    }

    /// Cache write that never fails the request: the user already has
    /// their file, so a lost record only risks a duplicate download.
    fn record(&self, user_id: i64, artifact: &NewArtifact<'_>) {
        if let Err(e) = self.cache.store(user_id, artifact) {
            error!(
                "recording download {}/{} for {user_id}: {e}",
                artifact.content_type, artifact.content_id
            );
        }
    }
}

/// File name for a delivered archive: `Artist - Title.zip`, with the
/// pieces that are empty left out.
fn archive_file_name(acquisition: &Acquisition) -> String {
    let name = if acquisition.artist.is_empty() {
        acquisition.title.clone()
    } else {
        format!("{} - {}", acquisition.artist, acquisition.title)
    };
    let name = sanitize_file_name(&name);
    if name.is_empty() {
        String::from("album.zip")
    } else {
        format!("{name}.zip")
    }
}

/// Strips characters that are unsafe in file names.
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect::<String>()
        .trim()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_archive_names() {
        assert_eq!(sanitize_file_name("AC/DC: Back?"), "ACDC Back");
        assert_eq!(sanitize_file_name("  plain  "), "plain");
    }
}
