//! Deezer catalog client and audio acquisition.
//!
//! Metadata, track listings and search go through the public
//! `api.deezer.com` JSON API. Audio itself is fetched by the configured
//! external downloader (a deemix-compatible CLI), invoked per request
//! into a scoped working directory:
//!
//! ```text
//! <downloader> -p <workdir> -b <bitrate> [-z] <url>
//! ```
//!
//! `-z` is passed for albums and playlists and asks the tool to leave a
//! single archive in the working directory. The directory is removed
//! when the resulting [`Acquisition`] is dropped, so partial downloads
//! never accumulate.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use reqwest::Url;
use tempfile::TempDir;
use tokio::process::Command;

use crate::{
    config::Config,
    error::{Error, Result},
    http,
    link::{ContentRef, ContentType},
    protocol::{
        self,
        deezer::{ApiError, Listing, SearchResults, Track},
    },
    providers::{Acquisition, ListingInfo, NativeProvider, TrackInfo},
    settings::Quality,
};

/// Client for the Deezer catalog and the external downloader.
pub struct DeezerClient {
    http_client: Arc<http::Client>,
    downloader: String,
    arl: String,
    downloads_dir: PathBuf,
}

impl DeezerClient {
    /// Base URL of the public API.
    const API_URL: &'static str = "https://api.deezer.com";

    /// Deezer's "no data" error code, returned for unknown IDs.
    const NO_DATA_CODE: i64 = 800;

    /// File extensions the downloader may produce for a single track.
    const AUDIO_EXTENSIONS: [&'static str; 2] = ["mp3", "flac"];

    /// Creates a new client.
    #[must_use]
    pub fn new(config: &Config, http_client: Arc<http::Client>) -> Self {
        Self {
            http_client,
            downloader: config.downloader.clone(),
            arl: config.arl.to_string(),
            downloads_dir: config.downloads_dir.clone(),
        }
    }

    /// Executes a GET against the public API.
    async fn get(&self, url: Url) -> Result<String> {
        let request = self.http_client.get(url, "");
        let response = self.http_client.execute(request).await?;
        Ok(response.error_for_status()?.text().await?)
    }

    /// Maps an in-band API error envelope onto our error kinds.
    fn api_error(error: &ApiError, origin: &str) -> Error {
        let message = format!("{origin}: {} ({})", error.message, error.typ);
        if error.code == Self::NO_DATA_CODE {
            Error::not_found(message)
        } else {
            Error::unavailable(message)
        }
    }

    /// Runs the external downloader into `workdir`.
    ///
    /// The downloader inherits the ARL through its environment rather
    /// than the command line, keeping the token out of process listings.
    async fn run_downloader(&self, workdir: &Path, quality: Quality, bundle: bool, url: &str) -> Result<()> {
        let mut command = Command::new(&self.downloader);
        command
            .env("DEEZER_ARL", &self.arl)
            .arg("-p")
            .arg(workdir)
            .arg("-b")
            .arg(quality.bitrate());
        if bundle {
            command.arg("-z");
        }
        command.arg(url);

        debug!("running downloader for {url}");
        let output = command.output().await.map_err(|e| {
            Error::unavailable(format!("could not launch downloader {}: {e}", self.downloader))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.lines().last().unwrap_or("").trim();
            return Err(Error::unavailable(format!(
                "downloader exited with {}: {last_line}",
                output.status
            )));
        }

        Ok(())
    }

    /// Finds the first file under `dir` (recursively) whose extension
    /// matches one of `extensions`.
    fn find_artifact(dir: &Path, extensions: &[&str]) -> Option<PathBuf> {
        let entries = std::fs::read_dir(dir).ok()?;
        let mut subdirs = Vec::new();

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                subdirs.push(path);
                continue;
            }
            if path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
            {
                return Some(path);
            }
        }

        subdirs
            .into_iter()
            .find_map(|subdir| Self::find_artifact(&subdir, extensions))
    }

    /// Creates a scoped working directory for one acquisition.
    fn workdir(&self) -> Result<TempDir> {
        Ok(tempfile::Builder::new()
            .prefix("spotizer-")
            .tempdir_in(&self.downloads_dir)?)
    }
}

#[async_trait]
impl NativeProvider for DeezerClient {
    async fn track(&self, id: &str) -> Result<TrackInfo> {
        let url = Url::parse(&format!("{}/track/{id}", Self::API_URL))?;
        let body = self.get(url).await?;
        let track: Track = protocol::json(&body, "deezer track")?;

        if let Some(ref error) = track.error {
            return Err(Self::api_error(error, "deezer track"));
        }

        Ok(TrackInfo {
            id: track.id.to_string(),
            title: track.title,
            artist: track.artist.name,
            album: track.album.title,
            duration: track.duration,
            url: track.link,
        })
    }

    async fn listing(&self, content_type: ContentType, id: &str) -> Result<ListingInfo> {
        if content_type == ContentType::Track {
            return Err(Error::invalid_argument("a track has no listing"));
        }

        let url = Url::parse(&format!("{}/{content_type}/{id}", Self::API_URL))?;
        let body = self.get(url).await?;
        let listing: Listing = protocol::json(&body, "deezer listing")?;

        if let Some(ref error) = listing.error {
            return Err(Self::api_error(error, "deezer listing"));
        }

        Ok(ListingInfo {
            id: listing.id.to_string(),
            artist: listing.artist_name().to_owned(),
            title: listing.title,
            track_ids: listing
                .tracks
                .data
                .iter()
                .map(|track| track.id.to_string())
                .collect(),
        })
    }

    async fn track_list(&self, content_type: ContentType, id: &str) -> Result<Vec<String>> {
        match content_type {
            ContentType::Track => Ok(vec![id.to_owned()]),
            ContentType::Album | ContentType::Playlist => {
                Ok(self.listing(content_type, id).await?.track_ids)
            }
        }
    }

    async fn search_first(
        &self,
        content_type: ContentType,
        query: &str,
    ) -> Result<Option<String>> {
        let mut url = Url::parse(&format!("{}/search/{content_type}", Self::API_URL))?;
        url.query_pairs_mut().append_pair("q", query);

        let body = self.get(url).await?;
        let results: SearchResults = protocol::json(&body, "deezer search")?;

        if let Some(ref error) = results.error {
            return Err(Self::api_error(error, "deezer search"));
        }

        Ok(results.data.first().map(|hit| hit.id.to_string()))
    }

    async fn download_track(&self, id: &str, quality: Quality) -> Result<Acquisition> {
        // Fetch metadata first: an unknown ID fails here, before any
        // time is spent on the downloader.
        let info = self.track(id).await?;

        let workdir = self.workdir()?;
        let track_url = format!("https://www.deezer.com/track/{id}");
        self.run_downloader(workdir.path(), quality, false, &track_url)
            .await?;

        let path = Self::find_artifact(workdir.path(), &Self::AUDIO_EXTENSIONS)
            .ok_or_else(|| {
                Error::data_loss(format!("downloader produced no audio file for track {id}"))
            })?;

        info!("downloaded track {id}: {} - {}", info.artist, info.title);
        Ok(Acquisition::new(
            path,
            info.title,
            info.artist,
            info.album,
            info.duration,
            workdir,
        ))
    }

    async fn download_bundle(
        &self,
        reference: &ContentRef,
        quality: Quality,
    ) -> Result<Acquisition> {
        let listing = self.listing(reference.content_type, &reference.id).await?;

        let workdir = self.workdir()?;
        self.run_downloader(workdir.path(), quality, true, &reference.deezer_url())
            .await?;

        let path = Self::find_artifact(workdir.path(), &["zip"]).ok_or_else(|| {
            Error::data_loss(format!(
                "downloader produced no archive for {} {}",
                reference.content_type, reference.id
            ))
        })?;

        info!(
            "downloaded {} {}: {} ({} tracks)",
            reference.content_type,
            reference.id,
            listing.title,
            listing.track_ids.len()
        );
        Ok(Acquisition::new(
            path,
            listing.title,
            listing.artist,
            String::new(),
            std::time::Duration::ZERO,
            workdir,
        ))
    }
}
