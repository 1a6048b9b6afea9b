//! Spotify Web API client.
//!
//! Spotify is the foreign catalog: it is only consulted for metadata
//! and search, never for audio. Authentication uses the client
//! credentials grant; the bearer token is cached and refreshed shortly
//! before it expires.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use base64::engine::{general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Url,
};

use crate::{
    config::Config,
    error::{Error, Result},
    http,
    link::ContentType,
    protocol::{self, spotify::{Album, SearchResults, TokenResponse, Track}},
    providers::{ForeignItem, ForeignProvider, TrackInfo},
};

/// A cached bearer token with its refresh deadline.
struct BearerToken {
    access_token: String,
    refresh_at: Instant,
}

/// Client for the Spotify Web API.
pub struct SpotifyClient {
    http_client: Arc<http::Client>,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<BearerToken>>,
}

impl SpotifyClient {
    /// Token endpoint for the client credentials grant.
    const TOKEN_URL: &'static str = "https://accounts.spotify.com/api/token";

    /// Base URL of the Web API.
    const API_URL: &'static str = "https://api.spotify.com/v1";

    /// Slack subtracted from the token lifetime so a token is never
    /// used right at its expiry.
    const TOKEN_EXPIRY_SLACK: Duration = Duration::from_secs(60);

    /// Creates a new client with the configured application credentials.
    #[must_use]
    pub fn new(config: &Config, http_client: Arc<http::Client>) -> Self {
        Self {
            http_client,
            client_id: config.spotify_client_id.clone(),
            client_secret: config.spotify_client_secret.clone(),
            token: Mutex::new(None),
        }
    }

    /// Returns a valid bearer token, refreshing it when needed.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` when Spotify rejects the application
    /// credentials.
    async fn bearer_token(&self) -> Result<String> {
        {
            let guard = self.token.lock()?;
            if let Some(ref token) = *guard {
                if Instant::now() < token.refresh_at {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let basic = BASE64.encode(format!("{}:{}", self.client_id, self.client_secret));
        let mut request = self
            .http_client
            .post(Url::parse(Self::TOKEN_URL)?, "grant_type=client_credentials");
        let headers = request.headers_mut();
        headers.insert(AUTHORIZATION, format!("Basic {basic}").parse().map_err(
            |e: reqwest::header::InvalidHeaderValue| Error::internal(e.to_string()),
        )?);
        headers.insert(
            CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/x-www-form-urlencoded"),
        );

        let response = self.http_client.execute(request).await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::unauthenticated("spotify rejected client credentials"));
        }

        let body = response.error_for_status()?.text().await?;
        let token: TokenResponse = protocol::json(&body, "spotify token")?;

        let refresh_at = Instant::now()
            + token
                .expires_in
                .saturating_sub(Self::TOKEN_EXPIRY_SLACK);
        let access_token = token.access_token.clone();

        let mut guard = self.token.lock()?;
        *guard = Some(BearerToken {
            access_token: token.access_token,
            refresh_at,
        });

        Ok(access_token)
    }

    /// Executes an authenticated GET against the Web API.
    async fn get(&self, url: Url, origin: &str) -> Result<String> {
        let bearer = self.bearer_token().await?;
        let mut request = self.http_client.get(url, "");
        request.headers_mut().insert(
            AUTHORIZATION,
            format!("Bearer {bearer}").parse().map_err(
                |e: reqwest::header::InvalidHeaderValue| Error::internal(e.to_string()),
            )?,
        );

        let response = self.http_client.execute(request).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::not_found(format!("{origin}: no such item")));
        }

        Ok(response.error_for_status()?.text().await?)
    }

    fn primary_artist(artists: &[protocol::spotify::Artist]) -> String {
        artists
            .first()
            .map_or_else(String::new, |artist| artist.name.clone())
    }
}

#[async_trait]
impl ForeignProvider for SpotifyClient {
    /// Fetches title and primary artist for a Spotify track or album.
    ///
    /// Playlists are never bridged, so asking for one is a programming
    /// error upstream and rejected here.
    async fn item(&self, content_type: ContentType, id: &str) -> Result<ForeignItem> {
        let url = match content_type {
            ContentType::Track => format!("{}/tracks/{id}", Self::API_URL),
            ContentType::Album => format!("{}/albums/{id}", Self::API_URL),
            ContentType::Playlist => {
                return Err(Error::invalid_argument(
                    "spotify playlists are not bridged",
                ))
            }
        };

        let body = self.get(Url::parse(&url)?, "spotify item").await?;
        match content_type {
            ContentType::Track => {
                let track: Track = protocol::json(&body, "spotify track")?;
                Ok(ForeignItem {
                    title: track.name,
                    primary_artist: Self::primary_artist(&track.artists),
                })
            }
            _ => {
                let album: Album = protocol::json(&body, "spotify album")?;
                Ok(ForeignItem {
                    title: album.name,
                    primary_artist: Self::primary_artist(&album.artists),
                })
            }
        }
    }

    /// Searches the Spotify catalog for tracks.
    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<TrackInfo>> {
        let mut url = Url::parse(&format!("{}/search", Self::API_URL))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("type", "track")
            .append_pair("limit", &limit.to_string());

        let body = self.get(url, "spotify search").await?;
        let results: SearchResults = protocol::json(&body, "spotify search")?;

        let Some(tracks) = results.tracks else {
            return Ok(Vec::new());
        };
        Ok(tracks
            .items
            .into_iter()
            .map(|track| TrackInfo {
                url: format!("https://open.spotify.com/track/{}", track.id),
                artist: Self::primary_artist(&track.artists),
                id: track.id,
                title: track.name,
                album: String::new(),
                duration: track.duration_ms,
            })
            .collect())
    }
}
