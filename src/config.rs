//! Application configuration and secrets.
//!
//! Secrets (Deezer ARL, Spotify client credentials, Telegram bot token)
//! are loaded from a small TOML file that is size-checked before parsing.
//! Everything else is assembled at startup from the crate metadata and
//! command line arguments.

use std::{fs, path::PathBuf, str::FromStr};

use serde::Deserialize;
use veil::Redact;

use crate::{
    arl::Arl,
    error::{Error, Result},
};

/// Secrets as they appear in `secrets.toml`.
///
/// ```toml
/// arl = "..."
/// bot_token = "..."
/// spotify_client_id = "..."
/// spotify_client_secret = "..."
/// ```
#[derive(Clone, Deserialize, Redact)]
pub struct Secrets {
    /// Deezer ARL token, 192 hex characters.
    #[redact]
    pub arl: String,

    /// Telegram bot API token.
    #[redact]
    pub bot_token: String,

    /// Spotify application client ID.
    pub spotify_client_id: String,

    /// Spotify application client secret.
    #[redact]
    pub spotify_client_secret: String,
}

impl Secrets {
    /// Maximum size of the secrets file.
    ///
    /// Prevents an out-of-memory condition when pointed at the wrong file.
    const MAX_FILE_SIZE: u64 = 4096;

    /// Loads and parses the secrets file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read, is suspiciously
    /// large, or does not parse as TOML with the expected keys.
    pub fn from_file(path: &str) -> Result<Self> {
        let attributes = fs::metadata(path)?;
        if attributes.len() > Self::MAX_FILE_SIZE {
            return Err(Error::invalid_argument(format!("{path} is too large")));
        }

        let contents = fs::read_to_string(path)?;
        let secrets: Self = toml::from_str(&contents)?;
        Ok(secrets)
    }
}

/// Runtime configuration owned by `main` and shared with the clients.
#[derive(Clone, Debug)]
pub struct Config {
    /// Application name from crate metadata.
    pub app_name: String,

    /// Application version from crate metadata.
    pub app_version: String,

    /// Two-letter interface language.
    pub app_lang: String,

    /// `User-Agent` header sent on all provider API calls.
    pub user_agent: String,

    /// Validated Deezer ARL.
    pub arl: Arl,

    /// Telegram bot API token.
    pub bot_token: String,

    /// Spotify application client ID.
    pub spotify_client_id: String,

    /// Spotify application client secret.
    pub spotify_client_secret: String,

    /// External downloader executable, e.g. `deemix`.
    pub downloader: String,

    /// SQLite database location.
    pub db_path: PathBuf,

    /// Directory for in-flight downloads.
    pub downloads_dir: PathBuf,
}

impl Config {
    /// Builds a configuration from validated secrets.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the ARL fails validation.
    ///
    /// # Panics
    ///
    /// Panics when the crate name, version or language contain characters
    /// that cannot appear in a `User-Agent` header. These come from crate
    /// metadata, so this only fires on a broken build.
    pub fn new(secrets: &Secrets) -> Result<Self> {
        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();
        let app_lang = "en".to_owned();

        // Additional `User-Agent` string checks on top of `reqwest::HeaderValue`.
        let illegal_chars = |chr| chr == '/' || chr == ';';
        if app_name.is_empty()
            || app_name.contains(illegal_chars)
            || app_version.is_empty()
            || app_version.contains(illegal_chars)
            || app_lang.chars().count() != 2
            || app_lang.contains(illegal_chars)
        {
            panic!(
                "application name, version and/or language invalid (\"{app_name}\"; \"{app_version}\"; \"{app_lang}\")"
            );
        }

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_version = sysinfo::System::os_version().unwrap_or_else(|| String::from("0"));
        if os_name.is_empty()
            || os_name.contains(illegal_chars)
            || os_version.is_empty()
            || os_version.contains(illegal_chars)
        {
            panic!("os name and/or version invalid (\"{os_name}\"; \"{os_version}\")");
        }

        let user_agent =
            format!("{app_name}/{app_version} (Rust; {os_name}/{os_version}; Bot; {app_lang})");
        trace!("user agent: {user_agent}");

        Ok(Self {
            app_name,
            app_version,
            app_lang,

            user_agent,

            arl: Arl::from_str(&secrets.arl)?,
            bot_token: secrets.bot_token.clone(),
            spotify_client_id: secrets.spotify_client_id.clone(),
            spotify_client_secret: secrets.spotify_client_secret.clone(),

            downloader: String::from("deemix"),
            db_path: PathBuf::from("spotizer.db"),
            downloads_dir: std::env::temp_dir(),
        })
    }
}
