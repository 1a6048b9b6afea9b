//! Per-user download settings.
//!
//! Settings live in the same SQLite database as the download cache. A
//! user with no settings row gets the defaults; a missing row never
//! blocks a download request.

use std::{
    fmt,
    str::FromStr,
    sync::{Arc, Mutex},
};

use rusqlite::{params, Connection, OptionalExtension};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::error::{Error, Result};

/// Audio quality tier.
///
/// Deezer format names; the external downloader takes the matching
/// bitrate argument.
#[expect(non_camel_case_types)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Quality {
    /// 128 kbps MP3
    MP3_128,
    /// 320 kbps MP3 (default)
    #[default]
    MP3_320,
    /// FLAC lossless
    FLAC,
}

impl Quality {
    /// Bitrate argument for the external downloader.
    #[must_use]
    pub fn bitrate(self) -> &'static str {
        match self {
            Self::MP3_128 => "128",
            Self::MP3_320 => "320",
            Self::FLAC => "flac",
        }
    }
}

impl fmt::Display for Quality {
    /// Shows the format name (e.g. "`MP3_320`", "FLAC") matching the
    /// representation stored in the database.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MP3_128 => "MP3_128",
            Self::MP3_320 => "MP3_320",
            Self::FLAC => "FLAC",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Quality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "MP3_128" => Ok(Self::MP3_128),
            "MP3_320" => Ok(Self::MP3_320),
            "FLAC" => Ok(Self::FLAC),
            other => Err(Error::invalid_argument(format!(
                "unknown quality tier: {other}"
            ))),
        }
    }
}

/// A user's download preferences.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct UserSettings {
    /// Quality tier for new downloads.
    pub quality: Quality,

    /// Bundle albums and playlists into a single archive.
    pub bundle: bool,
}

impl UserSettings {
    /// Defaults used when a user has no settings row.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            quality: Quality::default(),
            bundle: true,
        }
    }
}

/// SQLite-backed settings store.
pub struct SettingsStore {
    conn: Arc<Mutex<Connection>>,
}

impl SettingsStore {
    /// Opens the store on a shared connection, creating the table when
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns an error when the schema cannot be created.
    pub fn new(conn: Arc<Mutex<Connection>>) -> Result<Self> {
        {
            let guard = conn.lock()?;
            guard.execute(
                "CREATE TABLE IF NOT EXISTS user_settings (
                    user_id INTEGER PRIMARY KEY,
                    quality TEXT NOT NULL,
                    bundle INTEGER NOT NULL
                )",
                [],
            )?;
            guard.execute(
                "CREATE TABLE IF NOT EXISTS users (
                    user_id INTEGER PRIMARY KEY,
                    username TEXT,
                    first_seen TEXT NOT NULL
                )",
                [],
            )?;
        }
        Ok(Self { conn })
    }

    /// Records a user on first contact. Later calls are no-ops, so the
    /// `first_seen` timestamp stays at the actual first contact.
    ///
    /// # Errors
    ///
    /// Returns an error when the row cannot be written.
    pub fn register_user(&self, user_id: i64, username: Option<&str>) -> Result<()> {
        let first_seen = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();

        let guard = self.conn.lock()?;
        let inserted = guard.execute(
            "INSERT OR IGNORE INTO users (user_id, username, first_seen)
             VALUES (?1, ?2, ?3)",
            params![user_id, username, first_seen],
        )?;
        if inserted > 0 {
            info!("new user {user_id} ({})", username.unwrap_or("no username"));
        }
        Ok(())
    }

    /// Returns the user's settings, or the defaults when no row exists.
    ///
    /// # Errors
    ///
    /// Returns an error only for database failures; a missing row is
    /// not a failure.
    pub fn get(&self, user_id: i64) -> Result<UserSettings> {
        let guard = self.conn.lock()?;
        let row = guard
            .query_row(
                "SELECT quality, bundle FROM user_settings WHERE user_id = ?1",
                params![user_id],
                |row| {
                    let quality: String = row.get(0)?;
                    let bundle: bool = row.get(1)?;
                    Ok((quality, bundle))
                },
            )
            .optional()?;

        match row {
            Some((quality, bundle)) => Ok(UserSettings {
                quality: quality.parse()?,
                bundle,
            }),
            None => Ok(UserSettings::defaults()),
        }
    }

    /// Stores the user's quality tier, keeping the bundle preference.
    ///
    /// # Errors
    ///
    /// Returns an error when the row cannot be written.
    pub fn set_quality(&self, user_id: i64, quality: Quality) -> Result<()> {
        let current = self.get(user_id)?;
        self.set(
            user_id,
            UserSettings {
                quality,
                ..current
            },
        )
    }

    /// Flips the user's bundle preference and returns the new value.
    ///
    /// # Errors
    ///
    /// Returns an error when the row cannot be written.
    pub fn toggle_bundle(&self, user_id: i64) -> Result<bool> {
        let current = self.get(user_id)?;
        let bundle = !current.bundle;
        self.set(user_id, UserSettings { bundle, ..current })?;
        Ok(bundle)
    }

    /// Writes the full settings row for a user.
    ///
    /// # Errors
    ///
    /// Returns an error when the row cannot be written.
    pub fn set(&self, user_id: i64, settings: UserSettings) -> Result<()> {
        let guard = self.conn.lock()?;
        guard.execute(
            "INSERT INTO user_settings (user_id, quality, bundle)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id) DO UPDATE SET
                quality = excluded.quality,
                bundle = excluded.bundle",
            params![user_id, settings.quality.to_string(), settings.bundle],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SettingsStore {
        let conn = Connection::open_in_memory().expect("in-memory database");
        SettingsStore::new(Arc::new(Mutex::new(conn))).expect("schema")
    }

    #[test]
    fn defaults_on_missing_row() {
        let store = store();
        let settings = store.get(1).expect("get");
        assert_eq!(settings.quality, Quality::MP3_320);
        assert!(settings.bundle);
    }

    #[test]
    fn set_and_get_roundtrip() {
        let store = store();
        store
            .set(
                7,
                UserSettings {
                    quality: Quality::FLAC,
                    bundle: false,
                },
            )
            .expect("set");

        let settings = store.get(7).expect("get");
        assert_eq!(settings.quality, Quality::FLAC);
        assert!(!settings.bundle);
    }

    #[test]
    fn set_quality_keeps_bundle_preference() {
        let store = store();
        store.toggle_bundle(3).expect("toggle");
        store.set_quality(3, Quality::MP3_128).expect("set quality");

        let settings = store.get(3).expect("get");
        assert_eq!(settings.quality, Quality::MP3_128);
        assert!(!settings.bundle);
    }

    #[test]
    fn toggle_bundle_flips_both_ways() {
        let store = store();
        assert!(!store.toggle_bundle(5).expect("first toggle"));
        assert!(store.toggle_bundle(5).expect("second toggle"));
    }

    #[test]
    fn registration_is_idempotent() {
        let store = store();
        store.register_user(9, Some("alice")).expect("first contact");
        store.register_user(9, None).expect("second contact");
        store.register_user(9, Some("bob")).expect("third contact");
    }

    #[test]
    fn quality_parses_stored_names() {
        for quality in [Quality::MP3_128, Quality::MP3_320, Quality::FLAC] {
            assert_eq!(
                quality.to_string().parse::<Quality>().expect("roundtrip"),
                quality
            );
        }
        assert!("OGG_VORBIS".parse::<Quality>().is_err());
    }
}
