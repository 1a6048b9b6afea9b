//! Download cache backed by SQLite.
//!
//! Every delivered artifact is recorded under its cache key so that a
//! repeated request can be served from the transport's stored file
//! reference without touching the providers again.
//!
//! # Key Invariant
//!
//! The table enforces uniqueness on `(user_id, content_id, content_type)`
//! and writes upsert in place. Quality is stored but not part of the
//! key: re-downloading the same content at a different quality replaces
//! the cached pointer rather than adding a second row. Lookups filter
//! on quality, so a quality change reads as a miss and the subsequent
//! store overwrites the old row.
//!
//! Rows are keyed per user, so concurrent requests from different users
//! never contend for the same row.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rusqlite::{params, Connection, OptionalExtension, Row};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{
    error::Result,
    link::ContentType,
    settings::Quality,
};

/// A previously delivered artifact.
///
/// `file_id` is the transport's opaque handle for the uploaded file,
/// not a filesystem path; re-delivery reuses it without re-uploading.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedArtifact {
    pub content_id: String,
    pub content_type: ContentType,
    pub quality: Quality,
    pub file_id: String,
    pub file_name: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: Duration,
    pub url: String,
    pub stored_at: OffsetDateTime,
}

/// What to record after a successful delivery.
#[derive(Clone, Debug)]
pub struct NewArtifact<'a> {
    pub content_id: &'a str,
    pub content_type: ContentType,
    pub quality: Quality,
    pub file_id: &'a str,
    pub file_name: &'a str,
    pub title: &'a str,
    pub artist: &'a str,
    pub album: &'a str,
    pub duration: Duration,
    pub url: &'a str,
}

/// SQLite-backed download cache.
pub struct DownloadCache {
    conn: Arc<Mutex<Connection>>,
}

impl DownloadCache {
    /// Opens the cache on a shared connection, creating the table when
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns an error when the schema cannot be created.
    pub fn new(conn: Arc<Mutex<Connection>>) -> Result<Self> {
        {
            let guard = conn.lock()?;
            guard.execute(
                "CREATE TABLE IF NOT EXISTS downloads (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    content_id TEXT NOT NULL,
                    content_type TEXT NOT NULL,
                    quality TEXT NOT NULL,
                    file_id TEXT NOT NULL,
                    file_name TEXT NOT NULL DEFAULT '',
                    title TEXT NOT NULL,
                    artist TEXT NOT NULL DEFAULT '',
                    album TEXT NOT NULL DEFAULT '',
                    duration INTEGER NOT NULL DEFAULT 0,
                    url TEXT NOT NULL DEFAULT '',
                    stored_at TEXT NOT NULL,
                    UNIQUE (user_id, content_id, content_type)
                )",
                [],
            )?;
        }
        Ok(Self { conn })
    }

    /// Looks up a cached artifact. A pure read; no side effects.
    ///
    /// Quality participates in the filter even though it is not part of
    /// the uniqueness key: a row stored at a different quality reads as
    /// a miss.
    ///
    /// # Errors
    ///
    /// Returns an error for database failures. Callers in the download
    /// flow treat errors as misses.
    pub fn lookup(
        &self,
        user_id: i64,
        content_id: &str,
        content_type: ContentType,
        quality: Quality,
    ) -> Result<Option<CachedArtifact>> {
        let guard = self.conn.lock()?;
        let artifact = guard
            .query_row(
                "SELECT content_id, content_type, quality, file_id, file_name, title,
                        artist, album, duration, url, stored_at
                 FROM downloads
                 WHERE user_id = ?1 AND content_id = ?2 AND content_type = ?3
                   AND quality = ?4",
                params![
                    user_id,
                    content_id,
                    content_type.to_string(),
                    quality.to_string()
                ],
                Self::artifact_from_row,
            )
            .optional()?;
        Ok(artifact)
    }

    /// Records a delivered artifact, overwriting any previous row for
    /// the same `(user_id, content_id, content_type)`.
    ///
    /// # Errors
    ///
    /// Returns an error when the row cannot be written. Callers in the
    /// download flow log this and carry on; the user already has their
    /// file and the worst case is a duplicate download later.
    pub fn store(&self, user_id: i64, artifact: &NewArtifact<'_>) -> Result<()> {
        let stored_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();

        let guard = self.conn.lock()?;
        guard.execute(
            "INSERT INTO downloads (user_id, content_id, content_type, quality, file_id,
                                    file_name, title, artist, album, duration, url, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT (user_id, content_id, content_type) DO UPDATE SET
                quality = excluded.quality,
                file_id = excluded.file_id,
                file_name = excluded.file_name,
                title = excluded.title,
                artist = excluded.artist,
                album = excluded.album,
                duration = excluded.duration,
                url = excluded.url,
                stored_at = excluded.stored_at",
            params![
                user_id,
                artifact.content_id,
                artifact.content_type.to_string(),
                artifact.quality.to_string(),
                artifact.file_id,
                artifact.file_name,
                artifact.title,
                artifact.artist,
                artifact.album,
                i64::try_from(artifact.duration.as_secs()).unwrap_or(i64::MAX),
                artifact.url,
                stored_at,
            ],
        )?;
        Ok(())
    }

    /// Returns the user's most recent downloads, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error for database failures.
    pub fn recent(&self, user_id: i64, limit: u32) -> Result<Vec<CachedArtifact>> {
        let guard = self.conn.lock()?;
        let mut stmt = guard.prepare(
            "SELECT content_id, content_type, quality, file_id, file_name, title,
                    artist, album, duration, url, stored_at
             FROM downloads
             WHERE user_id = ?1
             ORDER BY stored_at DESC, id DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![user_id, limit], Self::artifact_from_row)?;
        let mut artifacts = Vec::new();
        for row in rows {
            artifacts.push(row?);
        }
        Ok(artifacts)
    }

    /// Maps a result row onto [`CachedArtifact`].
    ///
    /// Stored enum names that no longer parse mean a corrupted row;
    /// surfaced as a column conversion error rather than a panic.
    fn artifact_from_row(row: &Row<'_>) -> rusqlite::Result<CachedArtifact> {
        let content_type: String = row.get(1)?;
        let quality: String = row.get(2)?;
        let duration: i64 = row.get(8)?;
        let stored_at: String = row.get(10)?;

        Ok(CachedArtifact {
            content_id: row.get(0)?,
            content_type: content_type.parse().map_err(|_| {
                rusqlite::Error::InvalidColumnType(1, content_type, rusqlite::types::Type::Text)
            })?,
            quality: quality.parse().map_err(|_| {
                rusqlite::Error::InvalidColumnType(2, quality, rusqlite::types::Type::Text)
            })?,
            file_id: row.get(3)?,
            file_name: row.get(4)?,
            title: row.get(5)?,
            artist: row.get(6)?,
            album: row.get(7)?,
            duration: Duration::from_secs(duration.max(0).unsigned_abs()),
            url: row.get(9)?,
            stored_at: OffsetDateTime::parse(&stored_at, &Rfc3339)
                .unwrap_or(OffsetDateTime::UNIX_EPOCH),
        })
    }
}
