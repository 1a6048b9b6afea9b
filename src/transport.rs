//! Delivery transport abstraction over the Telegram bot API.
//!
//! The download flow only knows how to send audio, documents and text
//! to a user, and gets back the transport's opaque file reference for
//! anything it uploads. That reference is what the cache stores: a
//! repeated request re-sends the reference instead of re-uploading.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use teloxide::{prelude::*, types::InputFile};

use crate::error::{Error, Result};

/// Caption appended to every delivery.
pub const CAPTION: &str = "@spotizer_bot \u{1f3a7}";

/// Track metadata attached to an audio delivery.
#[derive(Clone, Debug, Default)]
pub struct AudioMeta {
    pub title: String,
    pub performer: String,
    pub duration: Duration,
}

/// Receipt for an uploaded file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Delivery {
    /// The transport's opaque handle for the uploaded bytes.
    pub file_id: String,

    /// File name as seen by the recipient.
    pub file_name: String,
}

/// Message deliveries as used by the download flow.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Uploads and sends a local audio file.
    async fn send_audio_file(
        &self,
        user_id: i64,
        path: &Path,
        meta: &AudioMeta,
    ) -> Result<Delivery>;

    /// Re-sends previously uploaded audio by its file reference.
    async fn send_cached_audio(&self, user_id: i64, file_id: &str, meta: &AudioMeta)
        -> Result<()>;

    /// Uploads and sends a local file as a document.
    async fn send_document_file(
        &self,
        user_id: i64,
        path: &Path,
        file_name: &str,
    ) -> Result<Delivery>;

    /// Re-sends a previously uploaded document by its file reference.
    async fn send_cached_document(&self, user_id: i64, file_id: &str) -> Result<()>;

    /// Sends a plain text message.
    async fn send_text(&self, user_id: i64, text: &str) -> Result<()>;
}

/// Production transport backed by the Telegram bot API.
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    #[must_use]
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Telegram chat IDs share the user ID space for private chats and
    /// are negative for groups; both pass through unchanged.
    fn chat(user_id: i64) -> ChatId {
        ChatId(user_id)
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_audio_file(
        &self,
        user_id: i64,
        path: &Path,
        meta: &AudioMeta,
    ) -> Result<Delivery> {
        let message = self
            .bot
            .send_audio(Self::chat(user_id), InputFile::file(path))
            .caption(CAPTION)
            .title(meta.title.clone())
            .performer(meta.performer.clone())
            .duration(u32::try_from(meta.duration.as_secs()).unwrap_or(u32::MAX))
            .await?;

        let audio = message
            .audio()
            .ok_or_else(|| Error::data_loss("sent audio came back without audio payload"))?;

        Ok(Delivery {
            file_id: audio.file.id.clone(),
            file_name: audio.file_name.clone().unwrap_or_else(|| {
                path.file_name()
                    .map_or_else(String::new, |name| name.to_string_lossy().into_owned())
            }),
        })
    }

    async fn send_cached_audio(
        &self,
        user_id: i64,
        file_id: &str,
        meta: &AudioMeta,
    ) -> Result<()> {
        self.bot
            .send_audio(Self::chat(user_id), InputFile::file_id(file_id))
            .caption(CAPTION)
            .title(meta.title.clone())
            .performer(meta.performer.clone())
            .duration(u32::try_from(meta.duration.as_secs()).unwrap_or(u32::MAX))
            .await?;
        Ok(())
    }

    async fn send_document_file(
        &self,
        user_id: i64,
        path: &Path,
        file_name: &str,
    ) -> Result<Delivery> {
        let message = self
            .bot
            .send_document(
                Self::chat(user_id),
                InputFile::file(path).file_name(file_name.to_owned()),
            )
            .caption(CAPTION)
            .await?;

        let document = message
            .document()
            .ok_or_else(|| Error::data_loss("sent document came back without payload"))?;

        Ok(Delivery {
            file_id: document.file.id.clone(),
            file_name: document
                .file_name
                .clone()
                .unwrap_or_else(|| file_name.to_owned()),
        })
    }

    async fn send_cached_document(&self, user_id: i64, file_id: &str) -> Result<()> {
        self.bot
            .send_document(Self::chat(user_id), InputFile::file_id(file_id))
            .caption(CAPTION)
            .await?;
        Ok(())
    }

    async fn send_text(&self, user_id: i64, text: &str) -> Result<()> {
        self.bot.send_message(Self::chat(user_id), text).await?;
        Ok(())
    }
}
