//! Playlist manifest for multi-track deliveries.
//!
//! After a batch of tracks has been delivered, the user gets one
//! extended M3U file listing the tracks in catalog order, so the batch
//! can be played back as a playlist. The manifest is built in memory,
//! written to a temporary file for delivery, and discarded afterwards.

use std::time::Duration;

/// One delivered track.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    pub title: String,
    pub duration: Duration,
    pub file_name: String,
}

/// An ordered collection of delivered tracks.
///
/// Entries are appended in delivery order, which the download flow
/// keeps equal to the provider's track order.
#[derive(Clone, Debug, Default)]
pub struct Manifest {
    entries: Vec<Entry>,
}

impl Manifest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Renders the manifest in extended M3U format.
    ///
    /// ```text
    /// #EXTM3U
    /// #EXTINF:320,One More Time
    /// Daft Punk - One More Time.mp3
    /// ```
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("#EXTM3U\n");
        for entry in &self.entries {
            out.push_str(&format!(
                "#EXTINF:{},{}\n{}\n",
                entry.duration.as_secs(),
                entry.title,
                entry.file_name
            ));
        }
        out
    }
}
