//! Telegram bot that downloads Deezer and Spotify links as audio files.
//!
//! Send the bot a track, album or playlist link and it replies with the
//! audio. Spotify links are bridged onto the Deezer catalog by title and
//! artist search; the actual audio always comes from Deezer through an
//! external deemix-compatible downloader. Delivered files are recorded
//! in a SQLite cache so repeated requests re-send the stored Telegram
//! file reference instead of downloading again.
//!
//! The crate splits along these seams:
//!
//! * [`link`] classifies pasted URLs into provider, content type and ID.
//! * [`bridge`] maps Spotify references onto Deezer equivalents.
//! * [`deezer`] and [`spotify`] are the provider clients, behind the
//!   traits in [`providers`].
//! * [`download`] orchestrates one request end to end.
//! * [`cache`] and [`settings`] persist per-user state in SQLite.
//! * [`bot`] routes Telegram updates into the above.
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod arl;
pub mod bot;
pub mod bridge;
pub mod cache;
pub mod config;
pub mod deezer;
pub mod download;
pub mod error;
pub mod http;
pub mod link;
pub mod manifest;
pub mod protocol;
pub mod providers;
pub mod settings;
pub mod spotify;
pub mod transport;
