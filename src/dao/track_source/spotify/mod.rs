//! Spotify-backed [`TrackSource`](super::TrackSource) implementation.

mod client;
mod config;
mod credentials;
mod error;
mod models;

pub use client::SpotifyTrackSource;
pub use config::SpotifyConfig;
