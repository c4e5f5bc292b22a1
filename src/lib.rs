//! Library crate for whose-track-back, exposing modules for the binary and tests.

/// Game tunables loaded at startup.
pub mod config;
/// Outbound music-service clients.
pub mod dao;
mod dto;
mod error;
/// HTTP route trees.
pub mod routes;
/// Game engine and supporting services.
pub mod services;
/// Shared application state and per-session state.
pub mod state;

#[cfg(test)]
mod testing;
