//! Application-level configuration loading: game tunables read from JSON with baked-in defaults.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "WHOSE_TRACK_CONFIG_PATH";

const DEFAULT_ROUND_CAP: usize = 20;
const DEFAULT_GUESS_WINDOW_SECS: u64 = 10;
const DEFAULT_TRACKS_PER_PARTICIPANT: usize = 20;
const DEFAULT_LIBRARY_SCAN_LIMIT: usize = 200;
const DEFAULT_MIN_PARTICIPANTS: usize = 2;
const DEFAULT_TRANSITION_TIMEOUT_SECS: u64 = 15;
const DEFAULT_SSE_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Maximum number of rounds played from one pool.
    pub round_cap: usize,
    /// Fixed duration of every guessing window.
    pub guess_window: Duration,
    /// Upper bound of candidate tracks taken from each participant.
    pub tracks_per_participant: usize,
    /// Saved tracks listed before sampling in library mode.
    pub library_scan_limit: usize,
    /// Players required before `play` is accepted.
    pub min_participants: usize,
    /// Deadline for the side work of a planned transition (pool building).
    pub transition_timeout: Option<Duration>,
    /// Buffered announcements per session stream.
    pub sse_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        round_cap = app_config.round_cap,
                        guess_window_secs = app_config.guess_window.as_secs(),
                        "loaded game configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    round_cap: usize,
    guess_window_secs: u64,
    tracks_per_participant: usize,
    library_scan_limit: usize,
    min_participants: usize,
    /// `0` disables the deadline.
    transition_timeout_secs: u64,
    sse_capacity: usize,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            round_cap: DEFAULT_ROUND_CAP,
            guess_window_secs: DEFAULT_GUESS_WINDOW_SECS,
            tracks_per_participant: DEFAULT_TRACKS_PER_PARTICIPANT,
            library_scan_limit: DEFAULT_LIBRARY_SCAN_LIMIT,
            min_participants: DEFAULT_MIN_PARTICIPANTS,
            transition_timeout_secs: DEFAULT_TRANSITION_TIMEOUT_SECS,
            sse_capacity: DEFAULT_SSE_CAPACITY,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            round_cap: value.round_cap,
            guess_window: Duration::from_secs(value.guess_window_secs.max(1)),
            tracks_per_participant: value.tracks_per_participant.max(1),
            library_scan_limit: value.library_scan_limit.max(1),
            min_participants: value.min_participants.max(2),
            transition_timeout: (value.transition_timeout_secs > 0)
                .then(|| Duration::from_secs(value.transition_timeout_secs)),
            sse_capacity: value.sse_capacity.max(1),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_game() {
        let config = AppConfig::default();
        assert_eq!(config.round_cap, 20);
        assert_eq!(config.guess_window, Duration::from_secs(10));
        assert_eq!(config.tracks_per_participant, 20);
        assert_eq!(config.min_participants, 2);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"round_cap": 5, "transition_timeout_secs": 0}"#).unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.round_cap, 5);
        assert_eq!(config.guess_window, Duration::from_secs(10));
        assert!(config.transition_timeout.is_none());
    }

    #[test]
    fn fewer_than_two_players_is_never_allowed() {
        let raw: RawConfig = serde_json::from_str(r#"{"min_participants": 1}"#).unwrap();
        assert_eq!(AppConfig::from(raw).min_participants, 2);
    }
}
