//! Error types raised by the Spotify client.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::source::SourceError;

/// Convenient result alias returning [`SpotifyError`] failures.
pub type SpotifyResult<T> = Result<T, SpotifyError>;

/// Failures that can occur while talking to Spotify.
#[derive(Debug, Error)]
pub enum SpotifyError {
    /// Required environment variable is missing.
    #[error("missing Spotify environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build Spotify HTTP client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent.
    #[error("failed to send Spotify request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// Spotify returned an unexpected status code.
    #[error("unexpected Spotify response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// Response payload could not be decoded.
    #[error("failed to decode Spotify response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The accounts service refused the authorization code or refresh token.
    #[error("Spotify rejected the token request with status {status}")]
    TokenRejected { status: StatusCode },
}

impl From<SpotifyError> for SourceError {
    fn from(err: SpotifyError) -> Self {
        match err {
            SpotifyError::TokenRejected { status } => {
                SourceError::AuthorizationRejected(format!("token endpoint answered {status}"))
            }
            other => SourceError::unavailable(other.to_string(), other),
        }
    }
}
