use std::error::Error;
use thiserror::Error;

use crate::state::game::ParticipantId;

/// Result alias for track source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Error raised by track sources regardless of the underlying music service.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The participant holds no usable credential.
    #[error("participant `{participant}` has not linked a music account")]
    Unauthorized {
        /// Player lacking a credential.
        participant: ParticipantId,
    },
    /// The music service refused an authorization code.
    #[error("authorization rejected: {0}")]
    AuthorizationRejected(String),
    /// The music service failed or could not be reached.
    #[error("track source unavailable: {message}")]
    Unavailable {
        /// What was being attempted.
        message: String,
        /// Backend failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl SourceError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        SourceError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
