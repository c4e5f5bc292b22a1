/// Spotify Web API implementation.
pub mod spotify;

use futures::future::BoxFuture;

use crate::dao::source::SourceResult;
use crate::state::game::{CandidateTrack, ParticipantId, PoolMode};

/// Capability to read a participant's listening history from a music service.
///
/// Implementations own the participant credentials; callers only learn whether a participant
/// is linked and receive candidate tracks or a typed failure.
pub trait TrackSource: Send + Sync {
    /// URL the participant must open to link their account, when the source supports it.
    fn authorize_url(&self, participant: &ParticipantId) -> Option<String>;
    /// Whether the participant currently holds a usable credential.
    fn is_authorized(&self, participant: &ParticipantId) -> BoxFuture<'static, bool>;
    /// Exchange an authorization code for a credential bound to `participant`.
    fn complete_authorization(
        &self,
        participant: &ParticipantId,
        code: String,
    ) -> BoxFuture<'static, SourceResult<()>>;
    /// Fetch at most `limit` candidate tracks for `participant`.
    fn fetch_tracks(
        &self,
        participant: &ParticipantId,
        mode: PoolMode,
        limit: usize,
    ) -> BoxFuture<'static, SourceResult<Vec<CandidateTrack>>>;
}
