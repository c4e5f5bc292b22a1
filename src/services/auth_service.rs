//! Account linking: the consent callback and the relay announcing freshly linked players.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    dto::auth::{CallbackQuery, CallbackResponse},
    error::ServiceError,
    services::announcer::{Announcement, announce},
    state::{SharedState, game::ParticipantId},
};

/// A participant finished linking their music account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationNotice {
    /// Participant whose credential was stored.
    pub participant: ParticipantId,
}

/// Exchange the authorization code of a consent redirect and store the resulting credential.
pub async fn complete_authorization(
    state: &SharedState,
    query: CallbackQuery,
) -> Result<CallbackResponse, ServiceError> {
    if let Some(error) = query.error.filter(|error| !error.is_empty()) {
        return Err(ServiceError::InvalidInput(format!(
            "authorization was not granted: {error}"
        )));
    }
    let code = non_empty(query.code)
        .ok_or_else(|| ServiceError::InvalidInput("no authorization code provided".into()))?;
    let participant = non_empty(query.state)
        .map(ParticipantId)
        .ok_or_else(|| ServiceError::InvalidInput("missing authorization state".into()))?;
    let source = state.track_source().ok_or(ServiceError::NotConfigured)?;

    source.complete_authorization(&participant, code).await?;

    info!(participant = %participant, "music account linked");
    state.notify_authorized(participant.clone());

    Ok(CallbackResponse {
        message: "Authorization complete! You can close this window and return to the game."
            .into(),
        participant: participant.0,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Announce every linked participant to each session they joined, until the channel closes.
pub async fn run_authorization_relay(
    state: SharedState,
    mut notices: mpsc::UnboundedReceiver<AuthorizationNotice>,
) {
    while let Some(AuthorizationNotice { participant }) = notices.recv().await {
        let mut delivered = 0usize;
        for slot in state.registry().all() {
            if !slot.read(|session| session.has_participant(&participant)).await {
                continue;
            }
            announce(
                &state,
                slot.key(),
                Announcement::PlayerAuthorized {
                    participant: participant.clone(),
                },
            )
            .await;
            delivered += 1;
        }

        if delivered == 0 {
            debug!(participant = %participant, "linked participant is not in any session");
        }
    }

    warn!("authorization relay stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        services::game_service::{join_session, start_session},
        state::game::SessionKey,
        testing::{RecordingAnnouncer, StaticTrackSource, test_state},
    };

    fn query(code: Option<&str>, state: Option<&str>, error: Option<&str>) -> CallbackQuery {
        CallbackQuery {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            error: error.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn callback_links_and_relays_to_joined_sessions() {
        let announcer = Arc::new(RecordingAnnouncer::default());
        let (state, rx) = test_state(
            AppConfig::default(),
            Some(StaticTrackSource::new()),
            announcer.clone(),
        );
        let joined = SessionKey::from("joined");
        let elsewhere = SessionKey::from("elsewhere");
        start_session(&state, &joined).await.unwrap();
        start_session(&state, &elsewhere).await.unwrap();
        join_session(&state, &joined, ParticipantId::from("U1"))
            .await
            .unwrap();

        let response = complete_authorization(&state, query(Some("code"), Some("U1"), None))
            .await
            .unwrap();
        assert_eq!(response.participant, "U1");

        let source = state.track_source().unwrap();
        assert!(source.is_authorized(&ParticipantId::from("U1")).await);

        let relay = tokio::spawn(run_authorization_relay(state.clone(), rx));
        for _ in 0..100 {
            if announcer.event_names(&joined).contains(&"player.authorized") {
                break;
            }
            tokio::task::yield_now().await;
        }
        relay.abort();

        assert!(announcer.event_names(&joined).contains(&"player.authorized"));
        assert!(!announcer.event_names(&elsewhere).contains(&"player.authorized"));
    }

    #[tokio::test]
    async fn denied_or_incomplete_callbacks_are_rejected() {
        let announcer = Arc::new(RecordingAnnouncer::default());
        let (state, _rx) = test_state(
            AppConfig::default(),
            Some(StaticTrackSource::new()),
            announcer,
        );

        for bad in [
            query(None, Some("U1"), Some("access_denied")),
            query(None, Some("U1"), None),
            query(Some("code"), None, None),
            query(Some("rejected"), Some("U1"), None),
        ] {
            let err = complete_authorization(&state, bad).await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidInput(_)));
        }
    }

    #[tokio::test]
    async fn callback_without_music_service_is_unavailable() {
        let announcer = Arc::new(RecordingAnnouncer::default());
        let (state, _rx) = test_state(AppConfig::default(), None, announcer);

        let err = complete_authorization(&state, query(Some("code"), Some("U1"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotConfigured));
    }
}
