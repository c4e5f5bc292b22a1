use std::sync::Arc;

use futures::future::BoxFuture;
use rand::seq::IndexedRandom;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    dao::{
        source::{SourceError, SourceResult},
        track_source::TrackSource,
    },
    state::game::{CandidateTrack, ParticipantId, PoolMode},
};

use super::{
    config::{SCOPES, SpotifyConfig},
    credentials::{CredentialStore, SpotifyToken},
    error::{SpotifyError, SpotifyResult},
    models::{RecentlyPlayedResponse, SavedTracksResponse, TokenResponse},
};

/// Largest page the Web API serves for history and library listings.
const MAX_PAGE_SIZE: usize = 50;

/// [`TrackSource`] backed by the Spotify Web API.
#[derive(Clone)]
pub struct SpotifyTrackSource {
    client: Client,
    config: Arc<SpotifyConfig>,
    credentials: Arc<CredentialStore>,
    library_scan_limit: usize,
}

impl SpotifyTrackSource {
    /// Build a source talking to the endpoints described by `config`.
    ///
    /// `library_scan_limit` bounds how many saved tracks are listed before sampling.
    pub fn new(config: SpotifyConfig, library_scan_limit: usize) -> SpotifyResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| SpotifyError::ClientBuilder { source })?;

        Ok(Self {
            client,
            config: Arc::new(config),
            credentials: Arc::new(CredentialStore::default()),
            library_scan_limit: library_scan_limit.max(1),
        })
    }

    fn token_url(&self) -> String {
        format!("{}/api/token", self.config.accounts_url.trim_end_matches('/'))
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> SpotifyResult<TokenResponse> {
        let path = self.token_url();
        let response = self
            .client
            .post(&path)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|source| SpotifyError::RequestSend {
                path: path.clone(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => response
                .json::<TokenResponse>()
                .await
                .map_err(|source| SpotifyError::DecodeResponse { path, source }),
            status @ (StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) => {
                Err(SpotifyError::TokenRejected { status })
            }
            status => Err(SpotifyError::RequestStatus { path, status }),
        }
    }

    async fn exchange_code(&self, code: &str) -> SpotifyResult<SpotifyToken> {
        let token = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .await?;

        Ok(SpotifyToken::new(
            token.access_token,
            token.refresh_token,
            token.expires_in,
        ))
    }

    async fn refresh(&self, refresh_token: &str) -> SpotifyResult<SpotifyToken> {
        let token = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;

        // Spotify only rotates the refresh token occasionally.
        let refresh_token = token
            .refresh_token
            .or_else(|| Some(refresh_token.to_string()));

        Ok(SpotifyToken::new(
            token.access_token,
            refresh_token,
            token.expires_in,
        ))
    }

    /// Return a valid access token for `participant`, refreshing it when close to expiry.
    async fn access_token(&self, participant: &ParticipantId) -> SourceResult<String> {
        let Some(token) = self.credentials.get(participant) else {
            return Err(SourceError::Unauthorized {
                participant: participant.clone(),
            });
        };

        if !token.is_expiring() {
            return Ok(token.access_token);
        }

        let Some(refresh_token) = token.refresh_token.as_deref() else {
            self.credentials.remove(participant);
            return Err(SourceError::Unauthorized {
                participant: participant.clone(),
            });
        };

        match self.refresh(refresh_token).await {
            Ok(fresh) => {
                debug!(participant = %participant, "refreshed Spotify access token");
                let access = fresh.access_token.clone();
                self.credentials.insert(participant.clone(), fresh);
                Ok(access)
            }
            Err(SpotifyError::TokenRejected { status }) => {
                warn!(participant = %participant, %status, "refresh token rejected; unlinking participant");
                self.credentials.remove(participant);
                Err(SourceError::Unauthorized {
                    participant: participant.clone(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get_json<T>(
        &self,
        access_token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> SpotifyResult<T>
    where
        T: DeserializeOwned,
    {
        let url = self.api_url(path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|source| SpotifyError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => {
                response
                    .json::<T>()
                    .await
                    .map_err(|source| SpotifyError::DecodeResponse {
                        path: path.to_string(),
                        source,
                    })
            }
            status => Err(SpotifyError::RequestStatus {
                path: path.to_string(),
                status,
            }),
        }
    }

    async fn recent_tracks(
        &self,
        access_token: &str,
        limit: usize,
    ) -> SpotifyResult<Vec<CandidateTrack>> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let page: RecentlyPlayedResponse = self
            .get_json(
                access_token,
                "me/player/recently-played",
                &[("limit", limit.to_string())],
            )
            .await?;

        Ok(page
            .items
            .into_iter()
            .filter(|item| item.track.id.is_some())
            .map(|item| item.track.into())
            .collect())
    }

    async fn library_sample(
        &self,
        access_token: &str,
        limit: usize,
    ) -> SpotifyResult<Vec<CandidateTrack>> {
        let mut saved: Vec<CandidateTrack> = Vec::new();
        let mut offset = 0;

        while offset < self.library_scan_limit {
            let page_size = (self.library_scan_limit - offset).min(MAX_PAGE_SIZE);
            let page: SavedTracksResponse = self
                .get_json(
                    access_token,
                    "me/tracks",
                    &[
                        ("limit", page_size.to_string()),
                        ("offset", offset.to_string()),
                    ],
                )
                .await?;

            let fetched = page.items.len();
            offset += fetched;
            saved.extend(
                page.items
                    .into_iter()
                    .filter(|item| item.track.id.is_some())
                    .map(|item| CandidateTrack::from(item.track)),
            );

            if fetched == 0 || page.next.is_none() {
                break;
            }
        }

        let mut rng = rand::rng();
        Ok(saved.choose_multiple(&mut rng, limit).cloned().collect())
    }
}

impl TrackSource for SpotifyTrackSource {
    fn authorize_url(&self, participant: &ParticipantId) -> Option<String> {
        let url = format!(
            "{}/authorize",
            self.config.accounts_url.trim_end_matches('/')
        );
        let request = self
            .client
            .get(url)
            .query(&[
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", SCOPES),
                ("state", participant.0.as_str()),
                ("show_dialog", "true"),
            ])
            .build();

        match request {
            Ok(request) => Some(request.url().to_string()),
            Err(err) => {
                warn!(error = %err, "failed to build Spotify authorization URL");
                None
            }
        }
    }

    fn is_authorized(&self, participant: &ParticipantId) -> BoxFuture<'static, bool> {
        let linked = self.credentials.contains(participant);
        Box::pin(async move { linked })
    }

    fn complete_authorization(
        &self,
        participant: &ParticipantId,
        code: String,
    ) -> BoxFuture<'static, SourceResult<()>> {
        let source = self.clone();
        let participant = participant.clone();
        Box::pin(async move {
            let token = source.exchange_code(&code).await?;
            source.credentials.insert(participant, token);
            Ok(())
        })
    }

    fn fetch_tracks(
        &self,
        participant: &ParticipantId,
        mode: PoolMode,
        limit: usize,
    ) -> BoxFuture<'static, SourceResult<Vec<CandidateTrack>>> {
        let source = self.clone();
        let participant = participant.clone();
        Box::pin(async move {
            let access_token = source.access_token(&participant).await?;
            let tracks = match mode {
                PoolMode::Recent => source.recent_tracks(&access_token, limit).await?,
                PoolMode::Library => source.library_sample(&access_token, limit).await?,
            };
            Ok(tracks)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashMap, HashSet},
        sync::Mutex,
    };

    use axum::{
        Form, Json, Router,
        extract::{Query, State},
        http::{HeaderMap, header::AUTHORIZATION},
        response::{IntoResponse, Response},
        routing::{get, post},
    };
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    use super::*;

    /// Requests seen by the local stand-in for the Spotify endpoints.
    #[derive(Default)]
    struct Recorded {
        bearers: Mutex<Vec<String>>,
        queries: Mutex<Vec<HashMap<String, String>>>,
    }

    impl Recorded {
        fn record(&self, headers: &HeaderMap, query: HashMap<String, String>) {
            let bearer = headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string();
            self.bearers.lock().unwrap().push(bearer);
            self.queries.lock().unwrap().push(query);
        }

        fn query_values(&self, name: &str) -> Vec<String> {
            self.queries
                .lock()
                .unwrap()
                .iter()
                .filter_map(|query| query.get(name).cloned())
                .collect()
        }
    }

    fn track_json(id: Option<&str>) -> Value {
        json!({
            "id": id,
            "name": id.unwrap_or("Local file"),
            "artists": [{"name": "Band"}],
        })
    }

    async fn token(Form(form): Form<HashMap<String, String>>) -> Response {
        match form.get("refresh_token").map(String::as_str) {
            Some("revoked") => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "invalid_grant"})),
            )
                .into_response(),
            _ => Json(json!({
                "access_token": "fresh",
                "token_type": "Bearer",
                "expires_in": 3600,
            }))
            .into_response(),
        }
    }

    async fn recently_played(
        State(recorded): State<Arc<Recorded>>,
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        recorded.record(&headers, query);
        Json(json!({
            "items": [
                {"track": track_json(Some("r1"))},
                {"track": track_json(None)},
                {"track": track_json(Some("r2"))},
            ]
        }))
    }

    async fn saved_tracks(
        State(recorded): State<Arc<Recorded>>,
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        let first_page = query.get("offset").map(String::as_str) == Some("0");
        recorded.record(&headers, query);
        if first_page {
            Json(json!({
                "items": [
                    {"track": track_json(Some("s1"))},
                    {"track": track_json(None)},
                    {"track": track_json(Some("s2"))},
                ],
                "next": "https://api.example/v1/me/tracks?offset=3",
            }))
        } else {
            Json(json!({
                "items": [
                    {"track": track_json(Some("s3"))},
                    {"track": track_json(Some("s4"))},
                ],
                "next": null,
            }))
        }
    }

    /// Source pointed at a local server answering like the Spotify endpoints.
    async fn served_source() -> (SpotifyTrackSource, Arc<Recorded>) {
        let recorded = Arc::new(Recorded::default());
        let router = Router::new()
            .route("/api/token", post(token))
            .route("/v1/me/player/recently-played", get(recently_played))
            .route("/v1/me/tracks", get(saved_tracks))
            .with_state(recorded.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let config = SpotifyConfig::new("client", "secret", "https://bot.example/callback")
            .with_endpoints(format!("http://{addr}"), format!("http://{addr}/v1"));
        (SpotifyTrackSource::new(config, 10).unwrap(), recorded)
    }

    fn link(
        source: &SpotifyTrackSource,
        participant: &ParticipantId,
        expires_in: u64,
        refresh: &str,
    ) {
        source.credentials.insert(
            participant.clone(),
            SpotifyToken::new("stored".into(), Some(refresh.into()), expires_in),
        );
    }

    fn ids(tracks: &[CandidateTrack]) -> Vec<&str> {
        tracks.iter().map(|track| track.id.as_str()).collect()
    }

    #[tokio::test]
    async fn recent_plays_skip_local_files_and_clamp_the_page() {
        let (source, recorded) = served_source().await;
        let participant = ParticipantId::from("1234");
        link(&source, &participant, 3600, "good");

        let tracks = source
            .fetch_tracks(&participant, PoolMode::Recent, 80)
            .await
            .unwrap();

        assert_eq!(ids(&tracks), ["r1", "r2"]);
        assert_eq!(recorded.query_values("limit"), ["50"]);
        assert_eq!(*recorded.bearers.lock().unwrap(), ["Bearer stored"]);
    }

    #[tokio::test]
    async fn library_pages_until_next_runs_out_then_samples() {
        let (source, recorded) = served_source().await;
        let participant = ParticipantId::from("1234");
        link(&source, &participant, 3600, "good");

        let tracks = source
            .fetch_tracks(&participant, PoolMode::Library, 3)
            .await
            .unwrap();

        assert_eq!(recorded.query_values("offset"), ["0", "3"]);
        assert_eq!(recorded.query_values("limit"), ["10", "7"]);
        assert_eq!(tracks.len(), 3);
        let sampled: HashSet<&str> = ids(&tracks).into_iter().collect();
        assert_eq!(sampled.len(), 3);
        assert!(sampled.is_subset(&HashSet::from(["s1", "s2", "s3", "s4"])));
    }

    #[tokio::test]
    async fn expiring_token_is_refreshed_and_keeps_its_refresh_token() {
        let (source, recorded) = served_source().await;
        let participant = ParticipantId::from("1234");
        link(&source, &participant, 0, "good");

        source
            .fetch_tracks(&participant, PoolMode::Recent, 20)
            .await
            .unwrap();

        assert_eq!(*recorded.bearers.lock().unwrap(), ["Bearer fresh"]);
        let stored = source.credentials.get(&participant).unwrap();
        assert_eq!(stored.access_token, "fresh");
        assert_eq!(stored.refresh_token.as_deref(), Some("good"));
        assert!(!stored.is_expiring());
    }

    #[tokio::test]
    async fn rejected_refresh_unlinks_the_participant() {
        let (source, recorded) = served_source().await;
        let participant = ParticipantId::from("1234");
        link(&source, &participant, 0, "revoked");

        let err = source
            .fetch_tracks(&participant, PoolMode::Recent, 20)
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::Unauthorized { .. }));
        assert!(!source.is_authorized(&participant).await);
        assert!(recorded.bearers.lock().unwrap().is_empty());
    }

    fn source() -> SpotifyTrackSource {
        let config = SpotifyConfig::new("client", "secret", "https://bot.example/callback")
            .with_endpoints("https://accounts.example/", "https://api.example/v1");
        SpotifyTrackSource::new(config, 200).unwrap()
    }

    #[test]
    fn authorize_url_carries_participant_as_state() {
        let url = source()
            .authorize_url(&ParticipantId::from("1234"))
            .unwrap();

        assert!(url.starts_with("https://accounts.example/authorize?"));
        assert!(url.contains("client_id=client"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("state=1234"));
        assert!(url.contains("show_dialog=true"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fbot.example%2Fcallback"));
    }

    #[tokio::test]
    async fn unlinked_participant_is_unauthorized() {
        let source = source();
        let participant = ParticipantId::from("1234");

        assert!(!source.is_authorized(&participant).await);
        let err = source
            .fetch_tracks(&participant, PoolMode::Recent, 20)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn stored_credential_counts_as_authorized() {
        let source = source();
        let participant = ParticipantId::from("1234");
        source.credentials.insert(
            participant.clone(),
            SpotifyToken::new("token".into(), Some("refresh".into()), 3600),
        );

        assert!(source.is_authorized(&participant).await);
        assert_eq!(source.access_token(&participant).await.unwrap(), "token");
    }
}
