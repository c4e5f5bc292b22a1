use super::error::{SpotifyError, SpotifyResult};

const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
/// Scopes needed for both the recent-plays and the saved-library pools.
pub const SCOPES: &str = "user-read-recently-played user-library-read";

/// Runtime configuration describing how to reach the Spotify Web API.
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    /// Application client id.
    pub client_id: String,
    /// Application client secret.
    pub client_secret: String,
    /// Callback URL registered with the application.
    pub redirect_uri: String,
    /// Base URL of the accounts service (consent and token endpoints).
    pub accounts_url: String,
    /// Base URL of the Web API.
    pub api_url: String,
}

impl SpotifyConfig {
    /// Construct a configuration for the public Spotify endpoints.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            accounts_url: DEFAULT_ACCOUNTS_URL.into(),
            api_url: DEFAULT_API_URL.into(),
        }
    }

    /// Point the client at alternative endpoints (useful for proxies and local mocks).
    pub fn with_endpoints(
        mut self,
        accounts_url: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Self {
        self.accounts_url = accounts_url.into();
        self.api_url = api_url.into();
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> SpotifyResult<Self> {
        let client_id = require_env("SPOTIFY_CLIENT_ID")?;
        let client_secret = require_env("SPOTIFY_CLIENT_SECRET")?;
        let redirect_uri = require_env("SPOTIFY_REDIRECT_URI")?;

        let mut config = Self::new(client_id, client_secret, redirect_uri);

        if let (Some(accounts), Some(api)) = (
            std::env::var("SPOTIFY_ACCOUNTS_URL").ok(),
            std::env::var("SPOTIFY_API_URL").ok(),
        ) {
            config = config.with_endpoints(accounts, api);
        }

        Ok(config)
    }
}

fn require_env(var: &'static str) -> SpotifyResult<String> {
    std::env::var(var)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(SpotifyError::MissingEnvVar { var })
}
