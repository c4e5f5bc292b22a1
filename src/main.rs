//! Whose Track Back binary entrypoint wiring the REST commands, SSE announcements and the
//! Spotify client.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use whose_track_back::{
    config::AppConfig,
    dao::track_source::{
        TrackSource,
        spotify::{SpotifyConfig, SpotifyTrackSource},
    },
    routes,
    services::auth_service::run_authorization_relay,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let track_source = build_track_source(&config);

    let (app_state, notices) = AppState::new(config, track_source);
    tokio::spawn(run_authorization_relay(app_state.clone(), notices));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Build the Spotify source from the environment, or run without one (every player then
/// counts as unlinked).
fn build_track_source(config: &AppConfig) -> Option<Arc<dyn TrackSource>> {
    let spotify = match SpotifyConfig::from_env() {
        Ok(spotify) => spotify,
        Err(err) => {
            warn!(error = %err, "Spotify is not configured; pools will be empty");
            return None;
        }
    };

    match SpotifyTrackSource::new(spotify, config.library_scan_limit) {
        Ok(source) => {
            info!("Spotify track source ready");
            Some(Arc::new(source))
        }
        Err(err) => {
            warn!(error = %err, "failed to build Spotify client; pools will be empty");
            None
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
