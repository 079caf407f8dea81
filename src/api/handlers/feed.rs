//! Feed session handlers: status, connect, disconnect.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{ConnectRequest, FeedStatusResponse, StatusOnlyResponse};
use crate::app_state::AppState;
use crate::domain::ConnectionStatus;
use crate::error::FeedError;

/// `GET /feed/status` — Current session status.
pub async fn feed_status(State(state): State<AppState>) -> impl IntoResponse {
    let settings = state.manager.settings();
    Json(FeedStatusResponse {
        status: state.manager.status().await,
        known_signals: state.manager.known_signal_count().await,
        destinations: settings.destinations.clone(),
        command_destination: settings.command_destination.clone(),
    })
}

/// `POST /feed/connect` — Start a session.
///
/// Replaces any running session. The outcome arrives later as status
/// events on `/ws`.
///
/// An empty body connects to the configured gateway.
///
/// # Errors
///
/// Returns [`FeedError::InvalidRequest`] for a malformed body, an empty
/// host or port 0.
pub async fn connect(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, FeedError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ConnectRequest::default()
    } else {
        serde_json::from_slice::<ConnectRequest>(&body)
            .map_err(|err| FeedError::InvalidRequest(err.to_string()))?
    };
    let target = request.into_target(&state.default_target)?;
    tracing::info!(%target, "connect requested");
    state.manager.connect(target).await;
    Ok((
        StatusCode::ACCEPTED,
        Json(StatusOnlyResponse {
            status: ConnectionStatus::Connecting,
        }),
    ))
}

/// `POST /feed/disconnect` — End the session. Idempotent.
pub async fn disconnect(State(state): State<AppState>) -> impl IntoResponse {
    state.manager.disconnect().await;
    Json(StatusOnlyResponse {
        status: state.manager.status().await,
    })
}

/// Feed routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/feed/status", get(feed_status))
        .route("/feed/connect", post(connect))
        .route("/feed/disconnect", post(disconnect))
}
