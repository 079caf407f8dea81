//! Command handlers: bulk danger and raw commands.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{CommandAccepted, DangerResponse};
use crate::app_state::AppState;
use crate::error::FeedError;

/// `POST /signals/danger` — Set every known signal to danger.
///
/// Best effort: the count is the number of signals known locally.
pub async fn all_signals_to_danger(State(state): State<AppState>) -> impl IntoResponse {
    let commands_issued = state.manager.all_signals_to_danger().await;
    Json(DangerResponse { commands_issued })
}

/// `POST /commands` — Publish an arbitrary JSON command.
///
/// # Errors
///
/// Returns [`FeedError::NotConnected`] unless a session is connected.
pub async fn publish_command(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Result<impl IntoResponse, FeedError> {
    if !state.manager.publish_command(&payload).await {
        return Err(FeedError::NotConnected);
    }
    Ok((StatusCode::ACCEPTED, Json(CommandAccepted { sent: true })))
}

/// Command routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/signals/danger", post(all_signals_to_danger))
        .route("/commands", post(publish_command))
}
