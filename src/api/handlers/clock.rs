//! Clock endpoint.

use std::time::Instant;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::ClockResponse;
use crate::app_state::AppState;
use crate::domain::format_as_clock;

/// `GET /clock` — Clock snapshot plus the time interpolated to now.
pub async fn get_clock(State(state): State<AppState>) -> impl IntoResponse {
    let view = state.manager.clock_view().await;
    let displayed_seconds = view.simulated_seconds_at(Instant::now());
    Json(ClockResponse {
        speed_ratio: view.speed_ratio(),
        area_id: view.state.area_id,
        simulated_seconds: view.state.simulated_seconds,
        tick_interval_ms: view.state.tick_interval_ms,
        paused: view.state.paused,
        displayed_seconds,
        display: format_as_clock(displayed_seconds),
    })
}

/// Clock routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/clock", get(get_clock))
}
