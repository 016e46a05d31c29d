//! HTTP endpoint handlers. These are thin wrappers that forward to the session.
//! Each handler is instrumented and logs basic result info.

use std::sync::Arc;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::{info, instrument};

use crate::machine::{Event, Rejection};
use crate::protocol::*;
use crate::state::{ActionReport, AppState};

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, generator: state.generator_name })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.snapshot().await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_lessons(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.snapshot().await.lessons)
}

#[instrument(level = "info", skip(state, event), fields(event = event.name()))]
pub async fn http_post_event(
  State(state): State<Arc<AppState>>,
  Json(event): Json<Event>,
) -> impl IntoResponse {
  let report = state.apply(event).await;
  info!(target: "lesson", screen = ?report.state.screen, accepted = report.rejection.is_none(), "HTTP event applied");
  respond(report, StatusCode::OK)
}

#[instrument(level = "info", skip(state, body), fields(title_len = body.title.len(), images = body.images.len()))]
pub async fn http_post_upload(
  State(state): State<Arc<AppState>>,
  Json(body): Json<UploadIn>,
) -> impl IntoResponse {
  let (report, handle) = state.submit_upload(body).await;
  info!(target: "generation", started = handle.is_some(), "HTTP upload submitted");
  respond(report, StatusCode::ACCEPTED)
}

fn respond(report: ActionReport, ok_status: StatusCode) -> (StatusCode, Json<ActionOut>) {
  let status = match &report.rejection {
    None => ok_status,
    Some(Rejection::MissingUploadFields) => StatusCode::UNPROCESSABLE_ENTITY,
    Some(_) => StatusCode::CONFLICT,
  };
  let out = ActionOut {
    accepted: report.rejection.is_none(),
    reason: report.rejection.map(|r| r.to_string()),
    notices: report.notices,
    state: report.state,
  };
  (status, Json(out))
}
