//! Recording join proxy.
//!
//! `POST /api/sessions/:room/join/:user` is forwarded to the recording
//! backend and the backend's response is streamed back. If the backend
//! cannot be reached the caller sees 403 `Forbidden`.

use crate::routes::AppState;
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::instrument;

#[instrument(skip_all, name = "rc.handlers.join_recording", fields(room_id = %room_id))]
pub async fn join_recording(
    State(state): State<Arc<AppState>>,
    Path((room_id, user_id)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let upstream = match state
        .recording
        .join(&room_id, &user_id, reqwest::Body::from(body))
        .await
    {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::warn!(target: "rc.handlers", error = %e, "Error joining record session");
            return (StatusCode::FORBIDDEN, "Forbidden").into_response();
        }
    };

    let status = upstream.status();
    let content_type = upstream.headers().get(CONTENT_TYPE).cloned();

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    response
}
