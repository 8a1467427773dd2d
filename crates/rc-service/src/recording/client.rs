//! Recording backend HTTP client.
//!
//! REST contract of the recording service:
//!
//! - `POST {base}/api/sessions/{room}` starts recording, optionally
//!   returning `{"url": "..."}` (or `streamUrl`)
//! - `DELETE {base}/api/sessions/{room}` stops it
//! - `POST {base}/api/sessions/{room}/join/{user}` registers a participant
//!
//! Transport failures and non-2xx statuses are `RcError::Upstream`.

use crate::errors::RcError;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, instrument, warn};

/// Connect timeout for recording backend requests.
const RECORD_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Start/stop capture for a room.
#[async_trait]
pub trait RecordingBackend: Send + Sync {
    /// Start recording; returns the stream URL if the backend provided one.
    async fn start(&self, room_id: &str) -> Result<Option<String>, RcError>;

    /// Stop recording.
    async fn stop(&self, room_id: &str) -> Result<(), RcError>;
}

#[derive(Debug, Deserialize)]
struct StartRecordingResponse {
    #[serde(default, alias = "streamUrl")]
    url: Option<String>,
}

/// HTTP client for the recording backend.
#[derive(Clone)]
pub struct RecordingClient {
    /// HTTP client with configured timeouts.
    client: Client,

    /// Base URL of the recording service.
    base_url: Url,
}

impl RecordingClient {
    /// Create a new recording client.
    ///
    /// # Errors
    ///
    /// Returns `RcError::Internal` if the base URL is invalid or the HTTP
    /// client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RcError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            error!(target: "rc.recording", error = %e, "Invalid recording service URL");
            RcError::Internal(format!("Invalid recording service URL: {e}"))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(RcError::Internal(
                "Recording service URL cannot be a base".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(RECORD_CONNECT_TIMEOUT_SECS).min(timeout))
            .build()
            .map_err(|e| {
                error!(target: "rc.recording", error = %e, "Failed to build HTTP client");
                RcError::Internal(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, base_url })
    }

    /// `{base}/api/sessions/{segments...}` with each segment percent-escaped.
    fn sessions_url(&self, segments: &[&str]) -> Result<Url, RcError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| RcError::Internal("Recording service URL cannot be a base".to_string()))?;
            path.pop_if_empty().push("api").push("sessions");
            path.extend(segments);
        }
        Ok(url)
    }

    /// Forward a participant join to the recording backend.
    ///
    /// The request body is passed through untouched and the backend's
    /// response is returned for the caller to stream back.
    ///
    /// # Errors
    ///
    /// Returns `RcError::Upstream` if the backend is unreachable.
    #[instrument(skip(self, body), fields(room_id = %room_id))]
    pub async fn join(
        &self,
        room_id: &str,
        user_id: &str,
        body: reqwest::Body,
    ) -> Result<reqwest::Response, RcError> {
        let url = self.sessions_url(&[room_id, "join", user_id])?;

        self.client
            .post(url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "rc.recording", error = %e, "Join request failed");
                RcError::Upstream(format!("Join request failed: {e}"))
            })
    }

    fn check_status(response: &reqwest::Response, action: &str) -> Result<(), RcError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            warn!(target: "rc.recording", status = %status, action = action, "Recording backend returned error status");
            Err(RcError::Upstream(format!(
                "Recording backend returned {status} on {action}"
            )))
        }
    }
}

#[async_trait]
impl RecordingBackend for RecordingClient {
    #[instrument(skip(self), name = "rc.recording.start")]
    async fn start(&self, room_id: &str) -> Result<Option<String>, RcError> {
        let url = self.sessions_url(&[room_id])?;

        let response = self.client.post(url).send().await.map_err(|e| {
            warn!(target: "rc.recording", error = %e, "Start recording request failed");
            RcError::Upstream(format!("Start recording request failed: {e}"))
        })?;

        Self::check_status(&response, "start")?;

        let body = response.bytes().await.map_err(|e| {
            warn!(target: "rc.recording", error = %e, "Failed to read start recording response");
            RcError::Upstream(format!("Failed to read start recording response: {e}"))
        })?;

        let stream_url = serde_json::from_slice::<StartRecordingResponse>(&body)
            .ok()
            .and_then(|parsed| parsed.url)
            .filter(|url| !url.is_empty());

        tracing::info!(
            target: "rc.recording",
            has_stream_url = stream_url.is_some(),
            "Recording started"
        );

        Ok(stream_url)
    }

    #[instrument(skip(self), name = "rc.recording.stop")]
    async fn stop(&self, room_id: &str) -> Result<(), RcError> {
        let url = self.sessions_url(&[room_id])?;

        let response = self.client.delete(url).send().await.map_err(|e| {
            warn!(target: "rc.recording", error = %e, "Stop recording request failed");
            RcError::Upstream(format!("Stop recording request failed: {e}"))
        })?;

        Self::check_status(&response, "stop")?;

        tracing::info!(target: "rc.recording", "Recording stopped");
        Ok(())
    }
}
