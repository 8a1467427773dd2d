//! Call page handlers.
//!
//! `POST /call` allocates a call id and redirects to it. `GET /call/:call_id`
//! returns what the browser needs to join: its connection id, the ICE
//! servers and the network mode. Visitors without a valid session cookie
//! get a freshly minted anonymous identity.

use crate::auth::IdentityResolver;
use crate::errors::RcError;
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::{header::LOCATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use axum_extra::extract::cookie::CookieJar;
use common::types::new_base62_id;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// Header set by an authenticating proxy in front of the service.
pub const FORWARDED_USER_HEADER: &str = "x-forwarded-user";

#[derive(Debug, Deserialize)]
pub struct NewCallForm {
    #[serde(default)]
    pub call: String,
}

#[derive(Debug, Serialize)]
pub struct IceServer {
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallBootstrap {
    pub call_id: String,
    /// Connection id the browser should pass as `userId` on `/ws`.
    pub user_id: String,
    pub nickname: String,
    pub network: &'static str,
    pub version: &'static str,
    pub ice_servers: Vec<IceServer>,
}

/// Percent-escape a single path segment. `.` and `..` escape to "".
fn escape_path_segment(segment: &str) -> Result<String, RcError> {
    let mut url = Url::parse("http://localhost/")
        .map_err(|e| RcError::Internal(format!("Failed to build URL: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| RcError::Internal("URL cannot be a base".to_string()))?
        .pop_if_empty()
        .push(segment);
    Ok(url.path().trim_start_matches('/').to_string())
}

/// Handler for `POST /call`: 302 to `{base}/call/{id}`.
#[instrument(skip_all, name = "rc.handlers.new_call")]
pub async fn new_call(
    State(state): State<Arc<AppState>>,
    Form(form): Form<NewCallForm>,
) -> Result<Response, RcError> {
    let mut call_id = escape_path_segment(form.call.trim())?;
    if call_id.is_empty() {
        call_id = new_base62_id();
    }

    let location = format!("{}/call/{call_id}", state.config.base_url);
    tracing::debug!(target: "rc.handlers", location = %location, "Redirecting to call");

    Ok((StatusCode::FOUND, [(LOCATION, location)]).into_response())
}

/// Handler for `GET /call/:call_id`.
#[instrument(skip_all, name = "rc.handlers.get_call")]
pub async fn get_call(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
    headers: HeaderMap,
) -> Result<(CookieJar, Json<CallBootstrap>), RcError> {
    let mut jar = CookieJar::new();

    if let Err(reason) = state.identity.resolve(&headers) {
        let (_, token) = state.identity.mint()?;
        tracing::debug!(
            target: "rc.handlers",
            reason = %reason,
            "Issuing new session identity"
        );
        jar = jar.add(IdentityResolver::session_cookie(token));
    }

    let nickname = headers
        .get(FORWARDED_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let ice_servers = state
        .config
        .ice_server_urls
        .iter()
        .map(|url| IceServer {
            urls: vec![url.clone()],
        })
        .collect();

    let bootstrap = CallBootstrap {
        call_id: escape_path_segment(&call_id)?,
        user_id: new_base62_id(),
        nickname,
        network: state.network.mode().as_str(),
        version: env!("CARGO_PKG_VERSION"),
        ice_servers,
    };

    Ok((jar, Json(bootstrap)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_path_segment() {
        assert_eq!(escape_path_segment("abc123").unwrap(), "abc123");
        assert_eq!(escape_path_segment("my call").unwrap(), "my%20call");
        assert_eq!(escape_path_segment("a/b?c").unwrap(), "a%2Fb%3Fc");
        assert_eq!(escape_path_segment("..").unwrap(), "");
        assert_eq!(escape_path_segment("").unwrap(), "");
    }

    #[test]
    fn test_bootstrap_serialization() {
        let bootstrap = CallBootstrap {
            call_id: "c1".to_string(),
            user_id: "u1".to_string(),
            nickname: String::new(),
            network: "mesh",
            version: "0.1.0",
            ice_servers: vec![IceServer {
                urls: vec!["stun:stun.example:3478".to_string()],
            }],
        };

        let json = serde_json::to_value(&bootstrap).unwrap();
        assert_eq!(json["callId"], "c1");
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["network"], "mesh");
        assert_eq!(json["iceServers"][0]["urls"][0], "stun:stun.example:3478");
    }
}
