//! Identity middleware for the signaling socket.
//!
//! Resolves the `jwt` cookie before the WebSocket upgrade. Failures are
//! rejected with 403 and the request never reaches the handler; on success
//! the [`Identity`] is stored in request extensions for the handler to pass
//! into the dispatcher.

use crate::auth::{Identity, IdentityResolver};
use crate::errors::RcError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// Require a valid session identity.
///
/// # Response
///
/// - Returns 403 Forbidden if the cookie is missing or invalid
/// - Continues to next handler with `Identity` in extensions otherwise
#[instrument(skip_all, name = "rc.middleware.identity")]
pub async fn require_identity(
    State(resolver): State<Arc<IdentityResolver>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, RcError> {
    let identity: Identity = resolver.resolve(req.headers()).map_err(|e| {
        tracing::debug!(target: "rc.middleware.identity", reason = %e, "Rejecting connection");
        RcError::Auth(e)
    })?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header::COOKIE, Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use common::jwt::DEFAULT_CLOCK_SKEW;
    use common::secret::SecretString;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<IdentityResolver>) {
        let resolver = Arc::new(IdentityResolver::new(
            &SecretString::from("middleware-test-secret-0123456789abcdef"),
            DEFAULT_CLOCK_SKEW,
        ));
        let router = Router::new()
            .route(
                "/whoami",
                get(|Extension(identity): Extension<Identity>| async move { identity.user_id }),
            )
            .layer(middleware::from_fn_with_state(
                Arc::clone(&resolver),
                require_identity,
            ));
        (router, resolver)
    }

    #[tokio::test]
    async fn test_missing_cookie_is_forbidden() {
        let (app, _) = app();
        let response = app
            .oneshot(HttpRequest::get("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_invalid_cookie_is_forbidden() {
        let (app, _) = app();
        let response = app
            .oneshot(
                HttpRequest::get("/whoami")
                    .header(COOKIE, "jwt=garbage")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_valid_cookie_injects_identity() {
        use http_body_util::BodyExt;

        let (app, resolver) = app();
        let token = resolver.mint_for("user-42").unwrap();
        let response = app
            .oneshot(
                HttpRequest::get("/whoami")
                    .header(COOKIE, format!("jwt={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"user-42");
    }
}
