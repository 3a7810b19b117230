use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

use super::gate::{admit_subject, authorize};
use super::token::{TokenError, TokenKind};
use crate::error::ApiError;
use crate::models::{Principal, Role};
use crate::AppState;

/// Role set attached to a route group when the router is built.
#[derive(Debug, Clone, Copy)]
pub struct AllowedRoles(pub &'static [Role]);

fn bearer(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verify the access token, run the account gate, and stash the
/// [`Principal`] in the request extensions for handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer(&request) else {
        return Err(ApiError::unauthorized(
            "Authentication required. Please provide a valid token.",
        ));
    };

    let subject = match state.tokens.verify(token, TokenKind::Access) {
        Ok(subject) => subject,
        Err(e @ TokenError::MissingSecret(_)) => {
            error!(error = %e, "token verification misconfigured");
            return Err(ApiError::Internal(e.into()));
        }
        Err(e) => {
            debug!(reason = e.reason(), path = %request.uri().path(), "rejected bearer token");
            let message = match e {
                TokenError::Expired => "Token expired. Please login again.",
                _ => "Invalid token. Please login again.",
            };
            return Err(ApiError::unauthorized(message));
        }
    };

    let principal = admit_subject(&state.store, &subject)?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Must run after [`require_auth`].
pub async fn require_roles(
    State(AllowedRoles(roles)): State<AllowedRoles>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(request.extensions().get::<Principal>(), roles)?;
    Ok(next.run(request).await)
}
