use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

use gather_db::DomainError;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::sessions::Session;

/// Optional-auth extension: present on routes that serve both anonymous and
/// signed-in callers (dashboard stats).
#[derive(Clone)]
pub struct MaybeSession(pub Option<Session>);

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Validate the bearer token against the session store and inject the
/// session as a request extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or(DomainError::Unauthenticated)?;
    let session = state
        .sessions
        .get(token)
        .await
        .ok_or(DomainError::Unauthenticated)?;

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Like `require_auth`, but anonymous callers pass through with an empty
/// session slot instead of a 401.
pub async fn optional_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let session = match bearer_token(req.headers()) {
        Some(token) => state.sessions.get(token).await,
        None => None,
    };

    req.extensions_mut().insert(MaybeSession(session));
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc-123"),
        );
        assert_eq!(bearer_token(&headers), Some("abc-123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(bearer_token(&headers), None);
    }
}
