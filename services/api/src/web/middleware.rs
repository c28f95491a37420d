//! services/api/src/web/middleware.rs
//!
//! Session-cookie middleware. Signing in is optional in this application,
//! so the middleware attaches whoever the cookie identifies instead of
//! rejecting anonymous requests.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::web::state::AppState;

/// The user attached to a request. `None` means anonymous: records stay on
/// this device only and cloud sync is skipped.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Option<Uuid>);

/// Pulls the auth session id out of the `Cookie` header, if any.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
}

/// Middleware that resolves the session cookie to a user id and inserts an
/// `AuthUser` extension. A missing, expired, or invalid cookie degrades to
/// anonymous rather than failing the request.
pub async fn attach_user(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let user_id = match session_cookie(req.headers()) {
        Some(session_id) => match state.cloud.validate_auth_session(session_id).await {
            Ok(user_id) => Some(user_id),
            Err(e) => {
                warn!("Session cookie did not validate, continuing anonymously: {e}");
                None
            }
        },
        None => None,
    };

    req.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn session_cookie_is_found_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc-123; lang=en"),
        );
        assert_eq!(session_cookie(&headers), Some("abc-123"));
    }

    #[test]
    fn missing_session_cookie_is_none() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(session_cookie(&headers), None);
        assert_eq!(session_cookie(&HeaderMap::new()), None);
    }
}
