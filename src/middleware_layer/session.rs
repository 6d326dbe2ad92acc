use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    models::session::{SESSION_COOKIE, SessionState},
    state::AppState,
};

/// Verifies the session cookie once and stores the resulting
/// [`SessionState`] in the request extensions.
///
/// Downstream checks read the extension; none of them touch the cookie again.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The `Response` of the rest of the chain.
pub async fn load_session(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = cookies.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let session = SessionState::from_token(&state.codec, token.as_deref());

    match &session {
        SessionState::Authenticated(s) => {
            tracing::debug!("🔑 Session for user {} ({})", s.user_id, s.role);
        }
        SessionState::Invalid(e) => {
            tracing::debug!("❌ Session cookie rejected: {}", e);
        }
        SessionState::MissingRole => {
            tracing::debug!("❌ Session cookie without role");
        }
        SessionState::Absent => {}
    }

    request.extensions_mut().insert(session);
    next.run(request).await
}
