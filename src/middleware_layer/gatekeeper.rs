use axum::{
    body::Body,
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    models::session::{Session, SessionState},
    services::permissions::{LANDING_ROUTE, PUBLIC_ROUTE, PermissionTable, normalize_path},
    state::AppState,
};

/// Request header carrying the normalized page path downstream.
pub const CURRENT_PATH_HEADER: &str = "x-current-path";

/// Paths the gatekeeper never inspects.
const BYPASS_PREFIXES: &[&str] = &["/api/", "/assets/"];
const BYPASS_EXACT: &[&str] = &["/api", "/favicon.ico"];

/// Where a page request stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// The public (login) route.
    Public,
    /// A gated route requested without a valid session.
    NeedsAuth,
    /// The caller may see the page.
    Authorized,
    /// A gated route the caller's role may not see.
    Forbidden,
}

/// What the gatekeeper does with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Proceed,
    RedirectToLogin,
    RedirectToLanding,
}

impl GateState {
    pub fn outcome(self, authenticated: bool) -> GateOutcome {
        match self {
            GateState::Public if authenticated => GateOutcome::RedirectToLanding,
            GateState::Public | GateState::Authorized => GateOutcome::Proceed,
            GateState::NeedsAuth => GateOutcome::RedirectToLogin,
            GateState::Forbidden => GateOutcome::RedirectToLanding,
        }
    }
}

/// Classifies a normalized page path for the given session.
///
/// The permission table is consulted once per call.
pub fn classify(table: &PermissionTable, path: &str, session: Option<&Session>) -> GateState {
    if path == PUBLIC_ROUTE {
        return GateState::Public;
    }

    let Some(allowed) = table.allowed_roles(path) else {
        return GateState::Authorized;
    };

    match session {
        None => GateState::NeedsAuth,
        Some(s) if allowed.contains(&s.role) => GateState::Authorized,
        Some(_) => GateState::Forbidden,
    }
}

fn is_bypassed(path: &str) -> bool {
    BYPASS_EXACT.contains(&path) || BYPASS_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Gates page requests before they are rendered.
///
/// Failures are redirects, never error pages: callers without a session go
/// to the public route, callers whose role is refused go to the landing
/// route. Requires [`load_session`](super::session::load_session) to run
/// first; without it every caller is treated as anonymous.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A 307 redirect, or the `Response` of the rest of the chain.
pub async fn guard_pages(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = normalize_path(request.uri().path()).to_string();
    if is_bypassed(&path) {
        return next.run(request).await;
    }

    let session = request
        .extensions()
        .get::<SessionState>()
        .and_then(SessionState::session)
        .cloned();

    let gate = classify(&state.permissions, &path, session.as_ref());
    match gate.outcome(session.is_some()) {
        GateOutcome::Proceed => {
            tracing::debug!("✅ {:?} page {}", gate, path);
            if let Ok(value) = HeaderValue::from_str(&path) {
                request.headers_mut().insert(CURRENT_PATH_HEADER, value);
            }
            next.run(request).await
        }
        GateOutcome::RedirectToLogin => {
            tracing::debug!("↪️  {} requires a session", path);
            Redirect::temporary(PUBLIC_ROUTE).into_response()
        }
        GateOutcome::RedirectToLanding => {
            if let Some(s) = &session {
                tracing::debug!("↪️  {} not available to role {}", path, s.role);
            }
            Redirect::temporary(LANDING_ROUTE).into_response()
        }
    }
}
