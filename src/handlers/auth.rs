use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use tower_cookies::{Cookie, Cookies};
use tower_cookies::cookie::time::Duration;

use crate::{
    crypto::token::SESSION_TTL_DAYS,
    error::AppError,
    middleware_layer::api_guard::{validate_api_role, validate_http_method},
    models::{
        role::{AUTHENTICATED_ROLES, Role},
        session::{SESSION_COOKIE, SessionState},
    },
    services::auth as auth_service,
    state::AppState,
    validation::auth::parse_login,
};

/// The response payload for login and logout.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// The response payload describing the current session.
#[derive(Serialize)]
pub struct MeResponse {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub expires_at: String,
    /// Navigation links the role may follow.
    pub links: Vec<String>,
}

/// Creates the session cookie holding `token`.
fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token);
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_max_age(Duration::days(SESSION_TTL_DAYS));
    cookie.set_path("/");
    cookie
}

/// Handles login: the only place a session is created.
pub async fn login(
    State(state): State<AppState>,
    method: Method,
    cookies: Cookies,
    body: Bytes,
) -> Result<Response, Response> {
    validate_http_method(&method, &[Method::POST]).into_result()?;

    let payload = parse_login(&body)?;
    tracing::info!("🔐 Login attempt for {}", payload.email);

    let user = auth_service::authenticate_user(&state.db, &payload.email, &payload.password).await?;
    let token = auth_service::open_session(&state.codec, &user)?;

    cookies.add(session_cookie(token, state.config.secure_cookies));
    tracing::info!("✅ User logged in: {} ({})", user.id, user.role);

    let response = AuthResponse {
        success: true,
        message: "Inicio de sesión exitoso".to_string(),
        role: Some(user.role),
    };
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles logout by deleting the session cookie.
pub async fn logout(
    method: Method,
    Extension(session): Extension<SessionState>,
    cookies: Cookies,
) -> Result<Response, Response> {
    validate_http_method(&method, &[Method::POST]).into_result()?;
    validate_api_role(&session, AUTHENTICATED_ROLES).into_result()?;

    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookies.remove(cookie);

    if let Some(s) = session.session() {
        tracing::info!("👋 User logged out: {}", s.user_id);
    }

    let response = AuthResponse {
        success: true,
        message: "Sesión cerrada".to_string(),
        role: None,
    };
    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Describes the caller's session.
pub async fn me(
    State(state): State<AppState>,
    method: Method,
    Extension(session): Extension<SessionState>,
) -> Result<Response, Response> {
    validate_http_method(&method, &[Method::GET]).into_result()?;
    validate_api_role(&session, AUTHENTICATED_ROLES).into_result()?;

    let s = session.session().ok_or(AppError::AuthenticationMissing)?;
    let response = MeResponse {
        id: s.user_id,
        email: s.email.clone(),
        role: s.role,
        expires_at: s.expires_at.to_rfc3339(),
        links: state
            .permissions
            .links_for(s.role)
            .into_iter()
            .map(str::to_string)
            .collect(),
    };
    Ok((StatusCode::OK, Json(response)).into_response())
}
