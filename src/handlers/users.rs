use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};

use crate::{
    middleware_layer::api_guard::{validate_api_role, validate_http_method},
    models::{role::Role, session::SessionState, user::UserSummary},
    repositories::user as user_repo,
    state::AppState,
};

/// Lists back-office users. Admins only.
pub async fn list_users(
    State(state): State<AppState>,
    method: Method,
    Extension(session): Extension<SessionState>,
) -> Result<Response, Response> {
    validate_http_method(&method, &[Method::GET]).into_result()?;
    validate_api_role(&session, &[Role::Admin]).into_result()?;

    let users: Vec<UserSummary> = user_repo::list_users(&state.db)
        .await?
        .into_iter()
        .map(UserSummary::from)
        .collect();

    tracing::debug!("📋 Listed {} users", users.len());
    Ok((StatusCode::OK, Json(users)).into_response())
}
