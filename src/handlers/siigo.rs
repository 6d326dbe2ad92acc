use axum::{
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    Extension,
};

use crate::{
    error::AppError,
    middleware_layer::api_guard::{validate_api_role, validate_http_method},
    models::{role::Role, session::SessionState},
    state::AppState,
};

/// Siigo collections exposed to the back office.
const SIIGO_RESOURCES: &[&str] = &[
    "customers",
    "products",
    "invoices",
    "taxes",
    "payment-types",
    "document-types",
];

/// Roles allowed to read Siigo data.
const SIIGO_ROLES: &[Role] = &[Role::Admin, Role::Directivo];

/// Reads a Siigo collection, forwarding the query string.
pub async fn fetch_resource(
    State(state): State<AppState>,
    method: Method,
    Extension(session): Extension<SessionState>,
    Path(resource): Path<String>,
    uri: Uri,
) -> Result<Response, Response> {
    validate_http_method(&method, &[Method::GET]).into_result()?;
    let role = validate_api_role(&session, SIIGO_ROLES).into_result()?;

    if !SIIGO_RESOURCES.contains(&resource.as_str()) {
        return Err(AppError::NotFound.into());
    }

    tracing::info!("📒 {} reading Siigo {}", role, resource);
    let body = state
        .siigo
        .get(&format!("/v1/{}", resource), uri.query())
        .await
        .map_err(AppError::from)?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response())
}
