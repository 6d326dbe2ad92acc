use axum::{
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::crypto::token::TokenError;
use crate::siigo::error::SiigoError;

/// Message of every 401 response.
pub const UNAUTHORIZED_MESSAGE: &str = "No autorizado";
/// Message of every 403 response.
pub const FORBIDDEN_MESSAGE: &str = "Acceso prohibido: No tienes permisos para esta operación";
/// Message of every Siigo integration failure.
pub const SIIGO_FAILURE_MESSAGE: &str = "Error de integración con Siigo";

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection pool checkout error.
    #[error("Database pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A connection pool setup error.
    #[error("Database pool setup error: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    /// A column was missing from a row.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// No valid session.
    #[error("{}", UNAUTHORIZED_MESSAGE)]
    AuthenticationMissing,

    /// A valid session whose role is not allowed.
    #[error("{}", FORBIDDEN_MESSAGE)]
    AuthorizationDenied,

    /// The request method is not accepted by the endpoint.
    #[error("Método {method} no permitido")]
    MethodNotAllowed { method: Method, allowed: Vec<Method> },

    /// Login with an unknown email or a wrong password.
    #[error("Credenciales inválidas")]
    InvalidCredentials,

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A resource not found error.
    #[error("Resource not found")]
    NotFound,

    /// A session token could not be issued.
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// A failure in the Siigo integration.
    #[error("Siigo error: {0}")]
    Siigo(#[from] SiigoError),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Renders `{"error": message}` with the given status.
pub fn error_body(status: StatusCode, message: &str) -> Response {
    let body = sonic_rs::to_string(&sonic_rs::json!({
        "error": message
    }))
    .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::Pool(ref e) => {
                tracing::error!("Database pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::CreatePool(ref e) => {
                tracing::error!("Database pool setup error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::MissingData(ref column) => {
                tracing::error!("Missing column in row: {}", column);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::AuthenticationMissing => {
                tracing::debug!("Request without a valid session");
                (StatusCode::UNAUTHORIZED, UNAUTHORIZED_MESSAGE.to_string())
            }

            AppError::AuthorizationDenied => {
                tracing::warn!("Authorization failed");
                (StatusCode::FORBIDDEN, FORBIDDEN_MESSAGE.to_string())
            }

            AppError::MethodNotAllowed {
                ref method,
                ref allowed,
            } => {
                tracing::debug!("Method {} not allowed", method);
                let mut response = error_body(
                    StatusCode::METHOD_NOT_ALLOWED,
                    &format!("Método {} no permitido", method),
                );
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(header::ALLOW, value);
                }
                return response;
            }

            AppError::InvalidCredentials => {
                tracing::warn!("Login rejected: invalid credentials");
                (StatusCode::UNAUTHORIZED, "Credenciales inválidas".to_string())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, "Resource not found".to_string())
            }

            AppError::Token(ref e) => {
                tracing::error!("Session token error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::Siigo(ref e) if e.is_credential_failure() => {
                tracing::error!("Siigo credential failure: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, SIIGO_FAILURE_MESSAGE.to_string())
            }

            AppError::Siigo(ref e) => {
                tracing::error!("Siigo request failed: {}", e);
                (StatusCode::BAD_GATEWAY, SIIGO_FAILURE_MESSAGE.to_string())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        error_body(status, &message)
    }
}

impl From<AppError> for Response {
    fn from(error: AppError) -> Self {
        error.into_response()
    }
}
