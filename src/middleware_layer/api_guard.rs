//! Checks every API handler runs before doing any work.
//!
//! Both checks return a decision carrying a ready-made rejection. Handlers
//! convert it with `into_result()?` so a failed check returns the rejection
//! untouched:
//!
//! ```ignore
//! validate_http_method(&method, &[Method::GET]).into_result()?;
//! let role = validate_api_role(&session, &[Role::Admin]).into_result()?;
//! ```

use axum::{
    http::Method,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    models::{role::Role, session::SessionState},
};

/// Result of [`validate_http_method`].
pub struct MethodCheck {
    pub is_valid_method: bool,
    /// A 405 with an `Allow` header when the method is refused.
    pub response: Option<Response>,
}

impl MethodCheck {
    pub fn into_result(self) -> Result<(), Response> {
        match self.response {
            Some(response) if !self.is_valid_method => Err(response),
            _ => Ok(()),
        }
    }
}

/// Result of [`validate_api_role`].
pub struct RoleCheck {
    pub is_authorized: bool,
    /// The caller's role, `NoAutenticado` without a valid session.
    pub user_role: Role,
    /// A 401 or 403 when the caller is refused.
    pub response: Option<Response>,
}

impl RoleCheck {
    pub fn into_result(self) -> Result<Role, Response> {
        if self.is_authorized {
            return Ok(self.user_role);
        }
        Err(self
            .response
            .unwrap_or_else(|| AppError::AuthenticationMissing.into_response()))
    }
}

/// Refuses any method outside `allowed` with a 405.
pub fn validate_http_method(method: &Method, allowed: &[Method]) -> MethodCheck {
    if allowed.contains(method) {
        return MethodCheck {
            is_valid_method: true,
            response: None,
        };
    }

    MethodCheck {
        is_valid_method: false,
        response: Some(
            AppError::MethodNotAllowed {
                method: method.clone(),
                allowed: allowed.to_vec(),
            }
            .into_response(),
        ),
    }
}

/// Refuses callers without a valid session (401) or whose role is not in
/// `allowed` (403).
pub fn validate_api_role(session: &SessionState, allowed: &[Role]) -> RoleCheck {
    let unauthorized = |user_role: Role, error: AppError| RoleCheck {
        is_authorized: false,
        user_role,
        response: Some(error.into_response()),
    };

    match session {
        SessionState::Absent => {
            tracing::debug!("❌ API request without session cookie");
            unauthorized(Role::NoAutenticado, AppError::AuthenticationMissing)
        }
        SessionState::Invalid(e) => {
            tracing::warn!("❌ API request with invalid session: {}", e);
            unauthorized(Role::NoAutenticado, AppError::AuthenticationMissing)
        }
        SessionState::MissingRole => {
            tracing::warn!("❌ API request with session lacking a role");
            unauthorized(Role::NoAutenticado, AppError::AuthenticationMissing)
        }
        SessionState::Authenticated(s) if !allowed.contains(&s.role) => {
            tracing::warn!(
                "❌ User {} with role {} refused (allowed: {:?})",
                s.user_id,
                s.role,
                allowed
            );
            unauthorized(s.role, AppError::AuthorizationDenied)
        }
        SessionState::Authenticated(s) => RoleCheck {
            is_authorized: true,
            user_role: s.role,
            response: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::token::TokenError;
    use crate::models::session::Session;
    use axum::http::{StatusCode, header};
    use chrono::{Duration, Utc};

    fn authenticated(role: Role) -> SessionState {
        SessionState::Authenticated(Session {
            user_id: 8,
            email: "eva@example.com".to_string(),
            role,
            issued_at: Utc::now(),
            expires_at: Utc::now() + Duration::days(7),
        })
    }

    async fn body_of(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn refuses_method_with_allow_header() {
        let check = validate_http_method(&Method::POST, &[Method::GET]);
        assert!(!check.is_valid_method);
        let response = check.into_result().unwrap_err();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET");
        assert_eq!(body_of(response).await, r#"{"error":"Método POST no permitido"}"#);
    }

    #[test]
    fn allow_header_lists_every_method() {
        let response = validate_http_method(&Method::DELETE, &[Method::GET, Method::POST])
            .into_result()
            .unwrap_err();
        assert_eq!(response.headers()[header::ALLOW], "GET, POST");
    }

    #[test]
    fn accepts_listed_method() {
        let check = validate_http_method(&Method::GET, &[Method::GET, Method::HEAD]);
        assert!(check.is_valid_method);
        assert!(check.response.is_none());
        assert!(check.into_result().is_ok());
    }

    #[tokio::test]
    async fn refuses_missing_session_with_401() {
        let check = validate_api_role(&SessionState::Absent, &[Role::Admin]);
        assert!(!check.is_authorized);
        assert_eq!(check.user_role, Role::NoAutenticado);
        let response = check.into_result().unwrap_err();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_of(response).await, r#"{"error":"No autorizado"}"#);
    }

    #[test]
    fn refuses_invalid_or_roleless_session_with_401() {
        for state in [
            SessionState::Invalid(TokenError::Expired),
            SessionState::Invalid(TokenError::InvalidSignature),
            SessionState::MissingRole,
        ] {
            let response = validate_api_role(&state, &[Role::Admin])
                .into_result()
                .unwrap_err();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn refuses_role_outside_allow_list_with_403() {
        let check = validate_api_role(&authenticated(Role::Colaborador), &[Role::Admin]);
        assert!(!check.is_authorized);
        assert_eq!(check.user_role, Role::Colaborador);
        let response = check.into_result().unwrap_err();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_of(response).await,
            r#"{"error":"Acceso prohibido: No tienes permisos para esta operación"}"#
        );
    }

    #[test]
    fn authorizes_listed_role() {
        let check = validate_api_role(
            &authenticated(Role::Directivo),
            &[Role::Admin, Role::Directivo],
        );
        assert!(check.is_authorized);
        assert!(check.response.is_none());
        assert_eq!(check.into_result().unwrap(), Role::Directivo);
    }
}
