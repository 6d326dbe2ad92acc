use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::crypto::token::{SessionCodec, TokenClaims, TokenError};
use crate::models::role::Role;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// A verified session. Its role is fixed for the lifetime of the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// The ID of the user this session belongs to.
    pub user_id: i64,
    /// The email the user logged in with.
    pub email: String,
    /// The role granted at login.
    pub role: Role,
    /// The timestamp when the session was created.
    pub issued_at: DateTime<Utc>,
    /// The timestamp when the session expires.
    pub expires_at: DateTime<Utc>,
}

/// Outcome of reading the session cookie, decided once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No session cookie was sent.
    Absent,
    /// A cookie was sent but failed verification.
    Invalid(TokenError),
    /// The token verified but carries no usable role.
    MissingRole,
    /// A valid session.
    Authenticated(Session),
}

impl SessionState {
    /// Verifies the raw cookie value, if any.
    pub fn from_token(codec: &SessionCodec, token: Option<&str>) -> Self {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return SessionState::Absent;
        };

        match codec.verify(token) {
            Err(e) => SessionState::Invalid(e),
            Ok(claims) => match claims.role {
                Some(role) if role.is_authenticated() => {
                    SessionState::Authenticated(Session::from_claims(&claims, role))
                }
                _ => SessionState::MissingRole,
            },
        }
    }

    /// The session, when one is valid.
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }
}

impl Session {
    fn from_claims(claims: &TokenClaims, role: Role) -> Self {
        Self {
            user_id: claims.subject_id,
            email: claims.email.clone(),
            role,
            issued_at: claims.issued_at(),
            expires_at: claims.expires_at(),
        }
    }
}
