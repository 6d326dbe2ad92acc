use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::models::role::Role;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of a session token in days.
pub const SESSION_TTL_DAYS: i64 = 7;

/// The only algorithm issued and accepted.
const ALGORITHM: &str = "HS256";

/// Errors produced while issuing or verifying a session token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The MAC does not match the header and payload.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// The token is past its expiry.
    #[error("Token expired")]
    Expired,

    /// The token cannot be parsed.
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Sessions are never issued for the unauthenticated sentinel.
    #[error("Cannot issue a session for role {0}")]
    UnauthenticatedRole(Role),

    /// The claims could not be serialized or the key was rejected.
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

/// Identity established at login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub subject_id: i64,
    pub email: String,
    pub role: Role,
}

/// Claims carried in the token payload.
///
/// `role` is optional on the wire so that a well-signed token without a
/// role decodes and is rejected by the caller instead of by the codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "id")]
    pub subject_id: i64,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub iat: i64,
    pub exp: i64,
}

impl TokenClaims {
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }
}

#[derive(Serialize, Deserialize)]
struct TokenHeader<'a> {
    alg: &'a str,
    typ: &'a str,
}

/// Signs and verifies compact HS256 session tokens.
///
/// The secret is copied in once at construction; verification touches no
/// other state and is safe to run on every request.
#[derive(Clone)]
pub struct SessionCodec {
    secret: Zeroizing<Vec<u8>>,
    ttl: Duration,
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionCodec {
    /// Creates a codec signing with `secret`.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            secret: Zeroizing::new(secret.to_vec()),
            ttl: Duration::days(SESSION_TTL_DAYS),
        }
    }

    /// Issues a token for `claims` valid for seven days from now.
    pub fn issue(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        self.issue_at(claims, Utc::now())
    }

    /// Verifies `token` against the current time.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Issues a token as if the current time were `issued_at`.
    pub fn issue_at(
        &self,
        claims: &SessionClaims,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        if !claims.role.is_authenticated() {
            return Err(TokenError::UnauthenticatedRole(claims.role));
        }

        let payload = TokenClaims {
            subject_id: claims.subject_id,
            email: claims.email.clone(),
            role: Some(claims.role),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };

        self.encode(&payload)
    }

    /// Verifies `token` as if the current time were `now`.
    ///
    /// The signature is checked before the payload is parsed, so a tampered
    /// payload reports `InvalidSignature` rather than `Malformed`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed("expected three segments".to_string()));
        };

        let header_bytes = decode_segment(header_b64, "header")?;
        let header: TokenHeader<'_> = sonic_rs::from_slice(&header_bytes)
            .map_err(|e| TokenError::Malformed(format!("header: {}", e)))?;
        if header.alg != ALGORITHM {
            return Err(TokenError::Malformed(format!(
                "unsupported algorithm {}",
                header.alg
            )));
        }

        let signature = decode_segment(signature_b64, "signature")?;
        let expected = self.sign(&header_b64, &payload_b64)?;
        if !bool::from(expected.as_slice().ct_eq(signature.as_slice())) {
            return Err(TokenError::InvalidSignature);
        }

        let payload_bytes = decode_segment(payload_b64, "payload")?;
        let claims: TokenClaims = sonic_rs::from_slice(&payload_bytes)
            .map_err(|e| TokenError::Malformed(format!("payload: {}", e)))?;

        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn encode(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        let header = sonic_rs::to_string(&TokenHeader {
            alg: ALGORITHM,
            typ: "JWT",
        })
        .map_err(|e| TokenError::Encoding(e.to_string()))?;
        let payload =
            sonic_rs::to_string(claims).map_err(|e| TokenError::Encoding(e.to_string()))?;

        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
        let signature = self.sign(&header_b64, &payload_b64)?;

        Ok(format!(
            "{}.{}.{}",
            header_b64,
            payload_b64,
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    fn sign(&self, header_b64: &str, payload_b64: &str) -> Result<Vec<u8>, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>, TokenError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::Malformed(format!("{}: {}", name, e)))
}
