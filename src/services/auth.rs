use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use deadpool_postgres::Pool;

use crate::crypto::token::{SessionClaims, SessionCodec};
use crate::error::{AppError, Result};
use crate::models::user::User;
use crate::repositories::user as user_repo;

/// Argon2id hash at the default cost, verified when no account matches.
const DUMMY_PASSWORD_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$dGltaW5nLWVxdWFsaXplcg$AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8";

/// Verifies a password against an Argon2 PHC hash.
///
/// # Arguments
///
/// * `password` - The password to verify.
/// * `hash` - The stored PHC string.
///
/// # Returns
///
/// A `Result` containing whether the password matches.
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Hash parse error: {}", e)))?;
    let result = Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok();

    tracing::debug!("Password verification completed");
    Ok(result)
}

/// Checks a user's credentials, returning the user when they match.
///
/// Every failure is the same `InvalidCredentials`, and an unknown account
/// still pays for one Argon2 verification.
///
/// # Arguments
///
/// * `user` - The account found for the submitted email, if any.
/// * `password` - The submitted password.
///
/// # Returns
///
/// A `Result` containing the authenticated `User`.
pub fn check_credentials(user: Option<User>, password: &str) -> Result<User> {
    let Some(user) = user else {
        verify_password(password, DUMMY_PASSWORD_HASH)?;
        return Err(AppError::InvalidCredentials);
    };

    let password_matches = verify_password(password, &user.password)?;
    if !password_matches || !user.is_active || !user.role.is_authenticated() {
        return Err(AppError::InvalidCredentials);
    }

    Ok(user)
}

/// Authenticates a user by email and password.
///
/// # Arguments
///
/// * `pool` - The user directory connection pool.
/// * `email` - The submitted email, matched case-insensitively.
/// * `password` - The submitted password.
///
/// # Returns
///
/// A `Result` containing the authenticated `User`.
pub async fn authenticate_user(pool: &Pool, email: &str, password: &str) -> Result<User> {
    tracing::debug!("🔐 Authenticating user: {}", email);

    let user = user_repo::find_active_by_email(pool, email).await?;
    let user = check_credentials(user, password)?;

    tracing::info!("✅ User authenticated: {}", user.id);
    Ok(user)
}

/// Issues the session token for an authenticated user.
///
/// # Arguments
///
/// * `codec` - The session codec.
/// * `user` - The authenticated user.
///
/// # Returns
///
/// A `Result` containing the signed token.
pub fn open_session(codec: &SessionCodec, user: &User) -> Result<String> {
    let token = codec.issue(&SessionClaims {
        subject_id: user.id,
        email: user.email.clone(),
        role: user.role,
    })?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::Role;
    use argon2::password_hash::{PasswordHasher, SaltString};

    fn user(password: &str, role: Role, is_active: bool) -> User {
        let salt = SaltString::encode_b64(b"fixed-test-salt!").unwrap();
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .unwrap()
            .to_string();
        User {
            id: 11,
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            password: hash,
            role,
            is_active,
        }
    }

    #[test]
    fn accepts_matching_password() {
        let checked = check_credentials(Some(user("correcto", Role::Comercial, true)), "correcto")
            .unwrap();
        assert_eq!(checked.id, 11);
    }

    #[test]
    fn rejects_wrong_password_unknown_user_and_inactive_account() {
        for (candidate, password) in [
            (Some(user("correcto", Role::Admin, true)), "incorrecto"),
            (None, "correcto"),
            (Some(user("correcto", Role::Admin, false)), "correcto"),
            (Some(user("correcto", Role::NoAutenticado, true)), "correcto"),
        ] {
            assert!(matches!(
                check_credentials(candidate, password),
                Err(AppError::InvalidCredentials)
            ));
        }
    }

    #[test]
    fn dummy_hash_is_checked_for_unknown_accounts() {
        assert!(PasswordHash::new(DUMMY_PASSWORD_HASH).is_ok());
        assert!(!verify_password("correcto", DUMMY_PASSWORD_HASH).unwrap());
        assert!(matches!(
            check_credentials(None, "correcto"),
            Err(AppError::InvalidCredentials)
        ));
    }

    #[test]
    fn session_carries_user_identity() {
        let codec = SessionCodec::new(b"an-unguessable-secret-of-32-bytes!!");
        let token = open_session(&codec, &user("x", Role::Directivo, true)).unwrap();
        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.subject_id, 11);
        assert_eq!(claims.role, Some(Role::Directivo));
    }
}
