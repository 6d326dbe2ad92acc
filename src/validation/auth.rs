use garde::Validate;
use serde::Deserialize;

use crate::error::{AppError, Result};

/// The request payload for login.
#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[garde(email, length(max = 255))]
    pub email: String,
    #[garde(length(min = 1, max = 128))]
    pub password: String,
}

/// Parses and validates a login body.
///
/// # Arguments
///
/// * `body` - The raw JSON request body.
///
/// # Returns
///
/// A `Result` containing the validated `LoginRequest`.
pub fn parse_login(body: &[u8]) -> Result<LoginRequest> {
    let payload: LoginRequest = sonic_rs::from_slice(body)
        .map_err(|_| AppError::Validation("Invalid login payload".to_string()))?;

    payload
        .validate()
        .map_err(|report| AppError::Validation(report.to_string()))?;

    Ok(payload)
}
