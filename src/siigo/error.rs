use http::StatusCode;
use thiserror::Error;

/// Failures talking to the Siigo accounting API.
#[derive(Error, Debug)]
pub enum SiigoError {
    /// Username or access key is not configured.
    #[error("Siigo credentials are not configured")]
    MissingCredentials,

    /// The credential exchange was rejected.
    #[error("Siigo rejected the credential exchange ({status}): {detail}")]
    UpstreamAuth { status: StatusCode, detail: String },

    /// A freshly renewed token was rejected as well.
    #[error("Siigo rejected the request after renewing the token")]
    Unauthorized,

    /// Any other non-success response.
    #[error("Siigo responded {status}: {body}")]
    Upstream { status: StatusCode, body: String },

    /// Transport failure, including timeouts.
    #[error("Siigo request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be decoded.
    #[error("Invalid Siigo response: {0}")]
    Decode(String),
}

impl SiigoError {
    /// Whether the failure concerns the upstream credential rather than the
    /// request itself.
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            SiigoError::MissingCredentials
                | SiigoError::UpstreamAuth { .. }
                | SiigoError::Unauthorized
        )
    }
}
