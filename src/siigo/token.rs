use chrono::{DateTime, Duration, Utc};
use http::header;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::RwLock;
use zeroize::Zeroizing;

use crate::config::SiigoConfig;
use crate::siigo::error::SiigoError;

/// A cached token is renewed this many seconds before it expires.
pub const RENEWAL_MARGIN_SECS: i64 = 300;

/// Source of bearer tokens for the Siigo API.
pub trait UpstreamCredentials: Send + Sync {
    /// Returns the cached token, exchanging credentials when it is stale.
    fn get_token(&self) -> impl Future<Output = Result<String, SiigoError>> + Send;

    /// Discards the cached token and exchanges credentials again.
    fn force_renew(&self) -> impl Future<Output = Result<String, SiigoError>> + Send;
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    username: &'a str,
    access_key: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(RENEWAL_MARGIN_SECS) < self.expires_at
    }
}

/// Owns the single Siigo bearer token of the process.
///
/// Concurrent callers share the cached value. Two callers finding it stale
/// at the same time may both renew; the last write wins and both tokens are
/// valid upstream.
pub struct SiigoTokenManager {
    http: reqwest::Client,
    auth_url: String,
    partner_id: String,
    username: Option<String>,
    access_key: Option<Zeroizing<String>>,
    cached: RwLock<Option<CachedToken>>,
}

impl SiigoTokenManager {
    pub fn new(http: reqwest::Client, config: &SiigoConfig) -> Self {
        Self {
            http,
            auth_url: format!("{}/auth", config.api_url),
            partner_id: config.partner_id.clone(),
            username: config.username.clone(),
            access_key: config.access_key.clone(),
            cached: RwLock::new(None),
        }
    }

    async fn exchange(&self, now: DateTime<Utc>) -> Result<CachedToken, SiigoError> {
        let (Some(username), Some(access_key)) = (&self.username, &self.access_key) else {
            tracing::error!("❌ Siigo username or access key not configured");
            return Err(SiigoError::MissingCredentials);
        };

        let body = sonic_rs::to_string(&AuthRequest {
            username,
            access_key: access_key.as_str(),
        })
        .map_err(|e| SiigoError::Decode(e.to_string()))?;

        tracing::debug!("🔑 Requesting Siigo token");
        let response = self
            .http
            .post(&self.auth_url)
            .header("Partner-Id", &self.partner_id)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::error!("❌ Siigo credential exchange rejected: {}", status);
            return Err(SiigoError::UpstreamAuth {
                status,
                detail: text,
            });
        }

        let auth: AuthResponse =
            sonic_rs::from_str(&text).map_err(|e| SiigoError::Decode(e.to_string()))?;
        let expires_at = Some(auth.expires_in)
            .filter(|secs| *secs > 0)
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                tracing::error!("❌ Siigo token has an unusable expires_in: {}", auth.expires_in);
                SiigoError::Decode(format!("invalid expires_in {}", auth.expires_in))
            })?;

        tracing::info!(
            token_type = auth.token_type.as_deref().unwrap_or("Bearer"),
            scope = auth.scope.as_deref().unwrap_or(""),
            "✅ Siigo token obtained, expires at {}",
            expires_at
        );

        Ok(CachedToken {
            access_token: auth.access_token,
            expires_at,
        })
    }

    /// Returns the cached token as of `now`, exchanging credentials when it
    /// expires within [`RENEWAL_MARGIN_SECS`].
    ///
    /// # Arguments
    ///
    /// * `now` - The instant freshness is judged against.
    ///
    /// # Returns
    ///
    /// A `Result` containing the bearer token.
    pub async fn get_token_at(&self, now: DateTime<Utc>) -> Result<String, SiigoError> {
        if let Some(token) = self.cached.read().await.as_ref() {
            if token.is_fresh(now) {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.exchange(now).await?;
        let access_token = fresh.access_token.clone();
        *self.cached.write().await = Some(fresh);
        Ok(access_token)
    }
}

impl UpstreamCredentials for SiigoTokenManager {
    async fn get_token(&self) -> Result<String, SiigoError> {
        self.get_token_at(Utc::now()).await
    }

    async fn force_renew(&self) -> Result<String, SiigoError> {
        tracing::warn!("🔄 Discarding cached Siigo token");
        self.cached.write().await.take();
        self.get_token().await
    }
}
