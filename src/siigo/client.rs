use http::{StatusCode, header};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SiigoConfig;
use crate::siigo::error::SiigoError;
use crate::siigo::token::{SiigoTokenManager, UpstreamCredentials};

/// Connect timeout for every Siigo request.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Builds the HTTP client shared by the token manager and the API client.
pub fn build_http_client(config: &SiigoConfig) -> Result<reqwest::Client, SiigoError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()?)
}

/// Authorized access to the Siigo API.
///
/// Every call carries the current bearer token. A 401 triggers one forced
/// renewal and one retry; a 401 on the retry is returned as
/// `SiigoError::Unauthorized` without further attempts.
pub struct SiigoClient<C = SiigoTokenManager> {
    http: reqwest::Client,
    base_url: String,
    partner_id: String,
    credentials: Arc<C>,
}

impl<C> Clone for SiigoClient<C> {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            partner_id: self.partner_id.clone(),
            credentials: Arc::clone(&self.credentials),
        }
    }
}

impl<C: UpstreamCredentials> SiigoClient<C> {
    pub fn new(http: reqwest::Client, config: &SiigoConfig, credentials: Arc<C>) -> Self {
        Self {
            http,
            base_url: config.api_url.clone(),
            partner_id: config.partner_id.clone(),
            credentials,
        }
    }

    /// Fetches `path` (and optional raw query string) and returns the body.
    pub async fn get(&self, path: &str, query: Option<&str>) -> Result<String, SiigoError> {
        let url = match query.filter(|q| !q.is_empty()) {
            Some(query) => format!("{}{}?{}", self.base_url, path, query),
            None => format!("{}{}", self.base_url, path),
        };

        let token = self.credentials.get_token().await?;
        let mut response = self.send_once(&url, &token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("⚠️  Siigo rejected the cached token for {}, renewing", path);
            let token = self.credentials.force_renew().await?;
            response = self.send_once(&url, &token).await?;

            if response.status() == StatusCode::UNAUTHORIZED {
                tracing::error!("❌ Siigo rejected the renewed token for {}", path);
                return Err(SiigoError::Unauthorized);
            }
        }

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SiigoError::Upstream { status, body });
        }

        tracing::debug!("✅ Siigo {} answered {}", path, status);
        Ok(body)
    }

    async fn send_once(&self, url: &str, token: &str) -> Result<reqwest::Response, SiigoError> {
        Ok(self
            .http
            .get(url)
            .bearer_auth(token)
            .header("Partner-Id", &self.partner_id)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use mockito::{Matcher, Server};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hands out `token-N`, counting renewals.
    #[derive(Default)]
    struct CountingCredentials {
        renewals: AtomicUsize,
    }

    impl UpstreamCredentials for CountingCredentials {
        async fn get_token(&self) -> Result<String, SiigoError> {
            Ok(format!("token-{}", self.renewals.load(Ordering::SeqCst)))
        }

        async fn force_renew(&self) -> Result<String, SiigoError> {
            self.renewals.fetch_add(1, Ordering::SeqCst);
            self.get_token().await
        }
    }

    fn client(url: &str) -> (SiigoClient<CountingCredentials>, Arc<CountingCredentials>) {
        let credentials = Arc::new(CountingCredentials::default());
        let config = Config::for_tests(url).siigo;
        let client = SiigoClient::new(reqwest::Client::new(), &config, Arc::clone(&credentials));
        (client, credentials)
    }

    #[tokio::test]
    async fn sends_bearer_token_and_partner_id() {
        let mut server = Server::new_async().await;
        let customers = server
            .mock("GET", "/v1/customers")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .match_header("authorization", "Bearer token-0")
            .match_header("partner-id", "backoffice")
            .with_status(200)
            .with_body(r#"{"results":[]}"#)
            .expect(1)
            .create_async()
            .await;

        let (client, credentials) = client(&server.url());
        let body = client.get("/v1/customers", Some("page=2")).await.unwrap();
        assert_eq!(body, r#"{"results":[]}"#);
        assert_eq!(credentials.renewals.load(Ordering::SeqCst), 0);
        customers.assert_async().await;
    }

    #[tokio::test]
    async fn retries_once_after_renewing_on_401() {
        let mut server = Server::new_async().await;
        let rejected = server
            .mock("GET", "/v1/products")
            .match_header("authorization", "Bearer token-0")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let accepted = server
            .mock("GET", "/v1/products")
            .match_header("authorization", "Bearer token-1")
            .with_status(200)
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;

        let (client, credentials) = client(&server.url());
        assert_eq!(client.get("/v1/products", None).await.unwrap(), "[]");
        assert_eq!(credentials.renewals.load(Ordering::SeqCst), 1);
        rejected.assert_async().await;
        accepted.assert_async().await;
    }

    #[tokio::test]
    async fn second_401_is_fatal() {
        let mut server = Server::new_async().await;
        let rejected = server
            .mock("GET", "/v1/invoices")
            .with_status(401)
            .expect(2)
            .create_async()
            .await;

        let (client, credentials) = client(&server.url());
        let result = client.get("/v1/invoices", None).await;
        assert!(matches!(result, Err(SiigoError::Unauthorized)));
        assert_eq!(credentials.renewals.load(Ordering::SeqCst), 1);
        rejected.assert_async().await;
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let mut server = Server::new_async().await;
        let failing = server
            .mock("GET", "/v1/taxes")
            .with_status(500)
            .with_body("boom")
            .expect(1)
            .create_async()
            .await;

        let (client, credentials) = client(&server.url());
        match client.get("/v1/taxes", None).await {
            Err(SiigoError::Upstream { status, body }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Upstream, got {:?}", other),
        }
        assert_eq!(credentials.renewals.load(Ordering::SeqCst), 0);
        failing.assert_async().await;
    }

    #[tokio::test]
    async fn renews_through_token_manager() {
        let mut server = Server::new_async().await;
        let auth = server
            .mock("POST", "/auth")
            .with_status(200)
            .with_body(r#"{"access_token":"managed","expires_in":86400,"token_type":"Bearer","scope":"SiigoAPI"}"#)
            .expect(2)
            .create_async()
            .await;
        let rejected = server
            .mock("GET", "/v1/customers")
            .with_status(401)
            .expect(2)
            .create_async()
            .await;

        let config = Config::for_tests(&server.url()).siigo;
        let http = build_http_client(&config).unwrap();
        let manager = Arc::new(SiigoTokenManager::new(http.clone(), &config));
        let client = SiigoClient::new(http, &config, manager);

        assert!(matches!(
            client.get("/v1/customers", None).await,
            Err(SiigoError::Unauthorized)
        ));
        auth.assert_async().await;
        rejected.assert_async().await;
    }
}
