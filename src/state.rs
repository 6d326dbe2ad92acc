use deadpool_postgres::Pool;
use std::sync::Arc;
use crate::config::Config;
use crate::crypto::token::SessionCodec;
use crate::error::{AppError, Result};
use crate::services::permissions::PermissionTable;
use crate::siigo::client::{SiigoClient, build_http_client};
use crate::siigo::token::SiigoTokenManager;

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The user directory connection pool.
    pub db: Pool,
    /// The application's configuration.
    pub config: Config,
    /// Signs and verifies session cookies.
    pub codec: SessionCodec,
    /// Route permissions for page requests.
    pub permissions: Arc<PermissionTable>,
    /// The Siigo API client, sharing one token manager.
    pub siigo: SiigoClient,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// Builds every process-wide component once: the permission table, the
    /// session codec and the Siigo token manager.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub fn new(config: &Config) -> Result<Self> {
        let db = crate::db::create_pool(&config.database_url)?;
        tracing::info!("✅ PostgreSQL pool initialized");

        let permissions = PermissionTable::backoffice(config.unlisted_route_policy)
            .map_err(|e| AppError::Internal(format!("Invalid permission table: {}", e)))?;
        tracing::info!(
            "✅ Route permission table built ({} templates, unlisted routes: {})",
            permissions.templates().count(),
            permissions.unlisted_policy()
        );

        let codec = SessionCodec::new(&config.session_secret);

        let http = build_http_client(&config.siigo)?;
        let token_manager = Arc::new(SiigoTokenManager::new(http.clone(), &config.siigo));
        let siigo = SiigoClient::new(http, &config.siigo, token_manager);
        if config.siigo.username.is_none() || config.siigo.access_key.is_none() {
            tracing::warn!("⚠️  Siigo credentials not configured, integration calls will fail");
        }
        tracing::info!("✅ Siigo client initialized for {}", config.siigo.api_url);

        Ok(AppState {
            db,
            config: config.clone(),
            codec,
            permissions: Arc::new(permissions),
            siigo,
        })
    }
}
