use std::net::SocketAddr;
use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod routes;
mod state;

mod crypto {
    pub mod token;
}

mod models {
    pub mod role;
    pub mod session;
    pub mod user;
}

mod repositories {
    pub mod user;
}

mod services {
    pub mod auth;
    pub mod permissions;
}

mod siigo {
    pub mod client;
    pub mod error;
    pub mod token;
}

mod handlers {
    pub mod auth;
    pub mod siigo;
    pub mod users;
}

mod middleware_layer {
    pub mod api_guard;
    pub mod gatekeeper;
    pub mod session;
}

mod validation {
    pub mod auth;
}

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::new(&config).context("Failed to initialize application state")?;
    tracing::info!("✅ AppState initialized");

    let app = routes::build_router(state);

    let addr = config.bind_addr;
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("🚀 Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
