use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::any,
};
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
    compression::CompressionLayer,
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{handlers, middleware_layer, state::AppState};

/// Seconds between replenished login attempts per client IP.
const LOGIN_REPLENISH_SECS: u64 = 12;

/// Largest request body accepted by the API.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Builds the application router.
///
/// API routes accept every method so each handler can answer disallowed
/// verbs with its own 405. Everything else is a page served from the UI
/// bundle, behind the gatekeeper.
pub fn build_router(state: AppState) -> Router {
    let mut login_routes =
        Router::new().route("/api/auth/login", any(handlers::auth::login));

    let burst = state.config.login_rate_limit_burst;
    if burst > 0 {
        match GovernorConfigBuilder::default()
            .per_second(LOGIN_REPLENISH_SECS)
            .burst_size(burst)
            .finish()
        {
            Some(governor) => {
                login_routes = login_routes.layer(GovernorLayer::new(Arc::new(governor)));
                tracing::info!("✅ Login rate limit: burst of {} per IP", burst);
            }
            None => tracing::warn!("⚠️  Invalid login rate limit, throttling disabled"),
        }
    }

    let api_routes = Router::new()
        .route("/api/auth/logout", any(handlers::auth::logout))
        .route("/api/auth/me", any(handlers::auth::me))
        .route("/api/users", any(handlers::users::list_users))
        .route("/api/siigo/{resource}", any(handlers::siigo::fetch_resource));

    let public_dir = &state.config.public_dir;
    let pages = ServeDir::new(public_dir).fallback(ServeFile::new(public_dir.join("index.html")));

    Router::new()
        .merge(login_routes)
        .merge(api_routes)
        .fallback_service(pages)
        .layer(from_fn_with_state(
            state.clone(),
            middleware_layer::gatekeeper::guard_pages,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware_layer::session::load_session,
        ))
        .layer(CookieManagerLayer::new())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .with_state(state)
}
