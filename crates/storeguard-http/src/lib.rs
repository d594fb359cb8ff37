//! Storeguard HTTP - axum adapter for the request-defense layer.
//!
//! Provides:
//! - Client IP extraction (`x-forwarded-for` → `x-real-ip` →
//!   `cf-connecting-ip` → peer address → loopback)
//! - Per-action rate-limit middleware (429 + `Retry-After`)
//! - `SanitizedJson` extractor (403 on attack patterns)
//! - Request-ID middleware
//! - Screening, admin and system routes

pub mod client_ip;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;

use axum::Router;
use axum::routing::{get, post};
use storeguard_service::policy::ActionKind;
use tower_http::trace::TraceLayer;

use middleware::rate_limit::{Guarded, rate_limit_middleware};

pub use client_ip::ClientIp;
pub use error::ApiError;
pub use extract::SanitizedJson;
pub use state::AppState;

/// Wraps `router` so every request is counted against `kind`.
pub fn guard(router: Router<AppState>, state: &AppState, kind: ActionKind) -> Router<AppState> {
    router.route_layer(axum::middleware::from_fn_with_state(
        Guarded::new(state.clone(), kind),
        rate_limit_middleware,
    ))
}

/// Builds the HTTP API router.
pub fn router(state: AppState) -> Router {
    let mut screen = Router::new();
    for kind in state.policies().kinds() {
        let route = Router::new().route(&format!("/screen/{kind}"), post(routes::screen::screen));
        screen = screen.merge(guard(route, &state, kind));
    }

    let admin = Router::new()
        .route("/admin/rate-limits", get(routes::admin::rate_limit_stats))
        .route(
            "/admin/rate-limits/{action}/{identifier}",
            get(routes::admin::rate_limit_status).delete(routes::admin::rate_limit_reset),
        );
    let admin = if state.policies().lookup(ActionKind::General).is_ok() {
        guard(admin, &state, ActionKind::General)
    } else {
        admin
    };

    Router::new()
        .merge(screen)
        .merge(admin)
        .route("/validate", post(routes::screen::validate))
        .route("/health", get(routes::system::health))
        .route("/metrics", get(routes::system::metrics_endpoint))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            middleware::request_id::request_id_middleware,
        ))
        .with_state(state)
}

/// Serve the HTTP router on the given listener with graceful shutdown.
///
/// Wraps `axum::serve` with `ConnectInfo<SocketAddr>` so rate limiting
/// can fall back to the peer address.
pub async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}
