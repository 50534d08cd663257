//! Administrative endpoints: plugin listing, health, service banner.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

/// Admin routes, merged into the main router before state is applied.
///
/// Only `/plugins` sits behind the admin key; `/health` and `/` stay open for
/// load balancers and humans.
pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    let guarded = Router::new()
        .route("/plugins", get(get_plugins))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware));

    Router::new()
        .route("/health", get(get_health))
        .route("/", get(get_root))
        .merge(guarded)
}
