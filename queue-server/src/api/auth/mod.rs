//! Authentication Routes

mod handler;

use axum::{Router, middleware, routing::get, routing::post};

use crate::auth::require_staff;
use crate::core::ServerState;

/// - /api/auth/login: public
/// - /api/auth/me: staff only
pub fn router() -> Router<ServerState> {
    let protected = Router::new()
        .route("/api/auth/me", get(handler::me))
        .route_layer(middleware::from_fn(require_staff));

    Router::new()
        .route("/api/auth/login", post(handler::login))
        .merge(protected)
}
