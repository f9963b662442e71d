//! Daily Closing API 模块 (日结)

mod handler;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::{require_admin, require_staff};
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/closings", routes())
}

fn routes() -> Router<ServerState> {
    let read_routes = Router::new()
        .route("/summary", get(handler::summary))
        .route_layer(middleware::from_fn(require_staff));

    let admin_routes = Router::new()
        .route("/close", post(handler::close))
        .route("/history", get(handler::history))
        .route_layer(middleware::from_fn(require_admin));

    read_routes.merge(admin_routes)
}
