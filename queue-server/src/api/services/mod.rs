//! Service Catalog API 模块

mod handler;

use axum::{
    Router, middleware,
    routing::{get, put},
};

use crate::auth::require_admin;
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/services", routes())
}

fn routes() -> Router<ServerState> {
    // 取号表单需要展示可选服务，无需登录
    let read_routes = Router::new().route("/", get(handler::list_active));

    let manage_routes = Router::new()
        .route("/", axum::routing::post(handler::create))
        .route("/all", get(handler::list_all))
        .route("/{id}", put(handler::update))
        .route_layer(middleware::from_fn(require_admin));

    read_routes.merge(manage_routes)
}
