//! Staff API 模块

mod handler;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::auth::{require_admin, require_staff};
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/staff", routes())
}

fn routes() -> Router<ServerState> {
    // 取号表单的 "指定理发师" 下拉框
    let public_routes = Router::new().route("/available", get(handler::list_available));

    let self_routes = Router::new()
        .route("/me/availability", post(handler::set_my_availability))
        .route_layer(middleware::from_fn(require_staff));

    let manage_routes = Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/{id}", put(handler::update).delete(handler::delete))
        .route_layer(middleware::from_fn(require_admin));

    public_routes.merge(self_routes).merge(manage_routes)
}
