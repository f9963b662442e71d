//! Ticket API 模块 (排队)
//!
//! 公共路由供自助取号终端和排队大屏使用，员工路由需要登录。

mod handler;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::{require_admin, require_staff};
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/tickets", routes())
}

fn routes() -> Router<ServerState> {
    // 公共路由：取号、排队查询、取消、实时事件
    let public_routes = Router::new()
        .route("/queue", get(handler::live_queue))
        .route("/mine/{phone}", get(handler::my_ticket))
        .route("/events", get(handler::events))
        .route("/register", post(handler::register))
        .route("/cancel", post(handler::cancel));

    // 员工路由
    let staff_routes = Router::new()
        .route("/today", get(handler::today))
        .route("/awaiting-payment", get(handler::awaiting_payment))
        .route("/register-staff", post(handler::register_by_staff))
        .route("/call", post(handler::call_next))
        .route("/seat", post(handler::seat))
        .route("/finalize", post(handler::finalize))
        .route_layer(middleware::from_fn(require_staff));

    // 收款：仅管理员
    let admin_routes = Router::new()
        .route("/settle", post(handler::settle))
        .route_layer(middleware::from_fn(require_admin));

    public_routes.merge(staff_routes).merge(admin_routes)
}
