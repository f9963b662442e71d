//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`auth`] - PIN 登录
//! - [`tickets`] - 取号、叫号、服务流程、实时事件
//! - [`closings`] - 营业汇总与日结
//! - [`services`] - 服务目录
//! - [`staff`] - 员工管理与接客状态

pub mod auth;
pub mod closings;
pub mod health;
pub mod services;
pub mod staff;
pub mod tickets;

use axum::{Router, middleware};
use http::{HeaderName, HeaderValue};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::authenticate;
use crate::core::ServerState;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// 所有业务路由 (未绑定状态、无中间件)
pub fn routes() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(tickets::router())
        .merge(closings::router())
        .merge(services::router())
        .merge(staff::router())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// 完整的应用路由：认证、CORS、压缩、请求 ID 和请求追踪
///
/// HTTP 服务和集成测试共用
pub fn build_router(state: ServerState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    routes()
        // 解析可选 Bearer 令牌并注入 CurrentUser，角色检查在各路由组的 route_layer 中
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .with_state(state)
        .layer(cors)
        // SSE 响应默认不压缩
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, XRequestId))
}
