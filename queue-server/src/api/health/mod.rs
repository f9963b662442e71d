//! 健康检查路由
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /api/health | GET | 存活检查 | 无 |
//! | /api/health/detailed | GET | 含存储检查与运行时长 | 无 |
//!
//! ```json
//! { "status": "ok", "version": "0.1.0", "business_date": "2026-02-20" }
//! ```

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::time::{Instant, SystemTime};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/health/detailed", get(detailed_health))
}

#[derive(Serialize)]
pub struct HealthResponse {
    /// ok | degraded
    status: &'static str,
    version: &'static str,
    /// 当前业务日期 (UTC)
    business_date: String,
}

#[derive(Serialize)]
pub struct DetailedHealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    storage: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    /// 当前等待人数
    #[serde(skip_serializing_if = "Option::is_none")]
    queue_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

static START_TIME: std::sync::OnceLock<SystemTime> = std::sync::OnceLock::new();

fn get_uptime_seconds() -> u64 {
    let start = START_TIME.get_or_init(SystemTime::now);
    SystemTime::now()
        .duration_since(*start)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    // 首次请求时记录启动时间
    let _ = get_uptime_seconds();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        business_date: state.settlement.today().to_string(),
    })
}

pub async fn detailed_health(State(state): State<ServerState>) -> Json<DetailedHealthResponse> {
    let started = Instant::now();
    let storage = match state.queue.live_queue() {
        Ok(queue) => CheckResult {
            status: "ok",
            latency_ms: Some(started.elapsed().as_millis() as u64),
            queue_length: Some(queue.len()),
            message: None,
        },
        Err(e) => CheckResult {
            status: "error",
            latency_ms: None,
            queue_length: None,
            message: Some(format!("Storage error: {}", e)),
        },
    };

    Json(DetailedHealthResponse {
        status: if storage.status == "ok" { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: get_uptime_seconds(),
        checks: HealthChecks { storage },
    })
}
