//! Daily Closing API Handlers

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use shared::models::{CloseDayRequest, DailyClosing, DaySummary};

use crate::auth::Caller;
use crate::core::ServerState;
use crate::settlement::DEFAULT_HISTORY_LIMIT;
use crate::utils::time::parse_date;
use crate::utils::{ApiResponse, AppResult, ok};

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// YYYY-MM-DD，默认今天
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

/// GET /api/closings/summary - 营业汇总
pub async fn summary(
    State(state): State<ServerState>,
    caller: Caller,
    Query(query): Query<SummaryQuery>,
) -> AppResult<Json<ApiResponse<DaySummary>>> {
    let date = match query.date {
        Some(d) => parse_date(&d)?,
        None => state.settlement.today(),
    };
    Ok(ok(state.settlement.day_summary(&caller, date)?))
}

/// POST /api/closings/close - 日结
///
/// 请求体可省略
pub async fn close(
    State(state): State<ServerState>,
    caller: Caller,
    payload: Option<Json<CloseDayRequest>>,
) -> AppResult<Json<ApiResponse<DailyClosing>>> {
    let req = payload.map(|Json(req)| req).unwrap_or_default();
    let date = match req.date {
        Some(d) => parse_date(&d)?,
        None => state.settlement.today(),
    };
    Ok(ok(state.settlement.close_day(&caller, date)?))
}

/// GET /api/closings/history - 日结历史 (新的在前)
pub async fn history(
    State(state): State<ServerState>,
    caller: Caller,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<ApiResponse<Vec<DailyClosing>>>> {
    Ok(ok(state.settlement.history(&caller, query.limit)?))
}
