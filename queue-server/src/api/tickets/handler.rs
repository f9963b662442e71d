//! Ticket API Handlers

use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use shared::models::{
    CancelRequest, FinalizeRequest, MyTicketStatus, RegisterRequest, Ticket, TicketIdRequest,
};
use tokio::sync::broadcast::error::RecvError;

use crate::auth::Caller;
use crate::core::ServerState;
use crate::utils::{ApiResponse, AppResult, ok};

type TicketResponse = AppResult<Json<ApiResponse<Ticket>>>;
type TicketListResponse = AppResult<Json<ApiResponse<Vec<Ticket>>>>;

/// GET /api/tickets/queue - 当前排队 (按排队号升序)
pub async fn live_queue(State(state): State<ServerState>) -> TicketListResponse {
    Ok(ok(state.queue.live_queue()?))
}

/// GET /api/tickets/today - 今日所有排队号 (新的在前)
pub async fn today(State(state): State<ServerState>) -> TicketListResponse {
    Ok(ok(state.queue.today_tickets()?))
}

/// GET /api/tickets/awaiting-payment
pub async fn awaiting_payment(State(state): State<ServerState>) -> TicketListResponse {
    Ok(ok(state.queue.awaiting_payment()?))
}

/// GET /api/tickets/mine/{phone} - 客户查询自己的排队状态
pub async fn my_ticket(
    State(state): State<ServerState>,
    Path(phone): Path<String>,
) -> AppResult<Json<ApiResponse<MyTicketStatus>>> {
    Ok(ok(state.queue.my_ticket(&phone)?))
}

/// POST /api/tickets/register - 客户自助取号
pub async fn register(
    State(state): State<ServerState>,
    Json(req): Json<RegisterRequest>,
) -> TicketResponse {
    Ok(ok(state.queue.register_client(req)?))
}

/// POST /api/tickets/register-staff - 员工代客取号 (不检查重复)
pub async fn register_by_staff(
    State(state): State<ServerState>,
    caller: Caller,
    Json(req): Json<RegisterRequest>,
) -> TicketResponse {
    Ok(ok(state.queue.register_by_staff(&caller, req)?))
}

/// POST /api/tickets/cancel - 客户按手机号取消
pub async fn cancel(
    State(state): State<ServerState>,
    Json(req): Json<CancelRequest>,
) -> TicketResponse {
    Ok(ok(state.queue.cancel_by_phone(&req.phone)?))
}

/// POST /api/tickets/call - 叫下一位
pub async fn call_next(State(state): State<ServerState>, caller: Caller) -> TicketResponse {
    Ok(ok(state.queue.call_next(&caller)?))
}

/// POST /api/tickets/seat
pub async fn seat(
    State(state): State<ServerState>,
    caller: Caller,
    Json(req): Json<TicketIdRequest>,
) -> TicketResponse {
    Ok(ok(state.queue.seat(&caller, req.ticket_id)?))
}

/// POST /api/tickets/finalize - 记录服务项目并进入待收款
pub async fn finalize(
    State(state): State<ServerState>,
    caller: Caller,
    Json(req): Json<FinalizeRequest>,
) -> TicketResponse {
    Ok(ok(state
        .queue
        .finalize(&caller, req.ticket_id, &req.service_ids)?))
}

/// POST /api/tickets/settle - 收款
pub async fn settle(
    State(state): State<ServerState>,
    caller: Caller,
    Json(req): Json<TicketIdRequest>,
) -> TicketResponse {
    Ok(ok(state.queue.settle(&caller, req.ticket_id)?))
}

/// GET /api/tickets/events - 排队变化的 SSE 推送
///
/// 订阅者落后太多时跳过丢失的事件，客户端应重新拉取 `/queue`。
pub async fn events(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.queue.subscribe();

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => match Event::default().event("queue").json_data(&event) {
                    Ok(sse) => return Some((Ok(sse), rx)),
                    Err(e) => tracing::warn!(error = %e, "Failed to encode queue event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "SSE subscriber lagged");
                    return Some((Ok(Event::default().event("resync").data(skipped.to_string())), rx));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
