//! 排队策略 (纯函数)
//!
//! 状态迁移表、日序号分配、叫号选择、队列位置以及升级通知规则。
//! 这里不访问存储也不发送通知，调用方在同一个写事务里读取当天的
//! 排队号、应用决策、提交后再派发通知。

use rust_decimal::Decimal;
use shared::models::{EscalationLevel, LineItem, Ticket, TicketState};

/// 排队号事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketEvent {
    Call,
    Seat,
    Finalize,
    Settle,
    Cancel,
}

impl TicketEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Seat => "seat",
            Self::Finalize => "finalize",
            Self::Settle => "settle",
            Self::Cancel => "cancel",
        }
    }
}

/// 合法迁移，非法时返回 `None`
pub fn transition(from: TicketState, event: TicketEvent) -> Option<TicketState> {
    use TicketEvent as E;
    use TicketState as S;

    match (from, event) {
        (S::Queued, E::Call) => Some(S::Called),
        (S::Called, E::Seat) => Some(S::InChair),
        (S::InChair, E::Finalize) => Some(S::AwaitingPayment),
        (S::AwaitingPayment, E::Settle) => Some(S::Closed),
        // 客户只能在入座前取消
        (S::Queued | S::Called, E::Cancel) => Some(S::Closed),
        _ => None,
    }
}

/// 下一个日序号 (`max + 1`，空日从 1 开始)
pub fn next_sequence(max_sequence: u32) -> u32 {
    max_sequence + 1
}

/// 叫号：当天序号最小的 `Queued` 排队号
pub fn select_next(day: &[Ticket]) -> Option<&Ticket> {
    day.iter()
        .filter(|t| t.state == TicketState::Queued)
        .min_by_key(|t| t.daily_sequence)
}

/// 序号更小的 `Queued` 排队号数量
pub fn position_in_line(day: &[Ticket], daily_sequence: u32) -> u32 {
    day.iter()
        .filter(|t| t.state == TicketState::Queued && t.daily_sequence < daily_sequence)
        .count() as u32
}

/// 客户当天未关闭的排队号
pub fn active_for_client<'a>(day: &'a [Ticket], phone: &str) -> Option<&'a Ticket> {
    day.iter()
        .find(|t| t.client_phone == phone && t.state.is_open())
}

/// 是否有座位上的服务已超过阈值
fn any_chair_over(day: &[Ticket], now: i64, threshold_ms: i64) -> bool {
    day.iter().any(|t| {
        t.state == TicketState::InChair
            && t
                .service_started_at
                .is_some_and(|started| now - started >= threshold_ms)
    })
}

/// 升级检查
///
/// 取当天 `Queued` 排队号按序号升序的前两个:
/// - 第 1 位低于 `NextInLine` 时升到 `NextInLine`
/// - 第 2 位仍为 `None` 且有任一 `InChair` 服务时长 `>= threshold_ms` 时升到 `Approaching`
///
/// 返回需要更新的 `(ticket_id, 新等级)`；已记录的等级不会再次返回。
pub fn plan_escalation(
    day: &[Ticket],
    now: i64,
    threshold_ms: i64,
) -> Vec<(u64, EscalationLevel)> {
    let mut queued: Vec<&Ticket> = day
        .iter()
        .filter(|t| t.state == TicketState::Queued)
        .collect();
    queued.sort_by_key(|t| t.daily_sequence);

    let mut plan = Vec::new();

    if let Some(first) = queued
        .first()
        .filter(|t| t.escalation_level < EscalationLevel::NextInLine)
    {
        plan.push((first.id, EscalationLevel::NextInLine));
    }

    if let Some(second) = queued
        .get(1)
        .filter(|t| t.escalation_level < EscalationLevel::Approaching)
        .filter(|_| any_chair_over(day, now, threshold_ms))
    {
        plan.push((second.id, EscalationLevel::Approaching));
    }

    plan
}

/// 明细合计
pub fn total_of(items: &[LineItem]) -> Decimal {
    items.iter().map(|item| item.charged_price).sum()
}
