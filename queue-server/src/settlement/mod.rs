//! 日结 (Daily Settlement)
//!
//! 把一个 UTC 日历日内已完成服务的排队号汇总成一条不可变的日结记录。
//! 日结与 "待付款 → 已关闭" 的批量迁移在同一个写事务里提交，
//! 任何一步失败都不会留下部分状态。

use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::models::{
    DailyClosing, DaySummary, QueueAction, QueueEvent, Role, StaffPerformance, Ticket, TicketState,
};
use shared::util::date_key;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::auth::Caller;
use crate::queue::manager::{QueueError, QueueResult, require_role};
use crate::queue::policy::{self, TicketEvent};
use crate::queue::storage::{QueueStorage, StorageError};
use crate::utils::time::Clock;

/// 默认历史条数
pub const DEFAULT_HISTORY_LIMIT: usize = 30;

/// 计入营业额的排队号：待付款或已关闭
///
/// 客户取消且未结算金额的排队号不计入；已出账的 (`total` 有值) 始终计入
fn is_billable(ticket: &Ticket) -> bool {
    matches!(
        ticket.state,
        TicketState::AwaitingPayment | TicketState::Closed
    ) && !(ticket.is_cancelled() && ticket.total.is_none())
}

fn sum_totals<'a>(tickets: impl Iterator<Item = &'a Ticket>) -> (Decimal, u32) {
    tickets.fold((Decimal::ZERO, 0), |(total, count), t| {
        (total + t.total.unwrap_or(Decimal::ZERO), count + 1)
    })
}

/// 按员工汇总，金额高的在前
///
/// 未分配员工的排队号只计入总额，不出现在明细里
fn by_staff(tickets: &[&Ticket]) -> Vec<StaffPerformance> {
    let mut groups: HashMap<u64, StaffPerformance> = HashMap::new();
    for ticket in tickets {
        let Some(staff_id) = ticket.assigned_staff_id else {
            continue;
        };
        let entry = groups
            .entry(staff_id)
            .or_insert_with(|| StaffPerformance {
                staff_id,
                staff_name: ticket.assigned_staff_name.clone().unwrap_or_default(),
                total: Decimal::ZERO,
                tickets: 0,
            });
        entry.total += ticket.total.unwrap_or(Decimal::ZERO);
        entry.tickets += 1;
    }

    let mut rows: Vec<StaffPerformance> = groups.into_values().collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total).then(a.staff_id.cmp(&b.staff_id)));
    rows
}

/// 日结引擎
pub struct SettlementEngine {
    storage: QueueStorage,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<QueueEvent>,
}

impl std::fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl SettlementEngine {
    pub fn new(
        storage: QueueStorage,
        clock: Arc<dyn Clock>,
        events: broadcast::Sender<QueueEvent>,
    ) -> Self {
        Self {
            storage,
            clock,
            events,
        }
    }

    /// 当前业务日期
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// 日结 (仅管理员)
    ///
    /// 同一天只能日结一次，第二次返回 `AlreadyClosed` 且不改动已有记录。
    pub fn close_day(&self, caller: &Caller, date: NaiveDate) -> QueueResult<DailyClosing> {
        require_role(caller, Role::Admin)?;

        let key = date_key(date);
        let now = self.clock.now_millis();

        let txn = self.storage.begin_write()?;
        if self.storage.get_closing_txn(&txn, &key)?.is_some() {
            return Err(QueueError::AlreadyClosed(key));
        }

        let day = self.storage.list_day_txn(&txn, &key)?;
        let (total_collected, ticket_count) = sum_totals(day.iter().filter(|t| is_billable(t)));

        let closing = DailyClosing {
            date: key.clone(),
            closed_at: now,
            total_collected,
            ticket_count,
            closed_by_id: caller.id,
            closed_by_name: caller.name.clone(),
        };
        self.storage.insert_closing(&txn, &closing)?;

        let mut settled = 0usize;
        for mut ticket in day
            .into_iter()
            .filter(|t| t.state == TicketState::AwaitingPayment)
        {
            if let Some(next) = policy::transition(ticket.state, TicketEvent::Settle) {
                ticket.state = next;
                ticket.closed_at = Some(now);
                self.storage.update_ticket(&txn, &ticket)?;
                settled += 1;
            }
        }

        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            date = %key,
            total = %closing.total_collected,
            tickets = closing.ticket_count,
            settled,
            closed_by = caller.id,
            "Day closed"
        );

        let _ = self.events.send(QueueEvent {
            action: QueueAction::DayClosed,
            date: key,
            ticket_id: None,
            daily_sequence: None,
            state: None,
            timestamp: now,
        });

        Ok(closing)
    }

    /// 当天运行中的营业汇总 (员工可见)
    pub fn day_summary(&self, caller: &Caller, date: NaiveDate) -> QueueResult<DaySummary> {
        require_role(caller, Role::Staff)?;

        let key = date_key(date);
        let day = self.storage.list_day(&key)?;
        let billable: Vec<&Ticket> = day.iter().filter(|t| is_billable(t)).collect();
        let (total_collected, ticket_count) = sum_totals(billable.iter().copied());

        let average_ticket = if ticket_count == 0 {
            Decimal::ZERO
        } else {
            (total_collected / Decimal::from(ticket_count)).round_dp(2)
        };

        Ok(DaySummary {
            total_collected,
            ticket_count,
            average_ticket,
            by_staff: by_staff(&billable),
            closing: self.storage.get_closing(&key)?,
            date: key,
        })
    }

    /// 最近的日结记录，日期新的在前 (仅管理员)
    pub fn history(&self, caller: &Caller, limit: usize) -> QueueResult<Vec<DailyClosing>> {
        require_role(caller, Role::Admin)?;
        Ok(self.storage.list_closings(limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::ManualClock;
    use shared::models::{EscalationLevel, LineItem};

    // 2026-02-20T12:00:00Z
    const NOON: i64 = 1_771_588_800_000;

    fn ticket(id: u64, seq: u32, state: TicketState, total: Option<i64>, staff: u64) -> Ticket {
        Ticket {
            id,
            daily_sequence: seq,
            state,
            client_phone: format!("55{id}"),
            client_name: format!("Client {id}"),
            requested_staff_id: None,
            assigned_staff_id: Some(staff),
            assigned_staff_name: Some(format!("Staff {staff}")),
            created_at: NOON,
            service_started_at: Some(NOON),
            escalation_level: EscalationLevel::NextInLine,
            line_items: total
                .map(|t| {
                    vec![LineItem {
                        service_id: 1,
                        service_name: "Haircut".into(),
                        charged_price: Decimal::from(t),
                    }]
                })
                .unwrap_or_default(),
            total: total.map(Decimal::from),
            cancelled_at: None,
            closed_at: None,
        }
    }

    fn engine_with(tickets: Vec<Ticket>) -> (SettlementEngine, QueueStorage) {
        let storage = QueueStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        for t in &tickets {
            storage.insert_ticket(&txn, t).unwrap();
        }
        txn.commit().unwrap();

        let (tx, _) = broadcast::channel(16);
        let engine = SettlementEngine::new(
            storage.clone(),
            Arc::new(ManualClock::new(NOON + 8 * 3_600_000)),
            tx,
        );
        (engine, storage)
    }

    fn feb20() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 20).unwrap()
    }

    fn admin() -> Caller {
        Caller::admin(1, "Admin")
    }

    #[test]
    fn test_close_day_sums_and_settles() {
        let mut cancelled = ticket(4, 4, TicketState::Closed, None, 10);
        cancelled.cancelled_at = Some(NOON);
        let (engine, storage) = engine_with(vec![
            ticket(1, 1, TicketState::AwaitingPayment, Some(15000), 10),
            ticket(2, 2, TicketState::Closed, Some(8000), 11),
            ticket(3, 3, TicketState::InChair, None, 10),
            cancelled,
            ticket(5, 5, TicketState::AwaitingPayment, None, 11),
        ]);

        let closing = engine.close_day(&admin(), feb20()).unwrap();
        assert_eq!(closing.date, "2026-02-20");
        assert_eq!(closing.total_collected, Decimal::from(23000));
        assert_eq!(closing.ticket_count, 3);
        assert_eq!(closing.closed_by_id, 1);
        assert_eq!(closing.closed_by_name, "Admin");

        let day = storage.list_day("2026-02-20").unwrap();
        assert_eq!(day[0].state, TicketState::Closed);
        assert!(day[0].closed_at.is_some());
        assert_eq!(day[2].state, TicketState::InChair);
        assert_eq!(day[4].state, TicketState::Closed);
    }

    #[test]
    fn test_second_close_rejected_and_first_kept() {
        let (engine, storage) =
            engine_with(vec![ticket(1, 1, TicketState::AwaitingPayment, Some(100), 10)]);
        let first = engine.close_day(&admin(), feb20()).unwrap();

        let err = engine
            .close_day(&Caller::admin(2, "Other"), feb20())
            .unwrap_err();
        assert!(matches!(err, QueueError::AlreadyClosed(ref d) if d == "2026-02-20"));
        assert_eq!(storage.get_closing("2026-02-20").unwrap(), Some(first));
    }

    #[test]
    fn test_close_requires_admin() {
        let (engine, storage) = engine_with(vec![]);
        assert!(matches!(
            engine.close_day(&Caller::staff(10, "Luis"), feb20()),
            Err(QueueError::Unauthorized {
                required: Role::Admin
            })
        ));
        assert!(storage.get_closing("2026-02-20").unwrap().is_none());
    }

    #[test]
    fn test_close_empty_day() {
        let (engine, _) = engine_with(vec![]);
        let closing = engine.close_day(&admin(), feb20()).unwrap();
        assert_eq!(closing.total_collected, Decimal::ZERO);
        assert_eq!(closing.ticket_count, 0);
    }

    #[test]
    fn test_day_summary_by_staff() {
        let (engine, _) = engine_with(vec![
            ticket(1, 1, TicketState::AwaitingPayment, Some(15000), 10),
            ticket(2, 2, TicketState::Closed, Some(8000), 11),
            ticket(3, 3, TicketState::Closed, Some(12000), 11),
            ticket(4, 4, TicketState::Queued, None, 10),
        ]);

        let summary = engine
            .day_summary(&Caller::staff(10, "Luis"), feb20())
            .unwrap();
        assert_eq!(summary.total_collected, Decimal::from(35000));
        assert_eq!(summary.ticket_count, 3);
        assert_eq!(summary.average_ticket, Decimal::new(1166667, 2));
        assert!(summary.closing.is_none());

        let staff: Vec<(u64, Decimal, u32)> = summary
            .by_staff
            .iter()
            .map(|s| (s.staff_id, s.total, s.tickets))
            .collect();
        assert_eq!(
            staff,
            vec![
                (11, Decimal::from(20000), 2),
                (10, Decimal::from(15000), 1),
            ]
        );

        engine.close_day(&admin(), feb20()).unwrap();
        let summary = engine.day_summary(&admin(), feb20()).unwrap();
        assert!(summary.closing.is_some());
    }

    #[test]
    fn test_unassigned_ticket_left_out_of_breakdown() {
        let mut walk_in = ticket(2, 2, TicketState::Closed, Some(5000), 0);
        walk_in.assigned_staff_id = None;
        walk_in.assigned_staff_name = None;
        let (engine, _) = engine_with(vec![
            ticket(1, 1, TicketState::Closed, Some(15000), 10),
            walk_in,
        ]);

        let summary = engine.day_summary(&admin(), feb20()).unwrap();
        assert_eq!(summary.total_collected, Decimal::from(20000));
        assert_eq!(summary.ticket_count, 2);
        assert_eq!(summary.by_staff.len(), 1);
        assert_eq!(summary.by_staff[0].staff_id, 10);
    }

    #[test]
    fn test_cancelled_after_billing_still_counted() {
        let mut billed = ticket(1, 1, TicketState::Closed, Some(15000), 10);
        billed.cancelled_at = Some(NOON);
        let (engine, _) = engine_with(vec![billed]);

        let closing = engine.close_day(&admin(), feb20()).unwrap();
        assert_eq!(closing.total_collected, Decimal::from(15000));
        assert_eq!(closing.ticket_count, 1);
    }

    #[test]
    fn test_empty_day_average_is_zero() {
        let (engine, _) = engine_with(vec![]);
        let summary = engine.day_summary(&admin(), feb20()).unwrap();
        assert_eq!(summary.average_ticket, Decimal::ZERO);
        assert!(summary.by_staff.is_empty());
        assert!(engine.day_summary(&Caller::anonymous(), feb20()).is_err());
    }

    #[test]
    fn test_history_newest_first() {
        let (engine, _) = engine_with(vec![]);
        for day in 17..=20 {
            engine
                .close_day(&admin(), NaiveDate::from_ymd_opt(2026, 2, day).unwrap())
                .unwrap();
        }
        let dates: Vec<String> = engine
            .history(&admin(), 3)
            .unwrap()
            .into_iter()
            .map(|c| c.date)
            .collect();
        assert_eq!(dates, vec!["2026-02-20", "2026-02-19", "2026-02-18"]);
        assert!(engine.history(&Caller::staff(10, "Luis"), 3).is_err());
    }
}
