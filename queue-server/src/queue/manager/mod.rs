//! QueueManager - 排队状态机执行器
//!
//! 每个操作都在一个 redb 写事务里完成 "读取当天 → 决策 → 写入"，
//! redb 单写者保证序号分配和叫号选择对同一天线性化。
//!
//! # Operation Flow
//!
//! ```text
//! operation(caller, ...)
//!     ├─ 1. Role guard (Caller)
//!     ├─ 2. Begin write transaction
//!     ├─ 3. Load ticket / today's tickets
//!     ├─ 4. Apply transition (policy::transition)
//!     ├─ 5. Escalation re-check (policy::plan_escalation)
//!     ├─ 6. Commit transaction
//!     ├─ 7. Enqueue notifications (never blocks)
//!     └─ 8. Broadcast QueueEvent(s)
//! ```
//!
//! 通知在提交之后才入队；派发失败不会回滚状态或升级等级。

mod error;
pub use error::*;

use redb::WriteTransaction;
use shared::models::{
    Client, EscalationLevel, LineItem, MyTicketStatus, QueueAction, QueueEvent, RegisterRequest,
    Role, Ticket, TicketState,
};
use shared::util::date_key;
use std::sync::Arc;
use tokio::sync::broadcast;
use validator::Validate;

use super::policy::{self, TicketEvent};
use super::storage::{QueueStorage, StorageError, TICKET_COUNTER};
use crate::auth::Caller;
use crate::catalog::ServiceCatalog;
use crate::notify::{Notification, NotificationKind, NotificationQueue};
use crate::utils::time::Clock;

/// Event broadcast channel capacity
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// 角色检查
pub fn require_role(caller: &Caller, required: Role) -> QueueResult<()> {
    let allowed = match required {
        Role::Client => true,
        Role::Staff => caller.role.is_staff(),
        Role::Admin => caller.role.is_admin(),
    };
    if allowed {
        Ok(())
    } else {
        tracing::warn!(
            caller_id = caller.id,
            role = caller.role.as_str(),
            required = required.as_str(),
            "Role check failed"
        );
        Err(QueueError::Unauthorized { required })
    }
}

/// 提交后才执行的副作用
#[derive(Debug, Default)]
struct Effects {
    notifications: Vec<Notification>,
    events: Vec<QueueEvent>,
}

impl Effects {
    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    fn event(&mut self, action: QueueAction, ticket: &Ticket, now: i64) {
        self.events.push(QueueEvent {
            action,
            date: date_key(ticket.business_date()),
            ticket_id: Some(ticket.id),
            daily_sequence: Some(ticket.daily_sequence),
            state: Some(ticket.state),
            timestamp: now,
        });
    }
}

/// 推进排队号状态，非法迁移返回 `InvalidTransition`
fn advance(ticket: &mut Ticket, event: TicketEvent) -> QueueResult<()> {
    match policy::transition(ticket.state, event) {
        Some(next) => {
            ticket.state = next;
            Ok(())
        }
        None => Err(QueueError::InvalidTransition {
            ticket_id: ticket.id,
            from: ticket.state,
            action: event.as_str(),
        }),
    }
}

/// 排队管理器
pub struct QueueManager {
    storage: QueueStorage,
    clock: Arc<dyn Clock>,
    catalog: Arc<dyn ServiceCatalog>,
    notifications: NotificationQueue,
    event_tx: broadcast::Sender<QueueEvent>,
    escalation_threshold_ms: i64,
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("storage", &"<QueueStorage>")
            .field("clock", &self.clock)
            .field("event_tx", &"<broadcast::Sender>")
            .field("escalation_threshold_ms", &self.escalation_threshold_ms)
            .finish()
    }
}

impl QueueManager {
    pub fn new(
        storage: QueueStorage,
        clock: Arc<dyn Clock>,
        catalog: Arc<dyn ServiceCatalog>,
        notifications: NotificationQueue,
        escalation_threshold_minutes: i64,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            storage,
            clock,
            catalog,
            notifications,
            event_tx,
            escalation_threshold_ms: escalation_threshold_minutes * 60_000,
        }
    }

    /// Subscribe to queue events
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.event_tx.subscribe()
    }

    /// Sender shared with the settlement engine
    pub fn event_sender(&self) -> broadcast::Sender<QueueEvent> {
        self.event_tx.clone()
    }

    pub fn storage(&self) -> &QueueStorage {
        &self.storage
    }

    fn today_key(&self) -> String {
        date_key(self.clock.today())
    }

    fn dispatch(&self, effects: Effects) {
        for notification in effects.notifications {
            self.notifications.enqueue(notification);
        }
        for event in effects.events {
            // 没有订阅者时 send 返回错误，忽略
            let _ = self.event_tx.send(event);
        }
    }

    fn load_txn(&self, txn: &WriteTransaction, ticket_id: u64) -> QueueResult<Ticket> {
        self.storage
            .get_ticket_txn(txn, ticket_id)?
            .ok_or(QueueError::NotFound(ticket_id))
    }

    // ========== Escalation ==========

    /// 对当天队列做一次升级检查 (事务内)
    fn escalate_txn(
        &self,
        txn: &WriteTransaction,
        date: &str,
        now: i64,
        effects: &mut Effects,
    ) -> QueueResult<usize> {
        let day = self.storage.list_day_txn(txn, date)?;
        let plan = policy::plan_escalation(&day, now, self.escalation_threshold_ms);

        for (ticket_id, level) in &plan {
            let Some(mut ticket) = day.iter().find(|t| t.id == *ticket_id).cloned() else {
                continue;
            };
            ticket.escalation_level = *level;
            self.storage.update_ticket(txn, &ticket)?;

            let kind = match level {
                EscalationLevel::NextInLine => NotificationKind::NextInLine,
                EscalationLevel::Approaching => NotificationKind::Approaching,
                EscalationLevel::None => continue,
            };
            tracing::info!(
                ticket_id = ticket.id,
                daily_sequence = ticket.daily_sequence,
                level = ?level,
                "Ticket escalated"
            );
            effects.notify(Notification::new(
                kind,
                ticket.client_phone.as_str(),
                ticket.daily_sequence,
            ));
            effects.event(QueueAction::Escalated, &ticket, now);
        }

        Ok(plan.len())
    }

    /// 周期性升级检查 (由调度器调用)
    ///
    /// 返回本次升级的排队号数量
    pub fn run_escalation(&self) -> QueueResult<usize> {
        let now = self.clock.now_millis();
        let date = self.today_key();
        let mut effects = Effects::default();

        let txn = self.storage.begin_write()?;
        let escalated = self.escalate_txn(&txn, &date, now, &mut effects)?;
        if escalated == 0 {
            txn.abort().map_err(StorageError::from)?;
            return Ok(0);
        }
        txn.commit().map_err(StorageError::from)?;

        self.dispatch(effects);
        Ok(escalated)
    }

    // ========== Registration ==========

    /// 客户自助取号 (同一手机号当天只能有一个未关闭的排队号)
    pub fn register_client(&self, request: RegisterRequest) -> QueueResult<Ticket> {
        self.register(request, true)
    }

    /// 员工代客取号 (不做重复检查)
    pub fn register_by_staff(
        &self,
        caller: &Caller,
        request: RegisterRequest,
    ) -> QueueResult<Ticket> {
        require_role(caller, Role::Staff)?;
        self.register(request, false)
    }

    fn register(&self, request: RegisterRequest, guard_duplicate: bool) -> QueueResult<Ticket> {
        request.validate()?;
        let name = request.name.trim().to_string();
        let phone = request.phone.trim().to_string();

        let now = self.clock.now_millis();
        let date = self.today_key();
        let mut effects = Effects::default();

        let txn = self.storage.begin_write()?;

        if guard_duplicate {
            let day = self.storage.list_day_txn(&txn, &date)?;
            if let Some(existing) = policy::active_for_client(&day, &phone) {
                return Err(QueueError::AlreadyQueued {
                    ticket_id: existing.id,
                    daily_sequence: existing.daily_sequence,
                });
            }
        }

        // 客户名以最近一次登记为准
        let client = match self.storage.get_client_txn(&txn, &phone)? {
            Some(mut client) => {
                client.name = name.clone();
                client.updated_at = now;
                client
            }
            None => Client {
                phone: phone.clone(),
                name: name.clone(),
                created_at: now,
                updated_at: now,
            },
        };
        self.storage.put_client(&txn, &client)?;

        let daily_sequence = policy::next_sequence(self.storage.max_sequence_txn(&txn, &date)?);
        let ticket = Ticket {
            id: self.storage.next_id(&txn, TICKET_COUNTER)?,
            daily_sequence,
            state: TicketState::Queued,
            client_phone: phone,
            client_name: name,
            requested_staff_id: request.requested_staff_id,
            assigned_staff_id: None,
            assigned_staff_name: None,
            created_at: now,
            service_started_at: None,
            escalation_level: EscalationLevel::None,
            line_items: Vec::new(),
            total: None,
            cancelled_at: None,
            closed_at: None,
        };
        self.storage.insert_ticket(&txn, &ticket)?;
        effects.event(QueueAction::Registered, &ticket, now);

        self.escalate_txn(&txn, &date, now, &mut effects)?;
        let ticket = self.load_txn(&txn, ticket.id)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            ticket_id = ticket.id,
            daily_sequence = ticket.daily_sequence,
            by_staff = !guard_duplicate,
            "Ticket registered"
        );
        self.dispatch(effects);
        Ok(ticket)
    }

    // ========== Staff actions ==========

    /// 叫号：总是选当天序号最小的 `Queued` 排队号
    pub fn call_next(&self, caller: &Caller) -> QueueResult<Ticket> {
        require_role(caller, Role::Staff)?;

        let now = self.clock.now_millis();
        let date = self.today_key();
        let mut effects = Effects::default();

        let txn = self.storage.begin_write()?;
        let day = self.storage.list_day_txn(&txn, &date)?;
        let mut ticket = policy::select_next(&day)
            .cloned()
            .ok_or(QueueError::EmptyQueue)?;

        advance(&mut ticket, TicketEvent::Call)?;
        ticket.assigned_staff_id = Some(caller.id);
        ticket.assigned_staff_name = Some(caller.name.clone());
        self.storage.update_ticket(&txn, &ticket)?;

        effects.notify(
            Notification::new(
                NotificationKind::TurnCalled,
                ticket.client_phone.as_str(),
                ticket.daily_sequence,
            )
            .with_extra(caller.name.as_str()),
        );
        effects.event(QueueAction::Called, &ticket, now);

        self.escalate_txn(&txn, &date, now, &mut effects)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            ticket_id = ticket.id,
            daily_sequence = ticket.daily_sequence,
            staff_id = caller.id,
            "Ticket called"
        );
        self.dispatch(effects);
        Ok(ticket)
    }

    /// 入座：记录服务开始时间
    pub fn seat(&self, caller: &Caller, ticket_id: u64) -> QueueResult<Ticket> {
        require_role(caller, Role::Staff)?;

        let now = self.clock.now_millis();
        let date = self.today_key();
        let mut effects = Effects::default();

        let txn = self.storage.begin_write()?;
        let mut ticket = self.load_txn(&txn, ticket_id)?;
        advance(&mut ticket, TicketEvent::Seat)?;
        ticket.service_started_at = Some(now);
        self.storage.update_ticket(&txn, &ticket)?;
        effects.event(QueueAction::Seated, &ticket, now);

        self.escalate_txn(&txn, &date, now, &mut effects)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(ticket_id, staff_id = caller.id, "Client seated");
        self.dispatch(effects);
        Ok(ticket)
    }

    /// 完成服务：写入明细与合计，进入待付款
    ///
    /// 未知或停用的服务 id 被忽略
    pub fn finalize(
        &self,
        caller: &Caller,
        ticket_id: u64,
        service_ids: &[u64],
    ) -> QueueResult<Ticket> {
        require_role(caller, Role::Staff)?;

        let services = self.catalog.resolve_active_services(service_ids)?;
        let line_items: Vec<LineItem> = services
            .into_iter()
            .map(|s| LineItem {
                service_id: s.id,
                service_name: s.name,
                charged_price: s.price,
            })
            .collect();

        let now = self.clock.now_millis();
        let date = self.today_key();
        let mut effects = Effects::default();

        let txn = self.storage.begin_write()?;
        let mut ticket = self.load_txn(&txn, ticket_id)?;
        advance(&mut ticket, TicketEvent::Finalize)?;
        ticket.total = Some(policy::total_of(&line_items));
        ticket.line_items = line_items;
        self.storage.update_ticket(&txn, &ticket)?;
        effects.event(QueueAction::Finalized, &ticket, now);

        self.escalate_txn(&txn, &date, now, &mut effects)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            ticket_id,
            staff_id = caller.id,
            items = ticket.line_items.len(),
            total = ?ticket.total,
            "Ticket finalized"
        );
        self.dispatch(effects);
        Ok(ticket)
    }

    /// 收款 (仅管理员)
    pub fn settle(&self, caller: &Caller, ticket_id: u64) -> QueueResult<Ticket> {
        require_role(caller, Role::Admin)?;

        let now = self.clock.now_millis();
        let mut effects = Effects::default();

        let txn = self.storage.begin_write()?;
        let mut ticket = self.load_txn(&txn, ticket_id)?;
        advance(&mut ticket, TicketEvent::Settle)?;
        ticket.closed_at = Some(now);
        self.storage.update_ticket(&txn, &ticket)?;
        effects.event(QueueAction::Settled, &ticket, now);
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(ticket_id, staff_id = caller.id, "Ticket settled");
        self.dispatch(effects);
        Ok(ticket)
    }

    /// 客户按手机号取消当天的排队号
    pub fn cancel_by_phone(&self, phone: &str) -> QueueResult<Ticket> {
        let phone = phone.trim();
        let now = self.clock.now_millis();
        let date = self.today_key();
        let mut effects = Effects::default();

        let txn = self.storage.begin_write()?;
        if self.storage.get_client_txn(&txn, phone)?.is_none() {
            return Err(QueueError::ClientNotFound(phone.to_string()));
        }
        let day = self.storage.list_day_txn(&txn, &date)?;
        let mut ticket = policy::active_for_client(&day, phone)
            .cloned()
            .ok_or_else(|| QueueError::NoActiveTicket(phone.to_string()))?;

        advance(&mut ticket, TicketEvent::Cancel)?;
        ticket.cancelled_at = Some(now);
        ticket.closed_at = Some(now);
        self.storage.update_ticket(&txn, &ticket)?;
        effects.event(QueueAction::Cancelled, &ticket, now);

        self.escalate_txn(&txn, &date, now, &mut effects)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(
            ticket_id = ticket.id,
            daily_sequence = ticket.daily_sequence,
            "Ticket cancelled by client"
        );
        self.dispatch(effects);
        Ok(ticket)
    }

    // ========== Read models ==========

    pub fn get_ticket(&self, ticket_id: u64) -> QueueResult<Ticket> {
        self.storage
            .get_ticket(ticket_id)?
            .ok_or(QueueError::NotFound(ticket_id))
    }

    /// 当天全部排队号，最新在前
    pub fn today_tickets(&self) -> QueueResult<Vec<Ticket>> {
        let mut tickets = self.storage.list_day(&self.today_key())?;
        tickets.reverse();
        Ok(tickets)
    }

    /// 当天未关闭的排队号，序号升序
    pub fn live_queue(&self) -> QueueResult<Vec<Ticket>> {
        let mut tickets = self.storage.list_day(&self.today_key())?;
        tickets.retain(|t| t.state.is_open());
        Ok(tickets)
    }

    /// 当天待付款的排队号，序号升序
    pub fn awaiting_payment(&self) -> QueueResult<Vec<Ticket>> {
        let mut tickets = self.storage.list_day(&self.today_key())?;
        tickets.retain(|t| t.state == TicketState::AwaitingPayment);
        Ok(tickets)
    }

    /// 客户查看自己的排队号
    pub fn my_ticket(&self, phone: &str) -> QueueResult<MyTicketStatus> {
        let phone = phone.trim();
        if self.storage.get_client(phone)?.is_none() {
            return Err(QueueError::ClientNotFound(phone.to_string()));
        }

        let day = self.storage.list_day(&self.today_key())?;
        let ticket = policy::active_for_client(&day, phone)
            .ok_or_else(|| QueueError::NoActiveTicket(phone.to_string()))?;

        Ok(MyTicketStatus {
            ticket_id: ticket.id,
            daily_sequence: ticket.daily_sequence,
            state: ticket.state,
            people_ahead: policy::position_in_line(&day, ticket.daily_sequence),
            assigned_staff_name: ticket.assigned_staff_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests;
