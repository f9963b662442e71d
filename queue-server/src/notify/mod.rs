//! 通知分发
//!
//! 队列策略决定"何时"通知，本模块负责"怎样"送达：
//! - [`Notification`] - 通知意图 (类型 + 手机号 + 排队号)
//! - [`NotificationQueue`] - 事务提交后非阻塞入队
//! - [`NotificationWorker`] - 后台消费并调用 [`Notifier`]
//! - [`LogNotifier`] / [`WebhookNotifier`] - 发送实现
//!
//! 发送失败只记录日志，不会回滚队列状态。

mod notifier;
mod worker;

pub use notifier::{LogNotifier, Notifier, NotifyError, WebhookNotifier};
pub use worker::NotificationWorker;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// 员工已叫号
    TurnCalled,
    /// 排在第一位 (消息模板保留，当前没有规则触发)
    FirstInLine,
    /// 下一个就是你
    NextInLine,
    /// 快轮到你了
    Approaching,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TurnCalled => "turn_called",
            Self::FirstInLine => "first_in_line",
            Self::NextInLine => "next_in_line",
            Self::Approaching => "approaching",
        }
    }
}

/// 通知意图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub phone: String,
    pub daily_sequence: u32,
    /// TurnCalled: 叫号员工名
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

impl Notification {
    pub fn new(kind: NotificationKind, phone: impl Into<String>, daily_sequence: u32) -> Self {
        Self {
            kind,
            phone: phone.into(),
            daily_sequence,
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    /// 渲染发给客户的消息文本
    pub fn render(&self) -> String {
        let n = self.daily_sequence;
        match self.kind {
            NotificationKind::TurnCalled => match &self.extra {
                Some(staff) => format!("It's your turn! Ticket #{n}, {staff} is ready for you."),
                None => format!("It's your turn! Ticket #{n}, please come to the chair."),
            },
            NotificationKind::FirstInLine => {
                format!("You are first in line with ticket #{n}. Please stay close.")
            }
            NotificationKind::NextInLine => {
                format!("You're next! Ticket #{n} will be called shortly.")
            }
            NotificationKind::Approaching => {
                format!("Your turn is approaching. Ticket #{n}, please start heading over.")
            }
        }
    }
}

/// 通知队列发送端
///
/// 永不阻塞：通道已满或已关闭时丢弃并记录日志。
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<Notification>,
}

impl NotificationQueue {
    /// 创建有界通道
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn enqueue(&self, notification: Notification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(n)) => {
                tracing::warn!(
                    kind = n.kind.as_str(),
                    daily_sequence = n.daily_sequence,
                    "Notification queue full, dropping notification"
                );
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                tracing::error!(
                    kind = n.kind.as_str(),
                    daily_sequence = n.daily_sequence,
                    "Notification worker stopped, dropping notification"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_turn_called_with_staff() {
        let n = Notification::new(NotificationKind::TurnCalled, "555", 4).with_extra("Luis");
        assert_eq!(n.render(), "It's your turn! Ticket #4, Luis is ready for you.");
    }

    #[test]
    fn test_enqueue_never_blocks_when_full() {
        let (queue, mut rx) = NotificationQueue::channel(1);
        queue.enqueue(Notification::new(NotificationKind::NextInLine, "1", 1));
        queue.enqueue(Notification::new(NotificationKind::NextInLine, "2", 2));

        assert_eq!(rx.try_recv().unwrap().daily_sequence, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_enqueue_after_worker_gone() {
        let (queue, rx) = NotificationQueue::channel(4);
        drop(rx);
        queue.enqueue(Notification::new(NotificationKind::Approaching, "1", 1));
    }
}
