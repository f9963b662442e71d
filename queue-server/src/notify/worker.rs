//! 通知后台 Worker
//!
//! 从 mpsc 通道消费通知意图并交给 [`Notifier`] 发送。
//! 通道关闭时自动退出。

use std::sync::Arc;
use tokio::sync::mpsc;

use super::{Notification, Notifier};

/// 通知后台 Worker
pub struct NotificationWorker {
    notifier: Arc<dyn Notifier>,
}

impl NotificationWorker {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// 运行 worker（阻塞直到通道关闭）
    pub async fn run(self, mut rx: mpsc::Receiver<Notification>) {
        tracing::info!(notifier = self.notifier.name(), "📨 Notification worker started");

        while let Some(notification) = rx.recv().await {
            if let Err(e) = self.notifier.notify(&notification).await {
                tracing::error!(
                    notifier = self.notifier.name(),
                    kind = notification.kind.as_str(),
                    daily_sequence = notification.daily_sequence,
                    error = %e,
                    "Failed to deliver notification"
                );
            }
        }

        tracing::info!("Notification channel closed, worker stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NotificationKind, NotificationQueue, NotifyError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<Notification>>,
        fail_first: bool,
    }

    #[async_trait]
    impl Notifier for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
            let mut sent = self.sent.lock().unwrap();
            sent.push(notification.clone());
            if self.fail_first && sent.len() == 1 {
                return Err(NotifyError::Rejected(500));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_worker_keeps_going_after_failure() {
        let notifier = Arc::new(Recording {
            fail_first: true,
            ..Default::default()
        });
        let (queue, rx) = NotificationQueue::channel(8);
        queue.enqueue(Notification::new(NotificationKind::NextInLine, "111", 1));
        queue.enqueue(Notification::new(NotificationKind::Approaching, "222", 2));
        drop(queue);

        NotificationWorker::new(notifier.clone()).run(rx).await;

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].kind, NotificationKind::Approaching);
    }
}
