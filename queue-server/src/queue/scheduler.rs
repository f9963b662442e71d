//! 升级检查调度器
//!
//! 第 2 位的 "即将轮到" 规则依赖服务时长，即使队列没有变化也可能满足条件，
//! 所以需要按固定间隔重新检查。

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::manager::QueueManager;

/// 注册为 `TaskKind::Periodic`，在 `start_background_tasks()` 中启动。
pub struct EscalationScheduler {
    manager: Arc<QueueManager>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl EscalationScheduler {
    pub fn new(manager: Arc<QueueManager>, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            manager,
            interval,
            shutdown,
        }
    }

    /// 主循环：等待间隔或 shutdown
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Escalation scheduler started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Escalation scheduler received shutdown signal");
                    break;
                }
            }

            self.tick();
        }

        tracing::info!("Escalation scheduler stopped");
    }

    fn tick(&self) {
        match self.manager.run_escalation() {
            Ok(0) => {}
            Ok(count) => tracing::debug!(count, "Periodic escalation sent notifications"),
            Err(e) => tracing::error!(error = %e, "Periodic escalation check failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogService;
    use crate::notify::NotificationQueue;
    use crate::queue::storage::QueueStorage;
    use crate::utils::time::ManualClock;
    use shared::models::RegisterRequest;

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_stops_on_shutdown() {
        let storage = QueueStorage::open_in_memory().unwrap();
        let (queue, mut rx) = NotificationQueue::channel(8);
        let manager = Arc::new(QueueManager::new(
            storage.clone(),
            Arc::new(ManualClock::new(1_771_578_000_000)),
            Arc::new(CatalogService::new(storage)),
            queue,
            20,
        ));
        manager
            .register_client(RegisterRequest {
                name: "A".into(),
                phone: "111".into(),
                requested_staff_id: None,
            })
            .unwrap();
        assert!(rx.try_recv().is_ok());

        let token = CancellationToken::new();
        let scheduler =
            EscalationScheduler::new(manager.clone(), Duration::from_secs(60), token.clone());
        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_secs(150)).await;
        token.cancel();
        handle.await.unwrap();

        // Nothing new to escalate, nothing re-sent
        assert!(rx.try_recv().is_err());
    }
}
