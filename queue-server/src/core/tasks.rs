//! 后台任务管理
//!
//! 排队服务只有两类后台任务：
//!
//! - [`TaskKind::Worker`] - 通知投递 worker (消费有界通知队列)
//! - [`TaskKind::Periodic`] - 升级检查调度器
//!
//! 所有任务共享同一个 [`CancellationToken`]，关闭时统一取消并等待退出。

use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 单个任务退出的最长等待时间
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// 长期运行，消费通道直到取消
    Worker,
    /// 按固定间隔执行
    Periodic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Worker => write!(f, "Worker"),
            TaskKind::Periodic => write!(f, "Periodic"),
        }
    }
}

struct RegisteredTask {
    name: &'static str,
    kind: TaskKind,
    handle: JoinHandle<()>,
}

/// 后台任务管理器
///
/// ```ignore
/// let mut tasks = BackgroundTasks::new();
/// let token = tasks.shutdown_token();
/// tasks.spawn("escalation_scheduler", TaskKind::Periodic, async move {
///     EscalationScheduler::new(queue, interval, token).run().await;
/// });
/// tasks.shutdown().await;
/// ```
pub struct BackgroundTasks {
    tasks: Vec<RegisteredTask>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// 任务内部用来监听 shutdown 信号
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 注册并启动一个后台任务
    ///
    /// panic 会被捕获并记录，不会拖垮 runtime。
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let token = self.shutdown.clone();
        let wrapped_future = async move {
            let result = AssertUnwindSafe(future).catch_unwind().await;
            match result {
                Ok(()) if token.is_cancelled() => {
                    tracing::debug!(task = %name, kind = %kind, "Background task stopped");
                }
                Ok(()) => {
                    tracing::warn!(task = %name, kind = %kind, "Background task completed unexpectedly");
                }
                Err(panic_info) => {
                    let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        (*s).to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    tracing::error!(
                        task = %name,
                        kind = %kind,
                        panic = %panic_msg,
                        "Background task panicked"
                    );
                }
            }
        };

        let handle = tokio::spawn(wrapped_future);
        tracing::debug!(task = %name, kind = %kind, "Registered background task");
        self.tasks.push(RegisteredTask { name, kind, handle });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn log_summary(&self) {
        let workers = self
            .tasks
            .iter()
            .filter(|t| t.kind == TaskKind::Worker)
            .count();
        tracing::info!(
            "Background tasks registered: {} total (Worker: {}, Periodic: {})",
            self.tasks.len(),
            workers,
            self.tasks.len() - workers
        );
    }

    /// 返回已经意外退出的任务数量
    pub fn check_health(&self) -> usize {
        let finished: Vec<_> = self
            .tasks
            .iter()
            .filter(|t| t.handle.is_finished())
            .collect();
        for task in &finished {
            tracing::error!(task = %task.name, kind = %task.kind, "Background task unexpectedly finished");
        }
        finished.len()
    }

    /// 取消所有任务并等待退出，单个任务最多等待 [`SHUTDOWN_GRACE`]
    pub async fn shutdown(self) {
        tracing::info!("Shutting down {} background tasks...", self.tasks.len());
        self.shutdown.cancel();

        for task in self.tasks {
            let abort = task.handle.abort_handle();
            match tokio::time::timeout(SHUTDOWN_GRACE, task.handle).await {
                Ok(Ok(())) => tracing::debug!(task = %task.name, "Task completed"),
                Ok(Err(e)) if e.is_cancelled() => {
                    tracing::debug!(task = %task.name, "Task cancelled")
                }
                Ok(Err(e)) => tracing::error!(task = %task.name, error = ?e, "Task panicked"),
                Err(_) => {
                    tracing::warn!(task = %task.name, "Task did not stop in time, aborting");
                    abort.abort();
                }
            }
        }

        tracing::info!("All background tasks stopped");
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_cancels_workers() {
        let mut tasks = BackgroundTasks::new();
        let token = tasks.shutdown_token();
        tasks.spawn("idle_worker", TaskKind::Worker, async move {
            token.cancelled().await;
        });
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks.check_health(), 0);

        tasks.shutdown().await;
    }

    #[tokio::test]
    async fn test_panicking_task_is_contained() {
        let mut tasks = BackgroundTasks::new();
        tasks.spawn("bad_task", TaskKind::Periodic, async {
            panic!("boom");
        });
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(tasks.check_health(), 1);
        tasks.shutdown().await;
    }
}
