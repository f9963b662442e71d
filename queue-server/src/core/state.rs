use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::auth::JwtService;
use crate::catalog::CatalogService;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, Result, ServerError};
use crate::notify::{
    LogNotifier, Notification, NotificationQueue, NotificationWorker, Notifier, WebhookNotifier,
};
use crate::queue::{EscalationScheduler, QueueManager, QueueStorage};
use crate::settlement::SettlementEngine;
use crate::staff::StaffDirectory;
use crate::utils::time::{Clock, SystemClock};

/// 通知 worker 在 `start_background_tasks()` 之前暂存于此
type PendingWorker = (NotificationWorker, mpsc::Receiver<Notification>);

/// 服务器状态 - 持有所有服务的共享引用
///
/// 所有字段都是 `Arc` 或内部持有 `Arc`，clone 成本很低。
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | storage | redb 存储 |
/// | queue | 排队状态机 + 通知派发 |
/// | settlement | 日结与营收汇总 |
/// | catalog | 服务目录 |
/// | staff | 员工目录 (PIN 登录) |
/// | jwt_service | JWT 认证服务 |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub storage: QueueStorage,
    pub queue: Arc<QueueManager>,
    pub settlement: Arc<SettlementEngine>,
    pub catalog: CatalogService,
    pub staff: StaffDirectory,
    pub jwt_service: Arc<JwtService>,
    pending_worker: Arc<Mutex<Option<PendingWorker>>>,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("config", &self.config)
            .field("queue", &self.queue)
            .field("settlement", &self.settlement)
            .field("jwt_service", &self.jwt_service)
            .finish_non_exhaustive()
    }
}

impl ServerState {
    /// 组装所有服务 (不做 IO)
    ///
    /// 测试用它注入内存存储、手动时钟和自定义通知发送者。
    pub fn build(
        config: Config,
        storage: QueueStorage,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (notifications, rx) = NotificationQueue::channel(config.notify_queue_capacity);
        let catalog = CatalogService::new(storage.clone());

        let queue = Arc::new(QueueManager::new(
            storage.clone(),
            clock.clone(),
            Arc::new(catalog.clone()),
            notifications,
            config.escalation_threshold_minutes,
        ));
        let settlement = Arc::new(SettlementEngine::new(
            storage.clone(),
            clock.clone(),
            queue.event_sender(),
        ));
        let staff = StaffDirectory::new(storage.clone(), clock);
        let jwt_service = Arc::new(JwtService::with_config(config.jwt.clone()));

        Self {
            config,
            storage,
            queue,
            settlement,
            catalog,
            staff,
            jwt_service,
            pending_worker: Arc::new(Mutex::new(Some((NotificationWorker::new(notifier), rx)))),
        }
    }

    /// 初始化服务器状态
    ///
    /// 1. 创建工作目录 (database/, logs/)
    /// 2. 打开 redb 数据库
    /// 3. 选择通知发送者 (webhook 或日志)
    /// 4. 首次启动时创建管理员
    pub fn initialize(config: &Config) -> Result<Self> {
        config.ensure_work_dir_structure()?;

        let db_path = config.database_path();
        let storage = QueueStorage::open(&db_path)?;
        tracing::info!(path = %db_path.display(), "Queue storage opened");

        let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
            Some(url) => Arc::new(
                WebhookNotifier::new(url.clone())
                    .map_err(|e| ServerError::Notifier(e.to_string()))?,
            ),
            None => Arc::new(LogNotifier),
        };
        tracing::info!(notifier = notifier.name(), "Notification sender selected");

        let state = Self::build(config.clone(), storage, Arc::new(SystemClock), notifier);

        if let Some(pin) = &config.admin_pin {
            state.staff.bootstrap_admin(&config.admin_name, pin)?;
        } else if state.staff.list()?.is_empty() {
            tracing::warn!("Staff directory is empty and ADMIN_PIN is not set, nobody can log in");
        }

        Ok(state)
    }

    /// 启动后台任务
    ///
    /// - `notification_worker` (Worker): 消费通知队列
    /// - `escalation_scheduler` (Periodic): 周期性升级检查
    ///
    /// 只有第一次调用会启动通知 worker。
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        let pending = match self.pending_worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some((worker, rx)) = pending {
            let token = tasks.shutdown_token();
            tasks.spawn("notification_worker", TaskKind::Worker, async move {
                tokio::select! {
                    _ = worker.run(rx) => {}
                    _ = token.cancelled() => {}
                }
            });
        } else {
            tracing::warn!("Notification worker already started");
        }

        let scheduler = EscalationScheduler::new(
            self.queue.clone(),
            self.config.escalation_interval(),
            tasks.shutdown_token(),
        );
        tasks.spawn("escalation_scheduler", TaskKind::Periodic, scheduler.run());

        tasks.log_summary();
        tasks
    }
}
