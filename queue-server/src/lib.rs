//! Queue Server - 理发店排队叫号服务
//!
//! # 架构概述
//!
//! - **排队** (`queue`): redb 持久化的排队号状态机、升级提醒、调度器
//! - **日结** (`settlement`): 营业汇总与不可变的日结记录
//! - **通知** (`notify`): 事务提交后入队，后台 worker 投递
//! - **认证** (`auth`): PIN 登录 + JWT，匿名请求视为客户
//! - **HTTP API** (`api`): axum 路由和处理器
//!
//! # 模块结构
//!
//! ```text
//! queue-server/src/
//! ├── core/          # 配置、状态、错误、后台任务
//! ├── auth/          # JWT、中间件、Caller 提取器
//! ├── queue/         # 存储、策略、管理器、调度器
//! ├── settlement/    # 日结
//! ├── catalog/       # 服务目录
//! ├── staff/         # 员工目录
//! ├── notify/        # 通知队列与发送者
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 错误、时间、日志
//! ```

pub mod api;
pub mod auth;
pub mod catalog;
pub mod core;
pub mod notify;
pub mod queue;
pub mod settlement;
pub mod staff;
pub mod utils;

// Re-export 公共类型
pub use auth::{Caller, CurrentUser, JwtService};
pub use core::{Config, Server, ServerError, ServerState};
pub use queue::{QueueError, QueueManager, QueueStorage};
pub use settlement::SettlementEngine;
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

// Security logging macro - 支持 tracing 格式说明符
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}

/// 设置运行环境
///
/// 1. 加载 `.env` (若存在)
/// 2. 读取配置并创建工作目录
/// 3. 初始化日志 (logs/ 下按天滚动)
pub fn setup_environment() -> crate::core::Result<Config> {
    dotenv::dotenv().ok();

    let config = Config::from_env()?;
    config.ensure_work_dir_structure()?;

    let logs_dir = config.logs_dir();
    init_logger_with_file(
        Some(&config.log_level),
        Some(config.log_json),
        logs_dir.to_str(),
    );

    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
   ____
  / __ \__  _____  __  _____
 / / / / / / / _ \/ / / / _ \
/ /_/ / /_/ /  __/ /_/ /  __/
\___\_\__,_/\___/\__,_/\___/
    "#
    );
}
