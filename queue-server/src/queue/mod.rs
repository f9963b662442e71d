//! 排队模块
//!
//! - [`storage`] - redb 持久化 (排队号、按日索引、客户、日结、目录)
//! - [`policy`] - 纯决策逻辑 (状态迁移、序号、升级规则)
//! - [`manager`] - 在写事务中执行操作并派发通知
//! - [`scheduler`] - 周期性升级检查

pub mod manager;
pub mod policy;
pub mod scheduler;
pub mod storage;

pub use manager::{QueueError, QueueManager, QueueResult};
pub use scheduler::EscalationScheduler;
pub use storage::{QueueStorage, StorageError};
