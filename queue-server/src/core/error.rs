use thiserror::Error;

use crate::queue::StorageError;
use crate::staff::StaffError;

/// 服务器生命周期错误 (启动、监听、运行)
///
/// 请求级别的错误走 [`AppError`](crate::utils::AppError)
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("存储初始化失败: {0}")]
    Storage(#[from] StorageError),

    #[error("管理员初始化失败: {0}")]
    Bootstrap(#[from] StaffError),

    #[error("通知通道初始化失败: {0}")]
    Notifier(String),

    #[error("端口绑定失败 {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP 服务异常: {0}")]
    Serve(#[source] std::io::Error),

    #[error("内部服务器错误")]
    Internal(#[from] anyhow::Error),
}

/// 服务器生命周期 Result 类型别名
pub type Result<T> = std::result::Result<T, ServerError>;
