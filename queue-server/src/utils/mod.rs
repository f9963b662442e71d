//! 工具模块 - 通用工具函数和类型
//!
//! # 内容
//!
//! - [`AppError`] - 应用错误类型 (from shared::error)
//! - [`ApiResponse`] - API 响应结构 (from shared::error)
//! - [`time`] - 时钟与日期解析
//! - 日志初始化

pub mod error;
pub mod logger;
pub mod time;

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode, ok, validation_error};
