//! 统一错误处理
//!
//! 服务端直接使用 `shared::error` 的统一错误类型：
//! - [`AppError`] - 带错误码的应用错误
//! - [`ApiResponse`] - API 响应信封
//!
//! 领域错误 (`QueueError`, `StaffError`, `CatalogError`) 在各自模块中
//! 通过 `From` 转换为 [`AppError`]。

pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

use axum::Json;
use serde::Serialize;
use validator::ValidationErrors;

/// 成功响应: `Ok(ok(data))`
pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data))
}

/// 将 validator 的字段错误转换为 [`AppError`]，字段名放入 details
pub fn validation_error(errors: &ValidationErrors) -> AppError {
    let mut err = AppError::validation(errors.to_string());
    for (field, field_errors) in errors.field_errors() {
        let messages: Vec<String> = field_errors
            .iter()
            .map(|e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string())
            })
            .collect();
        err = err.with_detail(field.to_string(), messages);
    }
    err
}
