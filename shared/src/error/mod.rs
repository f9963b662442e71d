//! Unified error system for the turn-queue server
//!
//! This module provides:
//! - [`ErrorCode`]: Standardized error codes for all error types
//! - [`ErrorCategory`]: Classification of errors by domain
//! - [`AppError`]: Rich error type with codes, messages, and details
//! - [`ApiResponse`]: Unified API response format
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Ticket / queue errors
//! - 5xxx: Settlement errors
//! - 6xxx: Service catalog errors
//! - 8xxx: Staff errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ApiResponse};
//!
//! let err = AppError::new(ErrorCode::EmptyQueue);
//!
//! let err = AppError::with_message(ErrorCode::AlreadyQueued, "Client already has a ticket")
//!     .with_detail("daily_sequence", 3);
//!
//! let response = ApiResponse::<()>::error(&err);
//! assert_eq!(response.code, Some(4004));
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};
