//! Shared types for the turn-queue server
//!
//! Domain models exchanged over the API, the unified error-code system and
//! small time utilities used by every crate in the workspace.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
