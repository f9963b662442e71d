//! Authentication Handlers
//!
//! PIN login and current-session lookup

use std::time::Duration;

use axum::{Extension, Json, extract::State};
use shared::models::{LoginRequest, LoginResponse, Role, StaffMember};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::security_log;
use crate::staff::StaffError;
use crate::utils::{ApiResponse, AppError, AppResult, ok};

/// Failed logins are delayed to slow down PIN guessing
const AUTH_FAILURE_DELAY_MS: u64 = 300;

/// Login handler
///
/// The PIN is checked against every stored hash, so the argon2 work runs on
/// the blocking pool.
pub async fn login(
    State(state): State<ServerState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let staff = state.staff.clone();
    let pin = req.pin;
    let result = tokio::task::spawn_blocking(move || staff.login(&pin))
        .await
        .map_err(|e| AppError::internal(format!("Login task failed: {}", e)))?;

    let record = match result {
        Ok(record) => record,
        Err(StaffError::InvalidCredentials) => {
            security_log!("WARN", "login_failed", reason = "invalid_pin");
            tokio::time::sleep(Duration::from_millis(AUTH_FAILURE_DELAY_MS)).await;
            return Err(AppError::invalid_credentials());
        }
        Err(e) => return Err(e.into()),
    };

    let token = state
        .jwt_service
        .generate_token(record.id, &record.name, Role::from(record.role))
        .map_err(|e| AppError::internal(format!("Failed to generate token: {}", e)))?;

    tracing::info!(staff_id = record.id, name = %record.name, "Staff logged in");

    Ok(ok(LoginResponse {
        token,
        expires_in: state.jwt_service.expires_in_secs(),
        staff: record.to_member(),
    }))
}

/// Get current staff member
pub async fn me(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<StaffMember>>> {
    let member = state.staff.get(user.id)?;
    Ok(ok(member))
}
