//! Staff API Handlers

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use shared::models::{AvailabilityUpdate, StaffCreate, StaffMember, StaffUpdate};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::utils::{ApiResponse, AppError, AppResult, ok};

type StaffResponse = AppResult<Json<ApiResponse<StaffMember>>>;

/// GET /api/staff/available
pub async fn list_available(
    State(state): State<ServerState>,
) -> AppResult<Json<ApiResponse<Vec<StaffMember>>>> {
    Ok(ok(state.staff.list_available()?))
}

/// GET /api/staff
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<ApiResponse<Vec<StaffMember>>>> {
    Ok(ok(state.staff.list()?))
}

/// POST /api/staff
///
/// PIN 哈希与唯一性检查较慢，放到 blocking 线程池
pub async fn create(State(state): State<ServerState>, Json(payload): Json<StaffCreate>) -> StaffResponse {
    let staff = state.staff.clone();
    let member = tokio::task::spawn_blocking(move || staff.create(payload))
        .await
        .map_err(|e| AppError::internal(format!("Staff task failed: {}", e)))??;
    Ok(ok(member))
}

/// PUT /api/staff/{id}
pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<u64>,
    Json(payload): Json<StaffUpdate>,
) -> StaffResponse {
    let staff = state.staff.clone();
    let member = tokio::task::spawn_blocking(move || staff.update(id, payload))
        .await
        .map_err(|e| AppError::internal(format!("Staff task failed: {}", e)))??;
    Ok(ok(member))
}

/// DELETE /api/staff/{id}
pub async fn delete(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<u64>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.staff.delete(user.id, id)?;
    Ok(Json(ApiResponse::ok()))
}

/// POST /api/staff/me/availability - 切换自己的接客状态
pub async fn set_my_availability(
    State(state): State<ServerState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<AvailabilityUpdate>,
) -> StaffResponse {
    Ok(ok(state.staff.set_availability(user.id, payload.is_available)?))
}
