//! Service Catalog API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shared::models::{ServiceCreate, ServiceItem, ServiceUpdate};

use crate::core::ServerState;
use crate::utils::{ApiResponse, AppResult, ok};

/// GET /api/services - 启用中的服务
pub async fn list_active(
    State(state): State<ServerState>,
) -> AppResult<Json<ApiResponse<Vec<ServiceItem>>>> {
    Ok(ok(state.catalog.list_active()?))
}

/// GET /api/services/all - 包括已停用的服务
pub async fn list_all(
    State(state): State<ServerState>,
) -> AppResult<Json<ApiResponse<Vec<ServiceItem>>>> {
    Ok(ok(state.catalog.list_all()?))
}

pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<ServiceCreate>,
) -> AppResult<Json<ApiResponse<ServiceItem>>> {
    Ok(ok(state.catalog.create(payload)?))
}

pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<u64>,
    Json(payload): Json<ServiceUpdate>,
) -> AppResult<Json<ApiResponse<ServiceItem>>> {
    Ok(ok(state.catalog.update(id, payload)?))
}
