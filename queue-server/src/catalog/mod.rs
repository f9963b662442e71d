//! 服务目录 (Service Catalog)
//!
//! 结算时按 id 解析服务名称与价格；管理员维护目录条目。

use shared::models::{ServiceCreate, ServiceItem, ServiceUpdate};
use std::collections::BTreeSet;
use thiserror::Error;
use validator::Validate;

use crate::queue::storage::{QueueStorage, SERVICE_COUNTER, StorageError};
use crate::utils::error::validation_error;
use crate::utils::{AppError, ErrorCode};

/// Catalog errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Service not found: {0}")]
    NotFound(u64),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Storage(e) => e.into(),
            CatalogError::NotFound(id) => {
                AppError::new(ErrorCode::ServiceNotFound).with_detail("service_id", id)
            }
            CatalogError::Validation(e) => validation_error(&e),
        }
    }
}

/// 服务解析接口 (供排队引擎在 finalize 时使用)
pub trait ServiceCatalog: Send + Sync {
    /// 解析一组服务 id
    ///
    /// 未知或已停用的 id 被静默丢弃；重复 id 只计一次；按 id 升序返回。
    fn resolve_active_services(&self, ids: &[u64]) -> Result<Vec<ServiceItem>, StorageError>;
}

/// redb 支持的服务目录
#[derive(Debug, Clone)]
pub struct CatalogService {
    storage: QueueStorage,
}

impl CatalogService {
    pub fn new(storage: QueueStorage) -> Self {
        Self { storage }
    }

    /// 所有服务 (含停用)
    pub fn list_all(&self) -> CatalogResult<Vec<ServiceItem>> {
        Ok(self.storage.list_services()?)
    }

    /// 启用中的服务
    pub fn list_active(&self) -> CatalogResult<Vec<ServiceItem>> {
        let mut services = self.storage.list_services()?;
        services.retain(|s| s.is_active);
        Ok(services)
    }

    pub fn create(&self, payload: ServiceCreate) -> CatalogResult<ServiceItem> {
        payload.validate()?;

        let txn = self.storage.begin_write()?;
        let service = ServiceItem {
            id: self.storage.next_id(&txn, SERVICE_COUNTER)?,
            name: payload.name.trim().to_string(),
            price: payload.price,
            is_active: true,
        };
        self.storage.put_service(&txn, &service)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(service_id = service.id, name = %service.name, price = %service.price, "Service created");
        Ok(service)
    }

    pub fn update(&self, id: u64, payload: ServiceUpdate) -> CatalogResult<ServiceItem> {
        payload.validate()?;

        let txn = self.storage.begin_write()?;
        let mut service = self
            .storage
            .get_service_txn(&txn, id)?
            .ok_or(CatalogError::NotFound(id))?;

        if let Some(name) = payload.name {
            service.name = name.trim().to_string();
        }
        if let Some(price) = payload.price {
            service.price = price;
        }
        if let Some(is_active) = payload.is_active {
            service.is_active = is_active;
        }

        self.storage.put_service(&txn, &service)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(service_id = id, is_active = service.is_active, "Service updated");
        Ok(service)
    }
}

impl ServiceCatalog for CatalogService {
    fn resolve_active_services(&self, ids: &[u64]) -> Result<Vec<ServiceItem>, StorageError> {
        let unique: BTreeSet<u64> = ids.iter().copied().collect();
        let mut resolved = Vec::with_capacity(unique.len());
        for id in unique {
            match self.storage.get_service(id)? {
                Some(service) if service.is_active => resolved.push(service),
                _ => tracing::debug!(service_id = id, "Skipping unknown or inactive service"),
            }
        }
        Ok(resolved)
    }
}
