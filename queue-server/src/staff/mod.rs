//! 员工目录
//!
//! PIN 登录、员工增删改、上班状态切换以及首次启动的管理员初始化。
//! PIN 以 argon2 PHC 字符串保存；因为每个哈希都带独立盐值，登录时
//! 逐个校验而不是按哈希查找。

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::{Deserialize, Serialize};
use shared::models::{StaffCreate, StaffMember, StaffRole, StaffUpdate};
use std::sync::Arc;
use thiserror::Error;
use validator::Validate;

use crate::queue::storage::{QueueStorage, STAFF_COUNTER, StorageError};
use crate::utils::error::validation_error;
use crate::utils::time::Clock;
use crate::utils::{AppError, ErrorCode};

/// 员工存储记录 (含 PIN 哈希，不直接返回给 API)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffRecord {
    pub id: u64,
    pub name: String,
    pub role: StaffRole,
    pub pin_hash: String,
    pub is_available: bool,
    pub created_at: i64,
}

impl StaffRecord {
    /// Verify PIN using argon2
    pub fn verify_pin(&self, pin: &str) -> Result<bool, argon2::password_hash::Error> {
        let parsed_hash = PasswordHash::new(&self.pin_hash)?;
        Ok(Argon2::default()
            .verify_password(pin.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// API 视图
    pub fn to_member(&self) -> StaffMember {
        StaffMember {
            id: self.id,
            name: self.name.clone(),
            role: self.role,
            is_available: self.is_available,
            created_at: self.created_at,
        }
    }
}

/// Hash PIN using argon2
pub fn hash_pin(pin: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(pin.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Staff errors
#[derive(Debug, Error)]
pub enum StaffError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Staff member not found: {0}")]
    NotFound(u64),

    #[error("PIN already in use")]
    PinInUse,

    #[error("Invalid PIN")]
    InvalidCredentials,

    #[error("Cannot delete own account")]
    CannotDeleteSelf,

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("PIN hashing failed: {0}")]
    Hash(String),
}

impl From<argon2::password_hash::Error> for StaffError {
    fn from(err: argon2::password_hash::Error) -> Self {
        StaffError::Hash(err.to_string())
    }
}

pub type StaffResult<T> = Result<T, StaffError>;

impl From<StaffError> for AppError {
    fn from(err: StaffError) -> Self {
        match err {
            StaffError::Storage(e) => e.into(),
            StaffError::NotFound(id) => {
                AppError::new(ErrorCode::StaffNotFound).with_detail("staff_id", id)
            }
            StaffError::PinInUse => AppError::new(ErrorCode::PinInUse),
            StaffError::InvalidCredentials => AppError::invalid_credentials(),
            StaffError::CannotDeleteSelf => AppError::new(ErrorCode::CannotDeleteSelf),
            StaffError::Validation(e) => validation_error(&e),
            StaffError::Hash(msg) => AppError::internal(msg),
        }
    }
}

/// 员工目录服务
#[derive(Debug, Clone)]
pub struct StaffDirectory {
    storage: QueueStorage,
    clock: Arc<dyn Clock>,
}

impl StaffDirectory {
    pub fn new(storage: QueueStorage, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// PIN 登录
    pub fn login(&self, pin: &str) -> StaffResult<StaffRecord> {
        for record in self.storage.list_staff()? {
            if record.verify_pin(pin)? {
                return Ok(record);
            }
        }
        Err(StaffError::InvalidCredentials)
    }

    pub fn list(&self) -> StaffResult<Vec<StaffMember>> {
        Ok(self
            .storage
            .list_staff()?
            .iter()
            .map(StaffRecord::to_member)
            .collect())
    }

    /// 当前上班的员工 (取号表单的可选理发师)
    pub fn list_available(&self) -> StaffResult<Vec<StaffMember>> {
        Ok(self
            .storage
            .list_staff()?
            .iter()
            .filter(|r| r.is_available)
            .map(StaffRecord::to_member)
            .collect())
    }

    pub fn get(&self, id: u64) -> StaffResult<StaffMember> {
        self.storage
            .get_staff(id)?
            .map(|r| r.to_member())
            .ok_or(StaffError::NotFound(id))
    }

    pub fn create(&self, payload: StaffCreate) -> StaffResult<StaffMember> {
        payload.validate()?;
        let pin_hash = hash_pin(&payload.pin)?;

        let txn = self.storage.begin_write()?;
        self.ensure_pin_unused(&txn, &payload.pin, None)?;

        let record = StaffRecord {
            id: self.storage.next_id(&txn, STAFF_COUNTER)?,
            name: payload.name.trim().to_string(),
            role: payload.role,
            pin_hash,
            is_available: true,
            created_at: self.clock.now_millis(),
        };
        self.storage.put_staff(&txn, &record)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(staff_id = record.id, name = %record.name, role = ?record.role, "Staff member created");
        Ok(record.to_member())
    }

    pub fn update(&self, id: u64, payload: StaffUpdate) -> StaffResult<StaffMember> {
        payload.validate()?;
        let new_hash = payload.pin.as_deref().map(hash_pin).transpose()?;

        let txn = self.storage.begin_write()?;
        let mut record = self
            .storage
            .get_staff_txn(&txn, id)?
            .ok_or(StaffError::NotFound(id))?;

        if let Some(pin) = payload.pin.as_deref() {
            self.ensure_pin_unused(&txn, pin, Some(id))?;
        }
        if let Some(name) = payload.name {
            record.name = name.trim().to_string();
        }
        if let Some(role) = payload.role {
            record.role = role;
        }
        if let Some(hash) = new_hash {
            record.pin_hash = hash;
        }

        self.storage.put_staff(&txn, &record)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(staff_id = id, "Staff member updated");
        Ok(record.to_member())
    }

    /// 删除员工
    ///
    /// 历史排队号保留员工名快照，不受影响
    pub fn delete(&self, caller_id: u64, id: u64) -> StaffResult<()> {
        if caller_id == id {
            return Err(StaffError::CannotDeleteSelf);
        }

        let txn = self.storage.begin_write()?;
        if !self.storage.remove_staff(&txn, id)? {
            return Err(StaffError::NotFound(id));
        }
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(staff_id = id, "Staff member deleted");
        Ok(())
    }

    /// 切换上班状态
    pub fn set_availability(&self, id: u64, is_available: bool) -> StaffResult<StaffMember> {
        let txn = self.storage.begin_write()?;
        let mut record = self
            .storage
            .get_staff_txn(&txn, id)?
            .ok_or(StaffError::NotFound(id))?;
        record.is_available = is_available;
        self.storage.put_staff(&txn, &record)?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(staff_id = id, is_available, "Staff availability changed");
        Ok(record.to_member())
    }

    /// 目录为空时创建初始管理员
    ///
    /// 返回 `Some` 表示本次创建了管理员
    pub fn bootstrap_admin(&self, name: &str, pin: &str) -> StaffResult<Option<StaffMember>> {
        if !self.storage.list_staff()?.is_empty() {
            return Ok(None);
        }
        let admin = self.create(StaffCreate {
            name: name.to_string(),
            pin: pin.to_string(),
            role: StaffRole::Admin,
        })?;
        tracing::info!(staff_id = admin.id, "Bootstrap administrator created");
        Ok(Some(admin))
    }

    fn ensure_pin_unused(
        &self,
        txn: &redb::WriteTransaction,
        pin: &str,
        except: Option<u64>,
    ) -> StaffResult<()> {
        for record in self.storage.list_staff_txn(txn)? {
            if Some(record.id) == except {
                continue;
            }
            if record.verify_pin(pin)? {
                return Err(StaffError::PinInUse);
            }
        }
        Ok(())
    }
}
