//! Staff Model

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Role of a request's caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Staff,
    Admin,
}

impl Role {
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Staff | Self::Admin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Staff => "staff",
            Self::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "client" => Some(Self::Client),
            "staff" => Some(Self::Staff),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Role a staff directory entry can hold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    #[default]
    Staff,
    Admin,
}

impl From<StaffRole> for Role {
    fn from(role: StaffRole) -> Self {
        match role {
            StaffRole::Staff => Role::Staff,
            StaffRole::Admin => Role::Admin,
        }
    }
}

/// Staff response (without PIN hash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: u64,
    pub name: String,
    pub role: StaffRole,
    pub is_available: bool,
    pub created_at: i64,
}

/// Create staff payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StaffCreate {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 4, max = 12, message = "PIN must be 4-12 characters"))]
    pub pin: String,
    #[serde(default)]
    pub role: StaffRole,
}

/// Update staff payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct StaffUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 4, max = 12, message = "PIN must be 4-12 characters"))]
    pub pin: Option<String>,
    pub role: Option<StaffRole>,
}

/// Availability toggle for the calling staff member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityUpdate {
    pub is_available: bool,
}

/// PIN login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub pin: String,
}

/// Login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    /// Token lifetime in seconds
    pub expires_in: i64,
    pub staff: StaffMember,
}
