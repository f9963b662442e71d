//! Error category classification

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Error category classification based on error code ranges
///
/// Categories are determined by the leading digit of the error code:
/// - 0xxx: General errors
/// - 1xxx: Authentication errors
/// - 2xxx: Permission errors
/// - 4xxx: Ticket errors
/// - 5xxx: Settlement errors
/// - 6xxx: Catalog errors
/// - 8xxx: Staff errors
/// - 9xxx: System errors
///
/// Unassigned ranges (3xxx, 7xxx) are reported as general.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// General errors (0xxx)
    General,
    /// Authentication errors (1xxx)
    Auth,
    /// Permission errors (2xxx)
    Permission,
    /// Ticket errors (4xxx)
    Ticket,
    /// Settlement errors (5xxx)
    Settlement,
    /// Catalog errors (6xxx)
    Catalog,
    /// Staff errors (8xxx)
    Staff,
    /// System errors (9xxx)
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            1000..2000 => Self::Auth,
            2000..3000 => Self::Permission,
            4000..5000 => Self::Ticket,
            5000..6000 => Self::Settlement,
            6000..7000 => Self::Catalog,
            8000..9000 => Self::Staff,
            9000.. => Self::System,
            _ => Self::General,
        }
    }

    /// Get the string name for this category
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Auth => "auth",
            Self::Permission => "permission",
            Self::Ticket => "ticket",
            Self::Settlement => "settlement",
            Self::Catalog => "catalog",
            Self::Staff => "staff",
            Self::System => "system",
        }
    }
}

impl ErrorCode {
    /// Get the category for this error code
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}
