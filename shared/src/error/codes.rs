//! Unified error codes
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 4xxx: Ticket / queue errors
//! - 5xxx: Settlement errors
//! - 6xxx: Service catalog errors
//! - 8xxx: Staff errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Validation failed
    ValidationFailed = 2,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Invalid credentials (PIN)
    InvalidCredentials = 1002,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,

    // ==================== 2xxx: Permission ====================
    /// Staff role required
    StaffRequired = 2002,
    /// Admin role required
    AdminRequired = 2003,
    /// Cannot delete own account
    CannotDeleteSelf = 2004,

    // ==================== 4xxx: Ticket ====================
    /// Ticket not found
    TicketNotFound = 4001,
    /// Event is not legal in the ticket's current state
    InvalidTransition = 4002,
    /// No queued ticket to call
    EmptyQueue = 4003,
    /// Client already holds an open ticket today
    AlreadyQueued = 4004,
    /// Client has no active ticket today
    NoActiveTicket = 4005,
    /// Client (phone) not registered
    ClientNotFound = 4006,

    // ==================== 5xxx: Settlement ====================
    /// A closing already exists for the date
    DayAlreadyClosed = 5001,

    // ==================== 6xxx: Catalog ====================
    /// Service not found
    ServiceNotFound = 6001,

    // ==================== 8xxx: Staff ====================
    /// Staff member not found
    StaffNotFound = 8001,
    /// PIN already used by another staff member
    PinInUse = 8002,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,

    // ==================== 94xx: Storage ====================
    /// Storage full (disk space insufficient)
    StorageFull = 9401,
    /// Storage corrupted (data file damaged)
    StorageCorrupted = 9403,
    /// System busy (IO error, retry later)
    SystemBusy = 9404,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::ValidationFailed => "Validation failed",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::InvalidCredentials => "Invalid PIN",
            ErrorCode::TokenExpired => "Authentication token has expired",
            ErrorCode::TokenInvalid => "Authentication token is invalid",

            // Permission
            ErrorCode::StaffRequired => "Staff role is required",
            ErrorCode::AdminRequired => "Administrator role is required",
            ErrorCode::CannotDeleteSelf => "Cannot delete own account",

            // Ticket
            ErrorCode::TicketNotFound => "Ticket not found",
            ErrorCode::InvalidTransition => "Operation not allowed in the ticket's current state",
            ErrorCode::EmptyQueue => "There are no tickets waiting in the queue",
            ErrorCode::AlreadyQueued => "Client already has an active ticket today",
            ErrorCode::NoActiveTicket => "Client has no active ticket today",
            ErrorCode::ClientNotFound => "Client not registered",

            // Settlement
            ErrorCode::DayAlreadyClosed => "The register for this date is already closed",

            // Catalog
            ErrorCode::ServiceNotFound => "Service not found",

            // Staff
            ErrorCode::StaffNotFound => "Staff member not found",
            ErrorCode::PinInUse => "PIN is already in use",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",

            // Storage
            ErrorCode::StorageFull => "Storage full (disk space insufficient)",
            ErrorCode::StorageCorrupted => "Storage corrupted (data file damaged)",
            ErrorCode::SystemBusy => "System busy, please retry later",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            2 => Ok(ErrorCode::ValidationFailed),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1002 => Ok(ErrorCode::InvalidCredentials),
            1003 => Ok(ErrorCode::TokenExpired),
            1004 => Ok(ErrorCode::TokenInvalid),

            // Permission
            2002 => Ok(ErrorCode::StaffRequired),
            2003 => Ok(ErrorCode::AdminRequired),
            2004 => Ok(ErrorCode::CannotDeleteSelf),

            // Ticket
            4001 => Ok(ErrorCode::TicketNotFound),
            4002 => Ok(ErrorCode::InvalidTransition),
            4003 => Ok(ErrorCode::EmptyQueue),
            4004 => Ok(ErrorCode::AlreadyQueued),
            4005 => Ok(ErrorCode::NoActiveTicket),
            4006 => Ok(ErrorCode::ClientNotFound),

            // Settlement
            5001 => Ok(ErrorCode::DayAlreadyClosed),

            // Catalog
            6001 => Ok(ErrorCode::ServiceNotFound),

            // Staff
            8001 => Ok(ErrorCode::StaffNotFound),
            8002 => Ok(ErrorCode::PinInUse),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9401 => Ok(ErrorCode::StorageFull),
            9403 => Ok(ErrorCode::StorageCorrupted),
            9404 => Ok(ErrorCode::SystemBusy),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
