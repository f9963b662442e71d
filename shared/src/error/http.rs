//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::TicketNotFound
            | Self::EmptyQueue
            | Self::NoActiveTicket
            | Self::ClientNotFound
            | Self::ServiceNotFound
            | Self::StaffNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::InvalidTransition
            | Self::AlreadyQueued
            | Self::DayAlreadyClosed
            | Self::PinInUse => StatusCode::CONFLICT,

            // 401 Unauthorized
            Self::NotAuthenticated
            | Self::InvalidCredentials
            | Self::TokenExpired
            | Self::TokenInvalid => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            Self::StaffRequired
            | Self::AdminRequired
            | Self::CannotDeleteSelf => StatusCode::FORBIDDEN,

            // 503 Service Unavailable (transient errors, client can retry)
            Self::SystemBusy => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::InternalError
            | Self::DatabaseError
            | Self::StorageFull
            | Self::StorageCorrupted => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (default for validation errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
