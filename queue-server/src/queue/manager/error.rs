use shared::models::{Role, TicketState};
use thiserror::Error;

use crate::queue::storage::StorageError;
use crate::utils::error::validation_error;
use crate::utils::{AppError, ErrorCode};

/// Queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Ticket not found: {0}")]
    NotFound(u64),

    #[error("Cannot {action} ticket {ticket_id} in state {from}")]
    InvalidTransition {
        ticket_id: u64,
        from: TicketState,
        action: &'static str,
    },

    #[error("No queued ticket today")]
    EmptyQueue,

    #[error("Client already has ticket #{daily_sequence} today")]
    AlreadyQueued { ticket_id: u64, daily_sequence: u32 },

    #[error("Day already closed: {0}")]
    AlreadyClosed(String),

    #[error("{} role required", .required.as_str())]
    Unauthorized { required: Role },

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("No active ticket for {0}")]
    NoActiveTicket(String),

    #[error("Client not found: {0}")]
    ClientNotFound(String),
}

pub type QueueResult<T> = Result<T, QueueError>;

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Storage(e) => e.into(),
            QueueError::NotFound(id) => {
                AppError::new(ErrorCode::TicketNotFound).with_detail("ticket_id", id)
            }
            QueueError::InvalidTransition {
                ticket_id,
                from,
                action,
            } => AppError::with_message(
                ErrorCode::InvalidTransition,
                format!("Cannot {action} ticket {ticket_id} in state {from}"),
            )
            .with_detail("ticket_id", ticket_id)
            .with_detail("state", from.as_str()),
            QueueError::EmptyQueue => AppError::new(ErrorCode::EmptyQueue),
            QueueError::AlreadyQueued {
                ticket_id,
                daily_sequence,
            } => AppError::new(ErrorCode::AlreadyQueued)
                .with_detail("ticket_id", ticket_id)
                .with_detail("daily_sequence", daily_sequence),
            QueueError::AlreadyClosed(date) => {
                AppError::new(ErrorCode::DayAlreadyClosed).with_detail("date", date)
            }
            QueueError::Unauthorized { required } => {
                if required.is_admin() {
                    AppError::new(ErrorCode::AdminRequired)
                } else {
                    AppError::new(ErrorCode::StaffRequired)
                }
            }
            QueueError::Validation(e) => validation_error(&e),
            QueueError::NoActiveTicket(phone) => {
                AppError::new(ErrorCode::NoActiveTicket).with_detail("phone", phone)
            }
            QueueError::ClientNotFound(phone) => {
                AppError::new(ErrorCode::ClientNotFound).with_detail("phone", phone)
            }
        }
    }
}
