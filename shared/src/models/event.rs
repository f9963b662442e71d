//! Queue change events pushed to live displays

use serde::{Deserialize, Serialize};

use super::TicketState;

/// What happened to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueAction {
    Registered,
    Called,
    Seated,
    Finalized,
    Settled,
    Cancelled,
    Escalated,
    DayClosed,
}

/// Emitted after every committed queue mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEvent {
    pub action: QueueAction,
    /// Business date (YYYY-MM-DD) the change belongs to
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_sequence: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<TicketState>,
    pub timestamp: i64,
}
