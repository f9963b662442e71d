//! Ticket Model (排队号)

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::util::utc_date_of;

/// Ticket lifecycle state
///
/// `Queued → Called → InChair → AwaitingPayment → Closed`; a client cancel
/// jumps straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    Queued,
    Called,
    InChair,
    AwaitingPayment,
    Closed,
}

impl TicketState {
    /// Every state except `Closed` counts as an open ticket
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Called => "called",
            Self::InChair => "in_chair",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for TicketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proactive notification already sent for a queued ticket.
///
/// Ordered: a ticket's level only ever moves up.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EscalationLevel {
    #[default]
    None,
    /// "Approaching" sent (second in line while a chair runs long)
    Approaching,
    /// "Next in line" sent
    NextInLine,
}

/// Service line snapshot written at finalize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub service_id: u64,
    pub service_name: String,
    pub charged_price: Decimal,
}

/// A numbered turn in the day's line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    /// 1-based, dense within the ticket's business date
    pub daily_sequence: u32,
    pub state: TicketState,
    pub client_phone: String,
    /// Name snapshot taken at registration
    pub client_name: String,
    /// Informational only, never consulted when calling
    pub requested_staff_id: Option<u64>,
    pub assigned_staff_id: Option<u64>,
    pub assigned_staff_name: Option<String>,
    pub created_at: i64,
    pub service_started_at: Option<i64>,
    #[serde(default)]
    pub escalation_level: EscalationLevel,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    pub total: Option<Decimal>,
    pub cancelled_at: Option<i64>,
    pub closed_at: Option<i64>,
}

impl Ticket {
    /// UTC calendar date the ticket belongs to
    pub fn business_date(&self) -> NaiveDate {
        utc_date_of(self.created_at)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some()
    }
}

/// Client self-registration from the kiosk form
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    pub requested_staff_id: Option<u64>,
}

/// Phone: 1-20 digits with an optional leading `+`
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    let valid = (1..=20).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("phone")
            .with_message("phone must be 1-20 digits, optionally prefixed with +".into()))
    }
}

/// Payload for ticket-targeted staff actions (seat, settle)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketIdRequest {
    pub ticket_id: u64,
}

/// Finalize payload: the services performed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub ticket_id: u64,
    #[serde(default)]
    pub service_ids: Vec<u64>,
}

/// Client cancel by phone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    pub phone: String,
}

/// "My ticket" view for a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyTicketStatus {
    pub ticket_id: u64,
    pub daily_sequence: u32,
    pub state: TicketState,
    /// Queued tickets with a smaller sequence
    pub people_ahead: u32,
    pub assigned_staff_name: Option<String>,
}
