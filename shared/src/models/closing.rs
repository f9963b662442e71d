//! Daily Closing Model (日结)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Immutable end-of-day register closing, one per business date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyClosing {
    /// Business date (YYYY-MM-DD format)
    pub date: String,
    /// When the closing was recorded (Unix millis)
    pub closed_at: i64,
    pub total_collected: Decimal,
    pub ticket_count: u32,
    pub closed_by_id: u64,
    pub closed_by_name: String,
}

/// Close-day payload; the date defaults to today
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloseDayRequest {
    pub date: Option<String>,
}

/// Revenue attributed to one staff member for a day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffPerformance {
    pub staff_id: u64,
    pub staff_name: String,
    pub total: Decimal,
    pub tickets: u32,
}

/// Running figures for a day, closed or not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: String,
    pub total_collected: Decimal,
    pub ticket_count: u32,
    pub average_ticket: Decimal,
    /// Sorted by total, highest first
    pub by_staff: Vec<StaffPerformance>,
    pub closing: Option<DailyClosing>,
}
