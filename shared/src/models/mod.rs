//! Data models
//!
//! Shared between queue-server and its clients (via API).
//! Records are persisted as JSON in redb; all ids are `u64` store counters,
//! timestamps are Unix millis, money is `rust_decimal::Decimal`.

pub mod client;
pub mod closing;
pub mod event;
pub mod service;
pub mod staff;
pub mod ticket;

// Re-exports
pub use client::*;
pub use closing::*;
pub use event::*;
pub use service::*;
pub use staff::*;
pub use ticket::*;
