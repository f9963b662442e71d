//! Client Model

use serde::{Deserialize, Serialize};

/// A walk-in client, keyed by phone number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub phone: String,
    /// Last name given at registration (last write wins)
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}
