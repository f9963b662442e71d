//! Service Catalog Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// A billable service (haircut, beard trim, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceItem {
    pub id: u64,
    pub name: String,
    pub price: Decimal,
    pub is_active: bool,
}

/// Create service payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServiceCreate {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(custom(function = "validate_price"))]
    pub price: Decimal,
}

/// Update service payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ServiceUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(custom(function = "validate_price"))]
    pub price: Option<Decimal>,
    pub is_active: Option<bool>,
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        return Err(ValidationError::new("price").with_message("price must not be negative".into()));
    }
    Ok(())
}
