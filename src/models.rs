// Static reference data models
// Row types for the lookup tables the promotion engine links against

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// A hotel loyalty program chain
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct HotelChain {
    pub id: i32,
    pub name: String,
    /// Cash value of one loyalty point, in dollars
    pub point_value: Decimal,
}

/// A brand within a hotel chain
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct SubBrand {
    pub id: i32,
    pub hotel_chain_id: i32,
    pub name: String,
}

/// A credit card bookings can be paid with or tied to
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct CreditCard {
    pub id: i32,
    pub name: String,
}

/// A shopping portal bookings can be routed through
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ShoppingPortal {
    pub id: i32,
    pub name: String,
}

/// Cash valuation of one certificate type
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct CertificateValue {
    pub cert_type: String,
    pub cash_value: Decimal,
}
