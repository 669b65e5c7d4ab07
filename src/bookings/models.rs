use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::promotions::BookingSource;

/// A stored hotel booking
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Booking {
    pub id: Uuid,
    pub hotel_name: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    /// Room cost before taxes and fees
    pub pretax_cost: Decimal,
    /// Full cost including taxes and fees
    pub total_cost: Decimal,
    pub cash_paid: Decimal,
    pub points_redeemed: i64,
    pub certificates_used: i32,
    pub hotel_chain_id: Option<i32>,
    pub sub_brand_id: Option<i32>,
    pub credit_card_id: Option<i32>,
    pub shopping_portal_id: Option<i32>,
    pub source: BookingSource,
    /// Base loyalty points the stay earns, before any promotion bonus
    pub points_earned: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A booking together with the promotions currently applied to it
#[derive(Debug, Serialize, ToSchema)]
pub struct BookingResponse {
    #[serde(flatten)]
    pub booking: Booking,
    pub promotions: Vec<crate::promotions::AppliedPromotion>,
}

/// Request body for creating a booking
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBooking {
    #[validate(length(min = 1, max = 200, message = "Hotel name must be 1-200 characters"))]
    pub hotel_name: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(default)]
    pub pretax_cost: Decimal,
    #[serde(default)]
    pub total_cost: Decimal,
    #[serde(default)]
    pub cash_paid: Decimal,
    #[serde(default)]
    pub points_redeemed: i64,
    #[serde(default)]
    pub certificates_used: i32,
    pub hotel_chain_id: Option<i32>,
    pub sub_brand_id: Option<i32>,
    pub credit_card_id: Option<i32>,
    pub shopping_portal_id: Option<i32>,
    #[serde(default)]
    pub source: BookingSource,
    #[serde(default)]
    pub points_earned: i64,
}

/// Request body for updating a booking; omitted fields keep their values
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBooking {
    #[validate(length(min = 1, max = 200, message = "Hotel name must be 1-200 characters"))]
    pub hotel_name: Option<String>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub pretax_cost: Option<Decimal>,
    pub total_cost: Option<Decimal>,
    pub cash_paid: Option<Decimal>,
    pub points_redeemed: Option<i64>,
    pub certificates_used: Option<i32>,
    pub hotel_chain_id: Option<i32>,
    pub sub_brand_id: Option<i32>,
    pub credit_card_id: Option<i32>,
    pub shopping_portal_id: Option<i32>,
    pub source: Option<BookingSource>,
    pub points_earned: Option<i64>,
}

