// Domain type definitions for the Promotion Engine
// Provides shared types used across the restriction evaluator, valuator,
// ledger, and matching engine

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of promotion, determines which booking link field must match
///
/// A loyalty promotion matches on the booking's hotel chain, a credit card
/// promotion on the payment card, a portal promotion on the shopping portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PromotionType {
    /// Hotel loyalty program promotion, linked to a hotel chain
    Loyalty,

    /// Credit card spend promotion, linked to a credit card
    CreditCard,

    /// Shopping portal promotion, linked to a portal
    Portal,
}

impl fmt::Display for PromotionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromotionType::Loyalty => write!(f, "loyalty"),
            PromotionType::CreditCard => write!(f, "credit_card"),
            PromotionType::Portal => write!(f, "portal"),
        }
    }
}

/// What a benefit rewards the traveler with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    /// Bonus loyalty points
    Points,

    /// Cash back or statement credit
    Cashback,

    /// Free-night or award certificates
    Certificate,

    /// Bonus elite-qualifying nights
    Eqn,
}

impl fmt::Display for RewardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewardType::Points => write!(f, "points"),
            RewardType::Cashback => write!(f, "cashback"),
            RewardType::Certificate => write!(f, "certificate"),
            RewardType::Eqn => write!(f, "eqn"),
        }
    }
}

/// How a benefit's numeric value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Fixed amount (dollars, points, certificates, or nights)
    Fixed,

    /// Percentage of the booking's total cost
    Percentage,

    /// Multiplier on the points earned by the booking (points rewards only)
    Multiplier,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Fixed => write!(f, "fixed"),
            ValueType::Percentage => write!(f, "percentage"),
            ValueType::Multiplier => write!(f, "multiplier"),
        }
    }
}

/// Classification of how a booking was paid for
///
/// Derived from the booking's payment composition, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Cash,
    Points,
    Certificate,
    CashAndPoints,
    CashAndCertificate,
    PointsAndCertificate,
    Mixed,
}

impl PaymentType {
    /// Classify a payment composition
    ///
    /// A booking with no cash, points, or certificates recorded is treated as
    /// a cash booking (costs exist but composition was not broken out).
    pub fn classify(cash_paid: Decimal, points_redeemed: i64, certificates_used: i32) -> Self {
        let cash = cash_paid > Decimal::ZERO;
        let points = points_redeemed > 0;
        let certs = certificates_used > 0;

        match (cash, points, certs) {
            (_, false, false) => PaymentType::Cash,
            (false, true, false) => PaymentType::Points,
            (false, false, true) => PaymentType::Certificate,
            (true, true, false) => PaymentType::CashAndPoints,
            (true, false, true) => PaymentType::CashAndCertificate,
            (false, true, true) => PaymentType::PointsAndCertificate,
            (true, true, true) => PaymentType::Mixed,
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentType::Cash => write!(f, "cash"),
            PaymentType::Points => write!(f, "points"),
            PaymentType::Certificate => write!(f, "certificate"),
            PaymentType::CashAndPoints => write!(f, "cash_and_points"),
            PaymentType::CashAndCertificate => write!(f, "cash_and_certificate"),
            PaymentType::PointsAndCertificate => write!(f, "points_and_certificate"),
            PaymentType::Mixed => write!(f, "mixed"),
        }
    }
}

/// Where a booking was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingSource {
    DirectWeb,
    DirectApp,
    Ota,
    Other,
}

impl Default for BookingSource {
    fn default() -> Self {
        BookingSource::Other
    }
}

impl fmt::Display for BookingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingSource::DirectWeb => write!(f, "direct_web"),
            BookingSource::DirectApp => write!(f, "direct_app"),
            BookingSource::Ota => write!(f, "ota"),
            BookingSource::Other => write!(f, "other"),
        }
    }
}

/// Immutable booking snapshot consumed by the engine
///
/// Built from a stored booking record; the engine never mutates it.
#[derive(Debug, Clone)]
pub struct BookingSnapshot {
    pub id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub nights: i32,
    pub pretax_cost: Decimal,
    pub total_cost: Decimal,
    pub cash_paid: Decimal,
    pub points_redeemed: i64,
    pub certificates_used: i32,
    pub hotel_chain_id: Option<i32>,
    pub sub_brand_id: Option<i32>,
    pub credit_card_id: Option<i32>,
    pub shopping_portal_id: Option<i32>,
    pub source: BookingSource,
    pub points_earned: i64,
}

impl BookingSnapshot {
    /// Payment classification for this booking
    pub fn payment_type(&self) -> PaymentType {
        PaymentType::classify(self.cash_paid, self.points_redeemed, self.certificates_used)
    }

    /// Whether the attached card was the payment instrument, not just on file
    ///
    /// A card counts as the payment instrument when it is attached and the
    /// booking carries a cash component it could have charged.
    pub fn card_was_payment(&self) -> bool {
        self.credit_card_id.is_some() && self.cash_paid > Decimal::ZERO
    }
}
