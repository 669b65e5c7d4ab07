// Benefit Valuator
//
// Pure function from a matched benefit and a booking snapshot to a raw
// monetary value, before any caps or proration. Point and certificate rewards
// are converted to dollars through the static valuation reference tables.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::promotions::{
    catalog::{Benefit, ValuationTable},
    error::{PromoResult, PromotionError},
    types::{BookingSnapshot, RewardType, ValueType},
};

/// Raw computed value of one benefit, pre-cap and pre-proration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBenefitValue {
    /// Dollar value
    pub value: Decimal,
    /// Bonus points granted
    pub points: i64,
    /// Bonus elite-qualifying nights granted
    pub eqns: i32,
    /// Certificates granted
    pub certificates: i32,
}

/// Compute a benefit's raw value for one booking
pub fn value_benefit(
    benefit: &Benefit,
    booking: &BookingSnapshot,
    rates: &ValuationTable,
) -> PromoResult<RawBenefitValue> {
    match benefit.reward_type {
        RewardType::Cashback => {
            let value = match benefit.value_type {
                ValueType::Fixed => benefit.value,
                ValueType::Percentage => {
                    booking.total_cost * benefit.value / Decimal::ONE_HUNDRED
                }
                ValueType::Multiplier => {
                    return Err(PromotionError::InvalidConfiguration(
                        "multiplier value type is only valid for points rewards".to_string(),
                    ))
                }
            };
            Ok(RawBenefitValue {
                value,
                ..Default::default()
            })
        }
        RewardType::Points => {
            let points = match benefit.value_type {
                ValueType::Fixed => as_whole(benefit.value)?,
                // Bonus on top of the points the stay already earned.
                ValueType::Multiplier => {
                    let bonus = Decimal::from(booking.points_earned)
                        * (benefit.value - Decimal::ONE);
                    as_whole(bonus)?
                }
                ValueType::Percentage => {
                    let bonus =
                        booking.total_cost * benefit.value / Decimal::ONE_HUNDRED;
                    as_whole(bonus)?
                }
            };
            let points = points.max(0);
            let rate = rates.point_value(booking.hotel_chain_id);
            Ok(RawBenefitValue {
                value: Decimal::from(points) * rate,
                points,
                ..Default::default()
            })
        }
        RewardType::Certificate => {
            if benefit.value_type != ValueType::Fixed {
                return Err(PromotionError::InvalidConfiguration(
                    "certificate rewards must carry a fixed count".to_string(),
                ));
            }
            let count = as_whole(benefit.value)? as i32;
            let each = benefit
                .cert_type
                .as_deref()
                .map(|t| rates.cert_value(t))
                .unwrap_or(Decimal::ZERO);
            Ok(RawBenefitValue {
                value: Decimal::from(count) * each,
                certificates: count,
                ..Default::default()
            })
        }
        RewardType::Eqn => {
            if benefit.value_type != ValueType::Fixed {
                return Err(PromotionError::InvalidConfiguration(
                    "EQN rewards must carry a fixed night count".to_string(),
                ));
            }
            Ok(RawBenefitValue {
                eqns: as_whole(benefit.value)? as i32,
                ..Default::default()
            })
        }
    }
}

fn as_whole(value: Decimal) -> PromoResult<i64> {
    value
        .floor()
        .to_i64()
        .ok_or_else(|| PromotionError::Computation(format!("value out of range: {value}")))
}
