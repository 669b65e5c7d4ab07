// Restriction Evaluator
//
// Pure predicate over a booking snapshot and one restriction set. Restriction
// sets share a single shape whether attached at the promotion level or the
// benefit level; levels compound by logical AND. Night-spanning rules return a
// proration factor alongside the pass/fail decision.

use chrono::Days;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::promotions::{
    error::{PromoResult, PromotionError},
    ledger::PromotionUsage,
    types::{BookingSnapshot, BookingSource, PaymentType},
};

/// One restriction set, attachable at promotion or benefit level
///
/// Stored as JSONB; absent fields deserialize to their unrestricted defaults.
/// Empty allow-lists mean "all allowed".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Restriction {
    pub min_spend: Option<Decimal>,
    pub min_nights_required: Option<i32>,
    pub nights_stackable: bool,
    pub span_stays: bool,

    pub max_stay_count: Option<u32>,
    pub max_reward_count: Option<u32>,
    pub max_redemption_value: Option<Decimal>,
    pub max_total_bonus_points: Option<i64>,
    pub once_per_sub_brand: bool,

    pub sub_brand_include_ids: Vec<i32>,
    pub sub_brand_exclude_ids: Vec<i32>,
    pub allowed_payment_types: Vec<PaymentType>,
    pub allowed_booking_sources: Vec<BookingSource>,

    pub tie_in_credit_card_ids: Vec<i32>,
    pub tie_in_requires_payment: bool,

    /// Scopes a non-loyalty promotion (credit card, portal) to one chain
    pub hotel_chain_id: Option<i32>,

    pub prerequisite_stay_count: Option<u32>,
    pub prerequisite_night_count: Option<i32>,

    pub book_by_date: Option<chrono::NaiveDate>,
    pub registration_deadline: Option<chrono::NaiveDate>,
    pub registration_date: Option<chrono::NaiveDate>,
    pub valid_days_after_registration: Option<i64>,
}

/// Outcome of evaluating one restriction set against one booking
#[derive(Debug, Clone, PartialEq)]
pub struct RestrictionOutcome {
    pub eligible: bool,
    /// This stay's share of one night-cycle's benefit value; None when the
    /// restriction has no span-stay rule
    pub proration: Option<Decimal>,
}

impl RestrictionOutcome {
    fn pass() -> Self {
        Self {
            eligible: true,
            proration: None,
        }
    }

    fn fail() -> Self {
        Self {
            eligible: false,
            proration: None,
        }
    }
}

impl Restriction {
    /// Structural validation, run before any evaluation
    pub fn validate(&self) -> PromoResult<()> {
        if !self.sub_brand_include_ids.is_empty() && !self.sub_brand_exclude_ids.is_empty() {
            return Err(PromotionError::InvalidConfiguration(
                "sub-brand include and exclude scopes are mutually exclusive".to_string(),
            ));
        }
        if self.span_stays && self.min_nights_required.unwrap_or(0) <= 0 {
            return Err(PromotionError::Computation(
                "span-stay proration requires a positive night threshold".to_string(),
            ));
        }
        if self.max_redemption_value.map_or(false, |v| v < Decimal::ZERO) {
            return Err(PromotionError::Computation(
                "negative redemption cap".to_string(),
            ));
        }
        if self.max_total_bonus_points.map_or(false, |v| v < 0) {
            return Err(PromotionError::Computation(
                "negative bonus point cap".to_string(),
            ));
        }
        Ok(())
    }

    /// Evaluate this restriction set against a booking
    ///
    /// `usage` carries the ledger's prior (pre-this-booking) counters for the
    /// owning promotion; prerequisites and span-stay cycles read from it.
    pub fn evaluate(
        &self,
        booking: &BookingSnapshot,
        usage: &PromotionUsage,
    ) -> PromoResult<RestrictionOutcome> {
        self.validate()?;

        if let Some(min_spend) = self.min_spend {
            if booking.pretax_cost < min_spend {
                return Ok(RestrictionOutcome::fail());
            }
        }

        if !self.allowed_payment_types.is_empty()
            && !self.allowed_payment_types.contains(&booking.payment_type())
        {
            return Ok(RestrictionOutcome::fail());
        }

        if !self.allowed_booking_sources.is_empty()
            && !self.allowed_booking_sources.contains(&booking.source)
        {
            return Ok(RestrictionOutcome::fail());
        }

        if !self.sub_brand_include_ids.is_empty() {
            match booking.sub_brand_id {
                Some(id) if self.sub_brand_include_ids.contains(&id) => {}
                _ => return Ok(RestrictionOutcome::fail()),
            }
        }
        if !self.sub_brand_exclude_ids.is_empty() {
            if let Some(id) = booking.sub_brand_id {
                if self.sub_brand_exclude_ids.contains(&id) {
                    return Ok(RestrictionOutcome::fail());
                }
            }
        }

        if let Some(chain_id) = self.hotel_chain_id {
            if booking.hotel_chain_id != Some(chain_id) {
                return Ok(RestrictionOutcome::fail());
            }
        }

        // Absence of any card always fails a tie-in-gated restriction,
        // regardless of tie_in_requires_payment.
        if !self.tie_in_credit_card_ids.is_empty() {
            match booking.credit_card_id {
                None => return Ok(RestrictionOutcome::fail()),
                Some(card_id) => {
                    if !self.tie_in_credit_card_ids.contains(&card_id) {
                        return Ok(RestrictionOutcome::fail());
                    }
                    if self.tie_in_requires_payment && !booking.card_was_payment() {
                        return Ok(RestrictionOutcome::fail());
                    }
                }
            }
        }

        if let Some(book_by) = self.book_by_date {
            if booking.created_at.date_naive() > book_by {
                return Ok(RestrictionOutcome::fail());
            }
        }

        if let Some(deadline) = self.registration_deadline {
            match self.registration_date {
                Some(registered) if registered <= deadline => {}
                _ => return Ok(RestrictionOutcome::fail()),
            }
        }
        if let Some(valid_days) = self.valid_days_after_registration {
            match self.registration_date {
                Some(registered) => {
                    let last_valid = registered
                        .checked_add_days(Days::new(valid_days.max(0) as u64))
                        .unwrap_or(registered);
                    if booking.check_in > last_valid {
                        return Ok(RestrictionOutcome::fail());
                    }
                }
                // Fails closed: a validity window without a registration date
                // can never be satisfied.
                None => return Ok(RestrictionOutcome::fail()),
            }
        }

        // Prerequisites compare against prior qualifying activity only.
        if let Some(required_stays) = self.prerequisite_stay_count {
            if usage.stay_count < required_stays {
                return Ok(RestrictionOutcome::fail());
            }
        }
        if let Some(required_nights) = self.prerequisite_night_count {
            if usage.eligible_nights < required_nights {
                return Ok(RestrictionOutcome::fail());
            }
        }

        if let Some(min_nights) = self.min_nights_required {
            if self.span_stays {
                let mut clock =
                    CycleClock::new(min_nights, usage.eligible_nights, self.nights_stackable)?;
                let factor = clock.advance(booking.nights);
                return Ok(RestrictionOutcome {
                    eligible: true,
                    proration: Some(factor),
                });
            }
            if booking.nights < min_nights {
                return Ok(RestrictionOutcome::fail());
            }
        }

        Ok(RestrictionOutcome::pass())
    }
}

/// Span-stay proration cycle state machine
///
/// Models a repeating cycle of `cycle_len` eligible nights toward one benefit
/// grant. The clock is positioned from the ledger's cumulative night counter
/// before the stay, then advanced by the stay's own nights; the returned
/// factor is the stay's share of one cycle's benefit value. A stackable rule
/// restarts the cycle every `cycle_len` nights, so a single stay may span a
/// cycle boundary and earn credit toward two cycles (factor above 1 when it
/// covers more than one full cycle). A non-stackable rule stops crediting once
/// the first cycle completes.
#[derive(Debug)]
pub struct CycleClock {
    cycle_len: i32,
    position: i32,
    stackable: bool,
}

impl CycleClock {
    pub fn new(cycle_len: i32, prior_nights: i32, stackable: bool) -> PromoResult<Self> {
        if cycle_len <= 0 {
            return Err(PromotionError::Computation(
                "span-stay cycle length must be positive".to_string(),
            ));
        }
        let prior = prior_nights.max(0);
        let position = if stackable {
            prior % cycle_len
        } else {
            prior.min(cycle_len)
        };
        Ok(Self {
            cycle_len,
            position,
            stackable,
        })
    }

    /// Advance the clock by one stay's nights, returning the proration factor
    pub fn advance(&mut self, nights: i32) -> Decimal {
        let nights = nights.max(0);
        let credited = if self.stackable {
            // Every night counts toward the current or a following cycle.
            nights
        } else {
            (self.position + nights).min(self.cycle_len) - self.position
        };
        self.position = if self.stackable {
            (self.position + nights) % self.cycle_len
        } else {
            (self.position + credited).min(self.cycle_len)
        };
        Decimal::from(credited) / Decimal::from(self.cycle_len)
    }
}
