// Matching Engine
//
// Produces, for one booking, the ordered list of (promotion, tier, benefit)
// applications and their capped final values. Pure and synchronous: all
// inputs are in-memory snapshots and the only mutable state is the usage
// ledger threaded in by the caller. Per-promotion configuration failures are
// isolated and logged; they never block matching against other promotions.
// Only infrastructure failures propagate and abort the run.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::promotions::{
    catalog::{Benefit, Promotion, ValuationTable},
    error::PromoResult,
    ledger::{whole_points, CapSet, UsageLedger},
    restrictions::Restriction,
    types::BookingSnapshot,
    valuation::value_benefit,
};

/// One benefit application within a matched promotion
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedBenefit {
    pub benefit_id: Uuid,
    pub applied_value: Decimal,
    pub bonus_points: i64,
    pub eqns: i32,
    pub certificates: i32,
    pub eligible_nights_at_booking: i32,
    /// False when the benefit matched but every cap denied it value
    pub valued: bool,
}

/// One promotion application for one booking
///
/// Emitted whenever the promotion-level gate passes, even when caps reduce
/// every benefit to zero; absence of value is never absence of a match.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPromotion {
    pub promotion_id: Uuid,
    pub applied_value: Decimal,
    pub bonus_points: i64,
    pub eqns: i32,
    pub eligible_nights_at_booking: i32,
    pub benefits: Vec<MatchedBenefit>,
}

/// Evaluation result for one booking within a sequence
#[derive(Debug, Clone)]
pub struct BookingEvaluation {
    pub booking_id: Uuid,
    pub matches: Vec<MatchedPromotion>,
}

/// Match one booking against the active promotion catalog
///
/// The ledger must already reflect every chronologically earlier booking.
pub fn match_booking(
    booking: &BookingSnapshot,
    promotions: &[Promotion],
    ledger: &mut UsageLedger,
    rates: &ValuationTable,
) -> PromoResult<Vec<MatchedPromotion>> {
    let mut matches = Vec::new();
    for promotion in promotions {
        match match_promotion(booking, promotion, ledger, rates) {
            Ok(Some(matched)) => matches.push(matched),
            Ok(None) => {}
            // One bad definition must not block the rest of the catalog.
            Err(e) if e.is_promotion_scoped() => {
                tracing::warn!(
                    promotion_id = %promotion.id,
                    booking_id = %booking.id,
                    "skipping promotion: {e}"
                );
            }
            // Infrastructure failures abort the whole run.
            Err(e) => return Err(e),
        }
    }
    Ok(matches)
}

/// Evaluate an ordered batch of bookings, threading one shared ledger
///
/// Bookings are sorted by check-in date (creation time, then id, as
/// tie-breaks) so cap consumption follows chronological stay order no matter
/// what order the records were created in.
pub fn evaluate_sequence(
    bookings: &[BookingSnapshot],
    promotions: &[Promotion],
    rates: &ValuationTable,
) -> PromoResult<Vec<BookingEvaluation>> {
    let mut ordered: Vec<&BookingSnapshot> = bookings.iter().collect();
    ordered.sort_by(|a, b| {
        a.check_in
            .cmp(&b.check_in)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });

    let mut ledger = UsageLedger::new();
    let mut evaluations = Vec::with_capacity(ordered.len());
    for booking in ordered {
        evaluations.push(BookingEvaluation {
            booking_id: booking.id,
            matches: match_booking(booking, promotions, &mut ledger, rates)?,
        });
    }
    Ok(evaluations)
}

fn match_promotion(
    booking: &BookingSnapshot,
    promotion: &Promotion,
    ledger: &mut UsageLedger,
    rates: &ValuationTable,
) -> PromoResult<Option<MatchedPromotion>> {
    if !promotion.is_active {
        return Ok(None);
    }

    // Type/link check: the promotion type selects which booking field must
    // match the promotion's link.
    let link = match promotion.promotion_type {
        crate::promotions::types::PromotionType::Loyalty => booking.hotel_chain_id,
        crate::promotions::types::PromotionType::CreditCard => booking.credit_card_id,
        crate::promotions::types::PromotionType::Portal => booking.shopping_portal_id,
    };
    if link != Some(promotion.link_id) {
        return Ok(None);
    }

    // Date window compares against check-in, never record creation time.
    if let Some(start) = promotion.start_date {
        if booking.check_in < start {
            return Ok(None);
        }
    }
    if let Some(end) = promotion.end_date {
        if booking.check_in > end {
            return Ok(None);
        }
    }

    promotion.validate()?;

    let prior = ledger.usage(promotion.id);

    let mut promotion_factor = None;
    if let Some(ref restriction) = promotion.restrictions {
        let outcome = restriction.evaluate(booking, &prior)?;
        if !outcome.eligible {
            return Ok(None);
        }
        promotion_factor = outcome.proration;
    }

    // From here on the stay is qualifying: it advances the ledger and emits a
    // row even if no benefit survives.
    let stay_ordinal = prior.stay_count + 1;
    let cumulative_nights = prior.eligible_nights + booking.nights.max(0);

    let candidates: Vec<&Benefit> = if promotion.tiers.is_empty() {
        promotion.benefits.iter().collect()
    } else {
        // First tier (in defined order) whose range contains the current
        // ordinal; no tier means a qualifying stay with no benefits.
        promotion
            .tiers
            .iter()
            .find(|tier| tier.contains(stay_ordinal, cumulative_nights))
            .map(|tier| tier.benefits.iter().collect())
            .unwrap_or_default()
    };

    let mut ordered = candidates;
    ordered.sort_by_key(|b| (b.sort_order, b.id));

    let mut benefits = Vec::new();
    let mut total_value = Decimal::ZERO;
    let mut total_points = 0i64;
    let mut total_eqns = 0i32;

    for benefit in ordered {
        // A tie-in benefit without any card on the booking always fails.
        if benefit.is_tie_in && booking.credit_card_id.is_none() {
            continue;
        }

        // Benefit restrictions compound with the promotion's by AND; the
        // usage here includes grants from earlier benefits of this same
        // promotion so value caps accumulate within the booking too.
        let usage = ledger.usage(promotion.id);
        let mut factor = promotion_factor;
        if let Some(ref restriction) = benefit.restrictions {
            let outcome = restriction.evaluate(booking, &usage)?;
            if !outcome.eligible {
                continue;
            }
            factor = match (factor, outcome.proration) {
                (Some(a), Some(b)) => Some(a * b),
                (a, None) => a,
                (None, b) => b,
            };
        }

        let mut raw = value_benefit(benefit, booking, rates)?;
        if let Some(factor) = factor {
            // Cycle fractions like 2/6 do not terminate; settle to cents.
            raw.value = (raw.value * factor).round_dp(2);
            raw.points = whole_points(Decimal::from(raw.points) * factor);
        }

        let caps = CapSet::merge(
            &[promotion.restrictions.as_ref(), benefit.restrictions.as_ref()],
            promotion.is_single_use,
        );
        let once_per_sub_brand = has_once_per_sub_brand(
            promotion.restrictions.as_ref(),
            benefit.restrictions.as_ref(),
        );
        let sub_brand_spent = once_per_sub_brand
            && booking
                .sub_brand_id
                .map_or(false, |sb| ledger.has_sub_brand_grant(promotion.id, sb));
        let point_rate = matches!(
            benefit.reward_type,
            crate::promotions::types::RewardType::Points
        )
        .then(|| rates.point_value(booking.hotel_chain_id));

        let grant = caps.apply(&raw, stay_ordinal, &usage, point_rate, sub_brand_spent);

        ledger.record_grant(promotion.id, grant.value, grant.points);
        if grant.valued && once_per_sub_brand {
            if let Some(sub_brand_id) = booking.sub_brand_id {
                ledger.record_sub_brand_grant(promotion.id, sub_brand_id);
            }
        }

        total_value += grant.value;
        total_points += grant.points;
        total_eqns += grant.eqns;
        benefits.push(MatchedBenefit {
            benefit_id: benefit.id,
            applied_value: grant.value,
            bonus_points: grant.points,
            eqns: grant.eqns,
            certificates: grant.certificates,
            eligible_nights_at_booking: cumulative_nights,
            valued: grant.valued,
        });
    }

    ledger.record_qualifying_stay(promotion.id, booking.nights);

    Ok(Some(MatchedPromotion {
        promotion_id: promotion.id,
        applied_value: total_value,
        bonus_points: total_points,
        eqns: total_eqns,
        eligible_nights_at_booking: cumulative_nights,
        benefits,
    }))
}

fn has_once_per_sub_brand(
    promotion_level: Option<&Restriction>,
    benefit_level: Option<&Restriction>,
) -> bool {
    promotion_level.map_or(false, |r| r.once_per_sub_brand)
        || benefit_level.map_or(false, |r| r.once_per_sub_brand)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promotions::catalog::Tier;
    use crate::promotions::types::{BookingSource, PaymentType, PromotionType, RewardType, ValueType};
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn booking_on(check_in: NaiveDate, nights: i32) -> BookingSnapshot {
        BookingSnapshot {
            id: Uuid::new_v4(),
            check_in,
            check_out: check_in + Duration::days(nights as i64),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            nights,
            pretax_cost: dec!(100),
            total_cost: dec!(115),
            cash_paid: dec!(115),
            points_redeemed: 0,
            certificates_used: 0,
            hotel_chain_id: Some(1),
            sub_brand_id: None,
            credit_card_id: None,
            shopping_portal_id: None,
            source: BookingSource::DirectWeb,
            points_earned: 1150,
        }
    }

    fn cashback_benefit(value: Decimal) -> Benefit {
        Benefit {
            id: Uuid::new_v4(),
            reward_type: RewardType::Cashback,
            value_type: ValueType::Fixed,
            value,
            cert_type: None,
            is_tie_in: false,
            sort_order: 0,
            restrictions: None,
        }
    }

    fn flat_promotion(benefits: Vec<Benefit>) -> Promotion {
        Promotion {
            id: Uuid::new_v4(),
            name: "Test promo".to_string(),
            promotion_type: PromotionType::Loyalty,
            link_id: 1,
            is_active: true,
            start_date: None,
            end_date: None,
            is_single_use: false,
            restrictions: None,
            benefits,
            tiers: Vec::new(),
        }
    }

    fn rates() -> ValuationTable {
        let mut point_values = HashMap::new();
        point_values.insert(1, dec!(0.01));
        ValuationTable {
            point_values,
            cert_values: HashMap::new(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_link_mismatch_does_not_match() {
        let promo = flat_promotion(vec![cashback_benefit(dec!(50))]);
        let mut booking = booking_on(date(2024, 3, 1), 2);
        booking.hotel_chain_id = Some(2);

        let mut ledger = UsageLedger::new();
        let matches = match_booking(&booking, &[promo], &mut ledger, &rates()).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_credit_card_promotion_matches_card_field() {
        let mut promo = flat_promotion(vec![cashback_benefit(dec!(25))]);
        promo.promotion_type = PromotionType::CreditCard;
        promo.link_id = 7;

        let mut booking = booking_on(date(2024, 3, 1), 2);
        booking.credit_card_id = Some(7);

        let mut ledger = UsageLedger::new();
        let matches = match_booking(&booking, &[promo], &mut ledger, &rates()).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].applied_value, dec!(25));
    }

    #[test]
    fn test_date_window_compares_check_in_not_creation() {
        let mut promo = flat_promotion(vec![cashback_benefit(dec!(50))]);
        promo.start_date = Some(date(2024, 3, 1));
        promo.end_date = Some(date(2024, 3, 31));

        // Created in January, checks in within the window.
        let inside = booking_on(date(2024, 3, 10), 2);
        let mut ledger = UsageLedger::new();
        assert_eq!(match_booking(&inside, &[promo.clone()], &mut ledger, &rates()).unwrap().len(), 1);

        let outside = booking_on(date(2024, 4, 2), 2);
        let mut ledger = UsageLedger::new();
        assert!(match_booking(&outside, &[promo], &mut ledger, &rates()).unwrap().is_empty());
    }

    #[test]
    fn test_payment_type_restriction_scenario() {
        // Promotion restricted to cash bookings.
        let mut promo = flat_promotion(vec![cashback_benefit(dec!(50))]);
        promo.restrictions = Some(Restriction {
            allowed_payment_types: vec![PaymentType::Cash],
            ..Default::default()
        });

        let cash = booking_on(date(2024, 3, 1), 2);
        let mut ledger = UsageLedger::new();
        assert_eq!(match_booking(&cash, &[promo.clone()], &mut ledger, &rates()).unwrap().len(), 1);

        let mut award = booking_on(date(2024, 3, 5), 2);
        award.pretax_cost = dec!(0);
        award.total_cost = dec!(0);
        award.cash_paid = dec!(0);
        award.points_redeemed = 10_000;
        let mut ledger = UsageLedger::new();
        assert!(match_booking(&award, &[promo], &mut ledger, &rates()).unwrap().is_empty());
    }

    #[test]
    fn test_redemption_cap_across_sequence() {
        // $50 flat cashback capped at $100 over the promotion's lifetime.
        let mut promo = flat_promotion(vec![cashback_benefit(dec!(50))]);
        promo.restrictions = Some(Restriction {
            max_redemption_value: Some(dec!(100)),
            ..Default::default()
        });

        let bookings = vec![
            booking_on(date(2024, 1, 10), 2),
            booking_on(date(2024, 2, 10), 2),
            booking_on(date(2024, 3, 10), 2),
        ];
        let results = evaluate_sequence(&bookings, &[promo.clone()], &rates()).unwrap();
        let values: Vec<Decimal> = results
            .iter()
            .map(|r| r.matches[0].applied_value)
            .collect();
        assert_eq!(values, vec![dec!(50), dec!(50), dec!(0)]);

        // The capped-out third stay is still matched, just not valued.
        assert_eq!(results[2].matches.len(), 1);
        assert!(!results[2].matches[0].benefits[0].valued);

        // Deleting the first booking frees budget for the third.
        let remaining = vec![bookings[1].clone(), bookings[2].clone()];
        let results = evaluate_sequence(&remaining, &[promo], &rates()).unwrap();
        let values: Vec<Decimal> = results
            .iter()
            .map(|r| r.matches[0].applied_value)
            .collect();
        assert_eq!(values, vec![dec!(50), dec!(50)]);
    }

    #[test]
    fn test_same_day_sibling_regains_budget_and_is_in_cascade_scope() {
        use crate::promotions::cascade::{resolve_targets, ReevaluationScope};

        let mut promo = flat_promotion(vec![cashback_benefit(dec!(50))]);
        promo.restrictions = Some(Restriction {
            max_redemption_value: Some(dec!(50)),
            ..Default::default()
        });

        // Two stays on the same date, ordered by creation time.
        let mut first = booking_on(date(2024, 3, 10), 2);
        first.created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut sibling = booking_on(date(2024, 3, 10), 2);
        sibling.created_at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

        let results = evaluate_sequence(
            &[first.clone(), sibling.clone()],
            &[promo.clone()],
            &rates(),
        )
        .unwrap();
        assert_eq!(results[0].booking_id, first.id);
        assert_eq!(results[0].matches[0].applied_value, dec!(50));
        assert_eq!(results[1].matches[0].applied_value, dec!(0));

        // Deleting the first stay frees the budget for its same-day sibling.
        let results = evaluate_sequence(&[sibling.clone()], &[promo], &rates()).unwrap();
        assert_eq!(results[0].matches[0].applied_value, dec!(50));

        // The sibling must be rewritten by a cascade triggered on that date.
        let targets = resolve_targets(
            &ReevaluationScope::After(first.check_in),
            &[sibling.clone()],
        );
        assert!(targets.contains(&sibling.id));
    }

    #[test]
    fn test_tier_ordinal_selection() {
        // Tier 1: first stay pays $50; tier 2: every later stay pays $75.
        let mut promo = flat_promotion(Vec::new());
        promo.tiers = vec![
            Tier {
                id: Uuid::new_v4(),
                min_stays: 1,
                max_stays: Some(1),
                min_nights: None,
                max_nights: None,
                sort_order: 0,
                benefits: vec![cashback_benefit(dec!(50))],
            },
            Tier {
                id: Uuid::new_v4(),
                min_stays: 2,
                max_stays: None,
                min_nights: None,
                max_nights: None,
                sort_order: 1,
                benefits: vec![cashback_benefit(dec!(75))],
            },
        ];

        // Created out of order: the later stay was created first. Only
        // check-in order decides tier ordinals.
        let mut first_stay = booking_on(date(2024, 1, 5), 2);
        first_stay.created_at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let mut second_stay = booking_on(date(2024, 2, 5), 2);
        second_stay.created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let results = evaluate_sequence(
            &[second_stay.clone(), first_stay.clone()],
            &[promo],
            &rates(),
        )
        .unwrap();
        assert_eq!(results[0].booking_id, first_stay.id);
        assert_eq!(results[0].matches[0].applied_value, dec!(50));
        assert_eq!(results[1].booking_id, second_stay.id);
        assert_eq!(results[1].matches[0].applied_value, dec!(75));
    }

    #[test]
    fn test_no_matching_tier_still_emits_qualifying_row() {
        let mut promo = flat_promotion(Vec::new());
        promo.tiers = vec![Tier {
            id: Uuid::new_v4(),
            min_stays: 3,
            max_stays: None,
            min_nights: None,
            max_nights: None,
            sort_order: 0,
            benefits: vec![cashback_benefit(dec!(100))],
        }];

        let bookings = vec![
            booking_on(date(2024, 1, 5), 2),
            booking_on(date(2024, 2, 5), 2),
            booking_on(date(2024, 3, 5), 2),
        ];
        let results = evaluate_sequence(&bookings, &[promo], &rates()).unwrap();

        // First two stays qualify but fall below the tier floor; the ledger
        // still advances so the third stay reaches ordinal 3.
        assert_eq!(results[0].matches[0].applied_value, dec!(0));
        assert!(results[0].matches[0].benefits.is_empty());
        assert_eq!(results[1].matches[0].applied_value, dec!(0));
        assert_eq!(results[2].matches[0].applied_value, dec!(100));
    }

    #[test]
    fn test_partial_promotion_application_with_tie_in() {
        // One unrestricted benefit plus one tie-in benefit.
        let unrestricted = cashback_benefit(dec!(30));
        let mut tie_in = cashback_benefit(dec!(20));
        tie_in.is_tie_in = true;
        tie_in.sort_order = 1;
        tie_in.restrictions = Some(Restriction {
            tie_in_credit_card_ids: vec![5],
            ..Default::default()
        });
        let unrestricted_id = unrestricted.id;
        let promo = flat_promotion(vec![unrestricted, tie_in]);

        // Booking without the tie-in card: exactly one benefit application.
        let booking = booking_on(date(2024, 3, 1), 2);
        let mut ledger = UsageLedger::new();
        let matches = match_booking(&booking, &[promo.clone()], &mut ledger, &rates()).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].benefits.len(), 1);
        assert_eq!(matches[0].benefits[0].benefit_id, unrestricted_id);
        assert_eq!(matches[0].applied_value, dec!(30));

        // With the card, both apply.
        let mut carded = booking_on(date(2024, 3, 1), 2);
        carded.credit_card_id = Some(5);
        let mut ledger = UsageLedger::new();
        let matches = match_booking(&carded, &[promo], &mut ledger, &rates()).unwrap();
        assert_eq!(matches[0].benefits.len(), 2);
        assert_eq!(matches[0].applied_value, dec!(50));
    }

    #[test]
    fn test_single_use_promotion() {
        let mut promo = flat_promotion(vec![cashback_benefit(dec!(40))]);
        promo.is_single_use = true;

        let bookings = vec![
            booking_on(date(2024, 1, 5), 2),
            booking_on(date(2024, 2, 5), 2),
        ];
        let results = evaluate_sequence(&bookings, &[promo], &rates()).unwrap();
        assert_eq!(results[0].matches[0].applied_value, dec!(40));
        // Second stay is matched with zero value, never silently dropped.
        assert_eq!(results[1].matches.len(), 1);
        assert_eq!(results[1].matches[0].applied_value, dec!(0));
    }

    #[test]
    fn test_once_per_sub_brand() {
        let mut promo = flat_promotion(vec![cashback_benefit(dec!(25))]);
        promo.restrictions = Some(Restriction {
            once_per_sub_brand: true,
            ..Default::default()
        });

        let mut first = booking_on(date(2024, 1, 5), 2);
        first.sub_brand_id = Some(10);
        let mut repeat = booking_on(date(2024, 2, 5), 2);
        repeat.sub_brand_id = Some(10);
        let mut other_brand = booking_on(date(2024, 3, 5), 2);
        other_brand.sub_brand_id = Some(11);

        let results = evaluate_sequence(&[first, repeat, other_brand], &[promo], &rates()).unwrap();
        assert_eq!(results[0].matches[0].applied_value, dec!(25));
        assert_eq!(results[1].matches[0].applied_value, dec!(0));
        assert_eq!(results[2].matches[0].applied_value, dec!(25));
    }

    #[test]
    fn test_bonus_point_cap_caps_points_and_derives_value() {
        let points_benefit = Benefit {
            id: Uuid::new_v4(),
            reward_type: RewardType::Points,
            value_type: ValueType::Fixed,
            value: dec!(6000),
            cert_type: None,
            is_tie_in: false,
            sort_order: 0,
            restrictions: None,
        };
        let mut promo = flat_promotion(vec![points_benefit]);
        promo.restrictions = Some(Restriction {
            max_total_bonus_points: Some(10_000),
            ..Default::default()
        });

        let bookings = vec![
            booking_on(date(2024, 1, 5), 2),
            booking_on(date(2024, 2, 5), 2),
        ];
        let results = evaluate_sequence(&bookings, &[promo], &rates()).unwrap();
        assert_eq!(results[0].matches[0].bonus_points, 6000);
        assert_eq!(results[0].matches[0].applied_value, dec!(60));
        // Only 4,000 points of budget remain; value follows the capped points.
        assert_eq!(results[1].matches[0].bonus_points, 4000);
        assert_eq!(results[1].matches[0].applied_value, dec!(40));
    }

    #[test]
    fn test_span_stay_proration_across_bookings() {
        // $90 for every 6 eligible nights, prorated per stay.
        let mut promo = flat_promotion(vec![cashback_benefit(dec!(90))]);
        promo.restrictions = Some(Restriction {
            min_nights_required: Some(6),
            span_stays: true,
            nights_stackable: true,
            ..Default::default()
        });

        let bookings = vec![
            booking_on(date(2024, 1, 5), 2),
            booking_on(date(2024, 2, 5), 3),
            booking_on(date(2024, 3, 5), 4),
        ];
        let results = evaluate_sequence(&bookings, &[promo], &rates()).unwrap();
        assert_eq!(results[0].matches[0].applied_value, dec!(30));
        assert_eq!(results[1].matches[0].applied_value, dec!(45));
        assert_eq!(results[2].matches[0].applied_value, dec!(60));
    }

    #[test]
    fn test_benefit_level_span_stay_prorates() {
        // Proration attached to the benefit itself, with no promotion-level
        // restriction contributing a factor.
        let mut benefit = cashback_benefit(dec!(90));
        benefit.restrictions = Some(Restriction {
            min_nights_required: Some(6),
            span_stays: true,
            nights_stackable: true,
            ..Default::default()
        });
        let promo = flat_promotion(vec![benefit]);

        let bookings = vec![
            booking_on(date(2024, 1, 5), 2),
            booking_on(date(2024, 2, 5), 3),
            booking_on(date(2024, 3, 5), 4),
        ];
        let results = evaluate_sequence(&bookings, &[promo], &rates()).unwrap();
        assert_eq!(results[0].matches[0].applied_value, dec!(30));
        assert_eq!(results[1].matches[0].applied_value, dec!(45));
        assert_eq!(results[2].matches[0].applied_value, dec!(60));
    }

    #[test]
    fn test_invalid_promotion_is_skipped_not_fatal() {
        // One broken definition (benefits and tiers both populated) next to a
        // healthy one.
        let mut broken = flat_promotion(vec![cashback_benefit(dec!(10))]);
        broken.tiers = vec![Tier {
            id: Uuid::new_v4(),
            min_stays: 1,
            max_stays: None,
            min_nights: None,
            max_nights: None,
            sort_order: 0,
            benefits: vec![cashback_benefit(dec!(10))],
        }];
        let healthy = flat_promotion(vec![cashback_benefit(dec!(50))]);
        let healthy_id = healthy.id;

        let booking = booking_on(date(2024, 3, 1), 2);
        let mut ledger = UsageLedger::new();
        let matches = match_booking(&booking, &[broken, healthy], &mut ledger, &rates()).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].promotion_id, healthy_id);
    }

    #[test]
    fn test_inactive_promotion_never_matches() {
        let mut promo = flat_promotion(vec![cashback_benefit(dec!(50))]);
        promo.is_active = false;
        let booking = booking_on(date(2024, 3, 1), 2);
        let mut ledger = UsageLedger::new();
        assert!(match_booking(&booking, &[promo], &mut ledger, &rates()).unwrap().is_empty());
    }

    #[test]
    fn test_eligible_nights_accumulate_on_rows() {
        let promo = flat_promotion(vec![cashback_benefit(dec!(5))]);
        let bookings = vec![
            booking_on(date(2024, 1, 5), 2),
            booking_on(date(2024, 2, 5), 3),
        ];
        let results = evaluate_sequence(&bookings, &[promo], &rates()).unwrap();
        assert_eq!(results[0].matches[0].eligible_nights_at_booking, 2);
        assert_eq!(results[1].matches[0].eligible_nights_at_booking, 5);
    }

    #[test]
    fn test_idempotence_of_sequence_evaluation() {
        let mut promo = flat_promotion(vec![cashback_benefit(dec!(50))]);
        promo.restrictions = Some(Restriction {
            max_redemption_value: Some(dec!(120)),
            ..Default::default()
        });

        let bookings: Vec<_> = (0..5)
            .map(|i| booking_on(date(2024, 1, 5 + i), 2))
            .collect();

        let first = evaluate_sequence(&bookings, &[promo.clone()], &rates()).unwrap();
        let second = evaluate_sequence(&bookings, &[promo], &rates()).unwrap();
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.booking_id, b.booking_id);
            assert_eq!(a.matches, b.matches);
        }
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::promotions::types::{BookingSource, PromotionType, RewardType, ValueType};
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn booking(day_offset: i64, nights: i32, cost: i64) -> BookingSnapshot {
        let check_in = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(day_offset);
        BookingSnapshot {
            id: Uuid::new_v4(),
            check_in,
            check_out: check_in + Duration::days(nights as i64),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            nights,
            pretax_cost: Decimal::from(cost),
            total_cost: Decimal::from(cost),
            cash_paid: Decimal::from(cost),
            points_redeemed: 0,
            certificates_used: 0,
            hotel_chain_id: Some(1),
            sub_brand_id: None,
            credit_card_id: None,
            shopping_portal_id: None,
            source: BookingSource::DirectWeb,
            points_earned: cost * 10,
        }
    }

    fn capped_promotion(cap: Decimal, payout: Decimal) -> Promotion {
        Promotion {
            id: Uuid::new_v4(),
            name: "capped".to_string(),
            promotion_type: PromotionType::Loyalty,
            link_id: 1,
            is_active: true,
            start_date: None,
            end_date: None,
            is_single_use: false,
            restrictions: Some(Restriction {
                max_redemption_value: Some(cap),
                ..Default::default()
            }),
            benefits: vec![Benefit {
                id: Uuid::new_v4(),
                reward_type: RewardType::Cashback,
                value_type: ValueType::Fixed,
                value: payout,
                cert_type: None,
                is_tie_in: false,
                sort_order: 0,
                restrictions: None,
            }],
            tiers: Vec::new(),
        }
    }

    proptest! {
        // The sum of applied values for a capped promotion never exceeds the
        // cap, for any number of stays in any chronological arrangement.
        #[test]
        fn prop_redemption_cap_never_exceeded(
            stay_count in 1usize..12,
            payout in 1i64..200,
            cap in 1i64..500,
        ) {
            let promo = capped_promotion(Decimal::from(cap), Decimal::from(payout));
            let bookings: Vec<_> = (0..stay_count)
                .map(|i| booking(i as i64 * 7, 2, 100))
                .collect();
            let results = evaluate_sequence(&bookings, &[promo], &rates_one_cent()).unwrap();
            let total: Decimal = results
                .iter()
                .flat_map(|r| r.matches.iter())
                .map(|m| m.applied_value)
                .sum();
            prop_assert!(total <= Decimal::from(cap));

            // Every stay is matched; capped stays carry zero value.
            prop_assert!(results.iter().all(|r| r.matches.len() == 1));
        }

        // Adding a later stay never changes what earlier stays were granted.
        #[test]
        fn prop_cap_consumption_is_monotone(
            stay_count in 2usize..10,
            payout in 1i64..100,
        ) {
            let promo = capped_promotion(dec!(250), Decimal::from(payout));
            let bookings: Vec<_> = (0..stay_count)
                .map(|i| booking(i as i64 * 7, 2, 100))
                .collect();

            let shorter = evaluate_sequence(&bookings[..stay_count - 1], &[promo.clone()], &rates_one_cent()).unwrap();
            let longer = evaluate_sequence(&bookings, &[promo], &rates_one_cent()).unwrap();
            for (a, b) in shorter.iter().zip(longer.iter()) {
                prop_assert_eq!(a.booking_id, b.booking_id);
                prop_assert_eq!(&a.matches, &b.matches);
            }
        }
    }

    fn rates_one_cent() -> ValuationTable {
        let mut point_values = std::collections::HashMap::new();
        point_values.insert(1, dec!(0.01));
        ValuationTable {
            point_values,
            cert_values: std::collections::HashMap::new(),
        }
    }
}
