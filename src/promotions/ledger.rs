// Usage Ledger & cap application
//
// One ledger instance is built per re-evaluation run and threaded through the
// whole batch in check-in order. It is the only mutable state in the engine:
// per-promotion qualifying-stay counts, cumulative eligible nights, dollar
// value granted, and bonus points granted. All caps use remaining-budget
// semantics against these counters.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::promotions::valuation::RawBenefitValue;

/// Running totals for one promotion across chronological time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromotionUsage {
    /// Number of qualifying stays so far (promotion-level gate passed,
    /// regardless of value granted)
    pub stay_count: u32,
    /// Cumulative eligible nights across qualifying stays
    pub eligible_nights: i32,
    /// Total dollar value granted so far
    pub value_granted: Decimal,
    /// Total bonus points granted so far
    pub points_granted: i64,
}

/// In-memory usage ledger for one evaluation pass
///
/// Arena-style: seeded from history, mutated stay by stay, discarded after
/// the run. Never shared between runs.
#[derive(Debug, Default)]
pub struct UsageLedger {
    usage: HashMap<Uuid, PromotionUsage>,
    sub_brand_grants: HashSet<(Uuid, i32)>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counters for a promotion; zeroed when never seen
    pub fn usage(&self, promotion_id: Uuid) -> PromotionUsage {
        self.usage.get(&promotion_id).cloned().unwrap_or_default()
    }

    /// Record a qualifying stay: the promotion-level gate passed for this
    /// booking, whether or not any value survived the caps
    pub fn record_qualifying_stay(&mut self, promotion_id: Uuid, nights: i32) {
        let entry = self.usage.entry(promotion_id).or_default();
        entry.stay_count += 1;
        entry.eligible_nights += nights.max(0);
    }

    /// Record granted value and points for a promotion
    pub fn record_grant(&mut self, promotion_id: Uuid, value: Decimal, points: i64) {
        let entry = self.usage.entry(promotion_id).or_default();
        entry.value_granted += value;
        entry.points_granted += points;
    }

    /// Record that a once-per-sub-brand reward was consumed
    pub fn record_sub_brand_grant(&mut self, promotion_id: Uuid, sub_brand_id: i32) {
        self.sub_brand_grants.insert((promotion_id, sub_brand_id));
    }

    pub fn has_sub_brand_grant(&self, promotion_id: Uuid, sub_brand_id: i32) -> bool {
        self.sub_brand_grants.contains(&(promotion_id, sub_brand_id))
    }
}

/// Effective cap set for one benefit, merged across restriction levels
///
/// Promotion-level and benefit-level caps merge by taking the tighter value;
/// `isSingleUse` contributes a lifetime reward count of 1.
#[derive(Debug, Clone, Default)]
pub struct CapSet {
    pub max_stay_count: Option<u32>,
    pub max_reward_count: Option<u32>,
    pub max_redemption_value: Option<Decimal>,
    pub max_total_bonus_points: Option<i64>,
}

/// A benefit grant after cap application
///
/// `valued` is deliberately separate from "matched": a fully capped benefit
/// is still matched, it just carries zero value.
#[derive(Debug, Clone, PartialEq)]
pub struct CappedGrant {
    pub value: Decimal,
    pub points: i64,
    pub eqns: i32,
    pub certificates: i32,
    pub valued: bool,
}

impl CappedGrant {
    fn zeroed() -> Self {
        Self {
            value: Decimal::ZERO,
            points: 0,
            eqns: 0,
            certificates: 0,
            valued: false,
        }
    }
}

fn tighter<T: Ord + Copy>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (x, None) => x,
        (None, y) => y,
    }
}

impl CapSet {
    /// Merge caps from the restriction levels that gate one benefit
    pub fn merge(levels: &[Option<&crate::promotions::restrictions::Restriction>], single_use: bool) -> Self {
        let mut caps = CapSet::default();
        for restriction in levels.iter().flatten() {
            caps.max_stay_count = tighter(caps.max_stay_count, restriction.max_stay_count);
            caps.max_reward_count = tighter(caps.max_reward_count, restriction.max_reward_count);
            caps.max_redemption_value =
                tighter(caps.max_redemption_value, restriction.max_redemption_value);
            caps.max_total_bonus_points =
                tighter(caps.max_total_bonus_points, restriction.max_total_bonus_points);
        }
        if single_use {
            caps.max_reward_count = tighter(caps.max_reward_count, Some(1));
        }
        caps
    }

    /// Apply remaining-budget semantics to a raw benefit value
    ///
    /// `stay_ordinal` is this booking's 1-based qualifying-stay index for the
    /// promotion. `point_rate` is the per-point cash value, used to re-derive
    /// dollar value when the point cap bites. `sub_brand_spent` marks a
    /// once-per-sub-brand reward that was already consumed.
    pub fn apply(
        &self,
        raw: &RawBenefitValue,
        stay_ordinal: u32,
        usage: &PromotionUsage,
        point_rate: Option<Decimal>,
        sub_brand_spent: bool,
    ) -> CappedGrant {
        // Stay-count style caps deny all value once the ordinal passes the
        // budget; the stay is still recorded as matched by the caller.
        let stay_budget = tighter(self.max_stay_count, self.max_reward_count);
        if let Some(budget) = stay_budget {
            if stay_ordinal > budget {
                return CappedGrant::zeroed();
            }
        }
        if sub_brand_spent {
            return CappedGrant::zeroed();
        }

        let mut value = raw.value;
        let mut points = raw.points;

        if let Some(cap) = self.max_total_bonus_points {
            let remaining = (cap - usage.points_granted).max(0);
            if points > remaining {
                points = remaining;
                // Dollar value is derived from the capped point amount.
                if let Some(rate) = point_rate {
                    value = Decimal::from(points) * rate;
                }
            }
        }

        if let Some(cap) = self.max_redemption_value {
            let remaining = (cap - usage.value_granted).max(Decimal::ZERO);
            value = value.min(remaining);
        }

        let valued =
            value > Decimal::ZERO || points > 0 || raw.eqns > 0 || raw.certificates > 0;
        CappedGrant {
            value,
            points,
            eqns: raw.eqns,
            certificates: raw.certificates,
            valued,
        }
    }
}

/// Truncate a prorated decimal point amount back to whole points
pub fn whole_points(points: Decimal) -> i64 {
    points.trunc().to_i64().unwrap_or(0)
}
