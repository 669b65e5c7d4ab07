// Promotion Engine Module
//
// Matches hotel bookings against a catalog of loyalty, credit card, and
// shopping portal promotions, values the matched benefits in dollars, and
// keeps every applied record consistent as bookings change. It manages five
// core capabilities:
// - Restriction evaluation: Gate promotions and benefits on booking facts
// - Benefit valuation: Convert points, certificates, and cashback to dollars
// - Usage tracking: Re-derive per-promotion budgets from chronological history
// - Matching: Produce capped benefit applications per booking
// - Cascading re-evaluation: Rewrite later bookings when history shifts
//
// Promotion definitions are data in PostgreSQL and change without deployments.

pub mod cascade;
pub mod catalog;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod matching;
pub mod repository;
pub mod restrictions;
pub mod types;
pub mod valuation;

// Re-export commonly used types for convenience
pub use cascade::{resolve_targets, ReevaluationScope};
pub use catalog::{Benefit, Promotion, PromotionCatalog, Tier, ValuationTable};
pub use error::{PromoResult, PromotionError};
pub use ledger::{CapSet, PromotionUsage, UsageLedger};
pub use matching::{
    evaluate_sequence, match_booking, BookingEvaluation, MatchedBenefit, MatchedPromotion,
};
pub use repository::{AppliedBenefit, AppliedPromotion, AppliedPromotionsRepository};
pub use restrictions::{Restriction, RestrictionOutcome};
pub use types::{
    BookingSnapshot, BookingSource, PaymentType, PromotionType, RewardType, ValueType,
};
pub use valuation::{value_benefit, RawBenefitValue};

// Promotion Engine - Orchestrator
//
// Wraps the pure matching core with catalog loading, booking snapshots, and
// persistence, and serializes evaluation runs.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Promotion Engine
///
/// Every run replays the full booking history in chronological order with a
/// fresh usage ledger, then rewrites the engine-owned rows of the bookings in
/// scope. Runs are serialized by a lock so concurrent mutations cannot
/// interleave ledger state.
#[derive(Clone)]
pub struct PromotionEngine {
    pool: PgPool,
    applied: AppliedPromotionsRepository,
    catalog: Arc<PromotionCatalog>,
    run_lock: Arc<Mutex<()>>,
}

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    id: Uuid,
    check_in: NaiveDate,
    check_out: NaiveDate,
    created_at: DateTime<Utc>,
    pretax_cost: Decimal,
    total_cost: Decimal,
    cash_paid: Decimal,
    points_redeemed: i64,
    certificates_used: i32,
    hotel_chain_id: Option<i32>,
    sub_brand_id: Option<i32>,
    credit_card_id: Option<i32>,
    shopping_portal_id: Option<i32>,
    source: BookingSource,
    points_earned: i64,
}

impl SnapshotRow {
    fn into_snapshot(self) -> BookingSnapshot {
        BookingSnapshot {
            nights: (self.check_out - self.check_in).num_days() as i32,
            id: self.id,
            check_in: self.check_in,
            check_out: self.check_out,
            created_at: self.created_at,
            pretax_cost: self.pretax_cost,
            total_cost: self.total_cost,
            cash_paid: self.cash_paid,
            points_redeemed: self.points_redeemed,
            certificates_used: self.certificates_used,
            hotel_chain_id: self.hotel_chain_id,
            sub_brand_id: self.sub_brand_id,
            credit_card_id: self.credit_card_id,
            shopping_portal_id: self.shopping_portal_id,
            source: self.source,
            points_earned: self.points_earned,
        }
    }
}

impl PromotionEngine {
    /// Create a new PromotionEngine
    pub fn new(pool: PgPool) -> Self {
        Self {
            applied: AppliedPromotionsRepository::new(pool.clone()),
            catalog: Arc::new(PromotionCatalog::new(pool.clone())),
            run_lock: Arc::new(Mutex::new(())),
            pool,
        }
    }

    /// Pre-load the promotion catalog cache
    pub async fn warm_cache(&self) -> PromoResult<()> {
        let promotions = self.catalog.active_promotions().await?;
        tracing::info!("Promotion catalog warmed: {} active promotions", promotions.len());
        Ok(())
    }

    /// Force the catalog to reload on the next run
    pub async fn invalidate_catalog(&self) {
        self.catalog.invalidate().await;
    }

    /// Match one booking and return its persisted applied promotions
    pub async fn match_for_booking(&self, booking_id: Uuid) -> PromoResult<Vec<AppliedPromotion>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM bookings WHERE id = $1)")
            .bind(booking_id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(PromotionError::NotFound {
                resource: "Booking",
                id: booking_id.to_string(),
            });
        }

        let mut ids = HashSet::new();
        ids.insert(booking_id);
        self.run(ReevaluationScope::Bookings(ids)).await?;

        self.applied.find_by_booking(booking_id).await
    }

    /// Re-evaluate an explicit set of bookings
    pub async fn reevaluate(&self, booking_ids: Vec<Uuid>) -> PromoResult<usize> {
        self.run(ReevaluationScope::Bookings(booking_ids.into_iter().collect()))
            .await
    }

    /// Re-evaluate every booking checking in on or after a date
    pub async fn reevaluate_after(&self, date: NaiveDate) -> PromoResult<usize> {
        self.run(ReevaluationScope::After(date)).await
    }

    /// Re-evaluate every booking
    pub async fn reevaluate_all(&self) -> PromoResult<usize> {
        self.run(ReevaluationScope::All).await
    }

    /// Re-evaluate the bookings carrying a promotion whose definition changed
    ///
    /// A qualifying stay always carries a row, valued or not, so the carrying
    /// set covers everything the promotion can have influenced.
    pub async fn reevaluate_promotion(&self, promotion_id: Uuid) -> PromoResult<usize> {
        self.catalog.invalidate().await;
        let ids = self
            .applied
            .booking_ids_carrying(&[promotion_id], NaiveDate::MIN)
            .await?;
        self.run(ReevaluationScope::Carrying(ids.into_iter().collect()))
            .await
    }

    /// Applied promotions for a booking, with their benefit applications
    pub async fn applied_with_benefits(
        &self,
        booking_id: Uuid,
    ) -> PromoResult<Vec<(AppliedPromotion, Vec<AppliedBenefit>)>> {
        let rows = self.applied.find_by_booking(booking_id).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let benefits = self.applied.find_benefits(row.id).await?;
            out.push((row, benefits));
        }
        Ok(out)
    }

    /// Replay the full history and rewrite the rows of the bookings in scope
    async fn run(&self, scope: ReevaluationScope) -> PromoResult<usize> {
        let _guard = self.run_lock.lock().await;

        let promotions = self.catalog.active_promotions().await?;
        let rates = self.catalog.valuation().await?;
        let snapshots = self.load_snapshots().await?;

        let targets = resolve_targets(&scope, &snapshots);
        if targets.is_empty() {
            return Ok(0);
        }

        let results = evaluate_sequence(&snapshots, &promotions, &rates)?;

        let mut rewritten = 0;
        for result in results {
            if !targets.contains(&result.booking_id) {
                continue;
            }
            self.applied
                .replace_auto_applied(result.booking_id, &result.matches)
                .await?;
            rewritten += 1;
        }

        tracing::debug!("Re-evaluation rewrote {} bookings", rewritten);
        Ok(rewritten)
    }

    async fn load_snapshots(&self) -> PromoResult<Vec<BookingSnapshot>> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT id, check_in, check_out, created_at, pretax_cost, total_cost,
                   cash_paid, points_redeemed, certificates_used, hotel_chain_id,
                   sub_brand_id, credit_card_id, shopping_portal_id, source, points_earned
            FROM bookings
            ORDER BY check_in, created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SnapshotRow::into_snapshot).collect())
    }
}
