use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::promotions::error::PromotionError;
use crate::promotions::matching::MatchedPromotion;

/// A persisted promotion application for one booking
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct AppliedPromotion {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub promotion_id: Uuid,
    pub applied_value: Decimal,
    pub bonus_points_applied: i64,
    pub eqns_applied: i32,
    pub eligible_nights_at_booking: i32,
    pub auto_applied: bool,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

/// A persisted benefit application under an applied promotion
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct AppliedBenefit {
    pub id: Uuid,
    pub booking_promotion_id: Uuid,
    pub benefit_id: Uuid,
    pub applied_value: Decimal,
    pub bonus_points_applied: i64,
    pub eqns_applied: i32,
    pub certificates_granted: i32,
    pub eligible_nights_at_booking: i32,
}

/// Repository for applied promotion records
///
/// Rows with auto_applied = TRUE are owned by the engine and replaced
/// wholesale on each re-evaluation; manually curated rows are left alone.
#[derive(Clone)]
pub struct AppliedPromotionsRepository {
    pool: PgPool,
}

impl AppliedPromotionsRepository {
    /// Create a new AppliedPromotionsRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Replace a booking's engine-owned rows with a fresh evaluation result
    ///
    /// Runs in one transaction so readers never observe a half-replaced
    /// booking. Deleting the parent rows cascades to benefit applications.
    pub async fn replace_auto_applied(
        &self,
        booking_id: Uuid,
        matches: &[MatchedPromotion],
    ) -> Result<(), PromotionError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM booking_promotions WHERE booking_id = $1 AND auto_applied")
            .bind(booking_id)
            .execute(&mut *tx)
            .await?;

        for matched in matches {
            let row_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO booking_promotions
                    (booking_id, promotion_id, applied_value, bonus_points_applied,
                     eqns_applied, eligible_nights_at_booking, auto_applied)
                VALUES ($1, $2, $3, $4, $5, $6, TRUE)
                RETURNING id
                "#,
            )
            .bind(booking_id)
            .bind(matched.promotion_id)
            .bind(matched.applied_value)
            .bind(matched.bonus_points)
            .bind(matched.eqns)
            .bind(matched.eligible_nights_at_booking)
            .fetch_one(&mut *tx)
            .await?;

            for benefit in &matched.benefits {
                sqlx::query(
                    r#"
                    INSERT INTO benefit_applications
                        (booking_promotion_id, benefit_id, applied_value,
                         bonus_points_applied, eqns_applied, certificates_granted,
                         eligible_nights_at_booking)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(row_id)
                .bind(benefit.benefit_id)
                .bind(benefit.applied_value)
                .bind(benefit.bonus_points)
                .bind(benefit.eqns)
                .bind(benefit.certificates)
                .bind(benefit.eligible_nights_at_booking)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        Ok(())
    }

    /// Find all applied promotions for a booking
    pub async fn find_by_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<AppliedPromotion>, PromotionError> {
        let rows = sqlx::query_as::<_, AppliedPromotion>(
            r#"
            SELECT id, booking_id, promotion_id, applied_value, bonus_points_applied,
                   eqns_applied, eligible_nights_at_booking, auto_applied, verified, created_at
            FROM booking_promotions
            WHERE booking_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Find the benefit applications under one applied promotion
    pub async fn find_benefits(
        &self,
        booking_promotion_id: Uuid,
    ) -> Result<Vec<AppliedBenefit>, PromotionError> {
        let rows = sqlx::query_as::<_, AppliedBenefit>(
            r#"
            SELECT id, booking_promotion_id, benefit_id, applied_value,
                   bonus_points_applied, eqns_applied, certificates_granted,
                   eligible_nights_at_booking
            FROM benefit_applications
            WHERE booking_promotion_id = $1
            ORDER BY id
            "#,
        )
        .bind(booking_promotion_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Bookings checking in on or after a date that carry any of the given
    /// promotions
    pub async fn booking_ids_carrying(
        &self,
        promotion_ids: &[Uuid],
        after: NaiveDate,
    ) -> Result<Vec<Uuid>, PromotionError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT bp.booking_id
            FROM booking_promotions bp
            JOIN bookings b ON b.id = bp.booking_id
            WHERE bp.promotion_id = ANY($1) AND b.check_in >= $2
            "#,
        )
        .bind(promotion_ids)
        .bind(after)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
