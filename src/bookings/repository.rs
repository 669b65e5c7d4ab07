use sqlx::PgPool;
use uuid::Uuid;

use crate::bookings::error::BookingError;
use crate::bookings::models::{Booking, CreateBooking, UpdateBooking};

const BOOKING_COLUMNS: &str = "id, hotel_name, check_in, check_out, pretax_cost, total_cost, \
     cash_paid, points_redeemed, certificates_used, hotel_chain_id, sub_brand_id, \
     credit_card_id, shopping_portal_id, source, points_earned, created_at, updated_at";

/// Repository for booking records
#[derive(Clone)]
pub struct BookingsRepository {
    pool: PgPool,
}

impl BookingsRepository {
    /// Create a new BookingsRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new booking
    pub async fn create(&self, payload: &CreateBooking) -> Result<Booking, BookingError> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            INSERT INTO bookings
                (hotel_name, check_in, check_out, pretax_cost, total_cost, cash_paid,
                 points_redeemed, certificates_used, hotel_chain_id, sub_brand_id,
                 credit_card_id, shopping_portal_id, source, points_earned)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(&payload.hotel_name)
        .bind(payload.check_in)
        .bind(payload.check_out)
        .bind(payload.pretax_cost)
        .bind(payload.total_cost)
        .bind(payload.cash_paid)
        .bind(payload.points_redeemed)
        .bind(payload.certificates_used)
        .bind(payload.hotel_chain_id)
        .bind(payload.sub_brand_id)
        .bind(payload.credit_card_id)
        .bind(payload.shopping_portal_id)
        .bind(payload.source)
        .bind(payload.points_earned)
        .fetch_one(&self.pool)
        .await?;

        Ok(booking)
    }

    /// Find a booking by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>, BookingError> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    /// Find all bookings in chronological stay order
    pub async fn find_all(&self) -> Result<Vec<Booking>, BookingError> {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY check_in, created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    /// Update a booking, keeping existing values for omitted fields
    pub async fn update(
        &self,
        id: Uuid,
        payload: &UpdateBooking,
    ) -> Result<Booking, BookingError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(BookingError::NotFound(id))?;

        let booking = sqlx::query_as::<_, Booking>(&format!(
            r#"
            UPDATE bookings
            SET hotel_name = $1,
                check_in = $2,
                check_out = $3,
                pretax_cost = $4,
                total_cost = $5,
                cash_paid = $6,
                points_redeemed = $7,
                certificates_used = $8,
                hotel_chain_id = $9,
                sub_brand_id = $10,
                credit_card_id = $11,
                shopping_portal_id = $12,
                source = $13,
                points_earned = $14,
                updated_at = NOW()
            WHERE id = $15
            RETURNING {BOOKING_COLUMNS}
            "#
        ))
        .bind(payload.hotel_name.clone().unwrap_or(existing.hotel_name))
        .bind(payload.check_in.unwrap_or(existing.check_in))
        .bind(payload.check_out.unwrap_or(existing.check_out))
        .bind(payload.pretax_cost.unwrap_or(existing.pretax_cost))
        .bind(payload.total_cost.unwrap_or(existing.total_cost))
        .bind(payload.cash_paid.unwrap_or(existing.cash_paid))
        .bind(payload.points_redeemed.unwrap_or(existing.points_redeemed))
        .bind(payload.certificates_used.unwrap_or(existing.certificates_used))
        .bind(payload.hotel_chain_id.or(existing.hotel_chain_id))
        .bind(payload.sub_brand_id.or(existing.sub_brand_id))
        .bind(payload.credit_card_id.or(existing.credit_card_id))
        .bind(payload.shopping_portal_id.or(existing.shopping_portal_id))
        .bind(payload.source.unwrap_or(existing.source))
        .bind(payload.points_earned.unwrap_or(existing.points_earned))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(booking)
    }

    /// Delete a booking, returning the deleted record
    ///
    /// Applied promotion rows go with it via the foreign key cascade.
    pub async fn delete(&self, id: Uuid) -> Result<Booking, BookingError> {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "DELETE FROM bookings WHERE id = $1 RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(BookingError::NotFound(id))?;

        Ok(booking)
    }
}
