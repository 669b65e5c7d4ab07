use std::sync::Arc;

use uuid::Uuid;

use crate::bookings::error::BookingError;
use crate::bookings::models::{Booking, CreateBooking, UpdateBooking};
use crate::bookings::repository::BookingsRepository;
use crate::promotions::{AppliedPromotion, PromotionEngine};

/// Service for booking operations
///
/// Every mutation triggers promotion matching for the touched booking and a
/// background re-evaluation of bookings from the affected stay date onward
/// (inclusive, since same-day stays share that date's budget ordering).
#[derive(Clone)]
pub struct BookingService {
    repo: BookingsRepository,
    engine: Arc<PromotionEngine>,
}

impl BookingService {
    /// Create a new BookingService
    pub fn new(repo: BookingsRepository, engine: Arc<PromotionEngine>) -> Self {
        Self { repo, engine }
    }

    /// Create a booking and match it against the active promotion catalog
    pub async fn create_booking(
        &self,
        payload: CreateBooking,
    ) -> Result<(Booking, Vec<AppliedPromotion>), BookingError> {
        if payload.check_out <= payload.check_in {
            return Err(BookingError::Validation(
                "check_out must be after check_in".to_string(),
            ));
        }

        let booking = self.repo.create(&payload).await?;
        tracing::info!("Created booking {} at {}", booking.id, booking.hotel_name);

        let applied = self.engine.match_for_booking(booking.id).await?;

        // A booking that matched nothing consumed no budgets and advanced no
        // stay counters, so later bookings are unaffected.
        if !applied.is_empty() {
            self.spawn_cascade(booking.check_in);
        }

        Ok((booking, applied))
    }

    /// Get a booking by ID
    pub async fn get_booking(&self, id: Uuid) -> Result<Booking, BookingError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(BookingError::NotFound(id))
    }

    /// List all bookings in chronological stay order
    pub async fn list_bookings(&self) -> Result<Vec<Booking>, BookingError> {
        self.repo.find_all().await
    }

    /// Update a booking and re-match it
    pub async fn update_booking(
        &self,
        id: Uuid,
        payload: UpdateBooking,
    ) -> Result<(Booking, Vec<AppliedPromotion>), BookingError> {
        let existing = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(BookingError::NotFound(id))?;

        let check_in = payload.check_in.unwrap_or(existing.check_in);
        let check_out = payload.check_out.unwrap_or(existing.check_out);
        if check_out <= check_in {
            return Err(BookingError::Validation(
                "check_out must be after check_in".to_string(),
            ));
        }

        let booking = self.repo.update(id, &payload).await?;
        tracing::info!("Updated booking {}", booking.id);

        let applied = self.engine.match_for_booking(booking.id).await?;

        // Cascade from the earlier of the old and new stay dates; moving a
        // booking affects the ledger at both positions.
        self.spawn_cascade(existing.check_in.min(booking.check_in));

        Ok((booking, applied))
    }

    /// Delete a booking and release whatever it consumed
    pub async fn delete_booking(&self, id: Uuid) -> Result<(), BookingError> {
        let booking = self.repo.delete(id).await?;
        tracing::info!("Deleted booking {}", id);

        self.spawn_cascade(booking.check_in);

        Ok(())
    }

    fn spawn_cascade(&self, from: chrono::NaiveDate) {
        let engine = self.engine.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.reevaluate_after(from).await {
                tracing::error!("Background re-evaluation after {} failed: {}", from, e);
            }
        });
    }
}
