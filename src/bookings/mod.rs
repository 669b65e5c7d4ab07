// Bookings Module
//
// Stores hotel stay records and drives the promotion engine: every create,
// update, or delete re-matches the touched booking and kicks off a background
// re-evaluation of later bookings whose shared budgets may have moved.

pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;

pub use error::BookingError;
pub use models::{Booking, BookingResponse, CreateBooking, UpdateBooking};
pub use repository::BookingsRepository;
pub use service::BookingService;
