// HTTP handlers for booking endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::bookings::{Booking, BookingError, BookingResponse, CreateBooking, UpdateBooking};

/// Handler for POST /api/bookings
/// Creates a booking and matches it against the active promotion catalog
#[utoipa::path(
    post,
    path = "/api/bookings",
    request_body = CreateBooking,
    responses(
        (status = 201, description = "Booking created and matched", body = BookingResponse),
        (status = 400, description = "Invalid input data", body = String, example = json!({"error": "check_out must be after check_in"})),
        (status = 500, description = "Internal server error", body = String, example = json!({"error": "Internal server error"}))
    ),
    tag = "bookings"
)]
pub async fn create_booking_handler(
    State(state): State<crate::AppState>,
    Json(payload): Json<CreateBooking>,
) -> Result<(StatusCode, Json<BookingResponse>), BookingError> {
    payload
        .validate()
        .map_err(|e| BookingError::Validation(e.to_string()))?;

    let (booking, promotions) = state.booking_service.create_booking(payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse {
            booking,
            promotions,
        }),
    ))
}

/// Handler for GET /api/bookings
/// Lists all bookings in chronological stay order
#[utoipa::path(
    get,
    path = "/api/bookings",
    responses(
        (status = 200, description = "List of all bookings", body = Vec<Booking>),
        (status = 500, description = "Internal server error", body = String, example = json!({"error": "Internal server error"}))
    ),
    tag = "bookings"
)]
pub async fn list_bookings_handler(
    State(state): State<crate::AppState>,
) -> Result<Json<Vec<Booking>>, BookingError> {
    let bookings = state.booking_service.list_bookings().await?;
    Ok(Json(bookings))
}

/// Handler for GET /api/bookings/{id}
#[utoipa::path(
    get,
    path = "/api/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking found", body = Booking),
        (status = 404, description = "Booking not found", body = String, example = json!({"error": "Booking not found"}))
    ),
    tag = "bookings"
)]
pub async fn get_booking_handler(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, BookingError> {
    let booking = state.booking_service.get_booking(id).await?;
    Ok(Json(booking))
}

/// Handler for PUT /api/bookings/{id}
/// Updates a booking and re-matches it; later bookings are re-evaluated in
/// the background
#[utoipa::path(
    put,
    path = "/api/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body = UpdateBooking,
    responses(
        (status = 200, description = "Booking updated and re-matched", body = BookingResponse),
        (status = 400, description = "Invalid input data", body = String, example = json!({"error": "check_out must be after check_in"})),
        (status = 404, description = "Booking not found", body = String, example = json!({"error": "Booking not found"}))
    ),
    tag = "bookings"
)]
pub async fn update_booking_handler(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBooking>,
) -> Result<Json<BookingResponse>, BookingError> {
    payload
        .validate()
        .map_err(|e| BookingError::Validation(e.to_string()))?;

    let (booking, promotions) = state.booking_service.update_booking(id, payload).await?;

    Ok(Json(BookingResponse {
        booking,
        promotions,
    }))
}

/// Handler for DELETE /api/bookings/{id}
#[utoipa::path(
    delete,
    path = "/api/bookings/{id}",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 204, description = "Booking deleted"),
        (status = 404, description = "Booking not found", body = String, example = json!({"error": "Booking not found"}))
    ),
    tag = "bookings"
)]
pub async fn delete_booking_handler(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, BookingError> {
    state.booking_service.delete_booking(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
