use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::promotions::PromotionError;

/// Errors for booking operations
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Booking with id {0} not found")]
    NotFound(uuid::Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Promotion engine error: {0}")]
    Promotion(#[from] PromotionError),
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        match self {
            BookingError::NotFound(_) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": self.to_string() }))).into_response()
            }
            BookingError::Validation(_) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": self.to_string() }))).into_response()
            }
            BookingError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
            // Promotion errors carry their own status mapping.
            BookingError::Promotion(e) => e.into_response(),
        }
    }
}
