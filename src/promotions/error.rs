// Error types for the Promotion Engine
// Per-promotion failures are isolated by the matching engine; only
// infrastructure failures abort a re-evaluation run

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Main error type for the Promotion Engine
#[derive(Debug, Error)]
pub enum PromotionError {
    /// Referenced booking or promotion no longer exists when a re-evaluation
    /// is attempted. Skipped per record, never fails a whole batch.
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// A promotion definition violates a structural invariant (both flat
    /// benefits and tiers populated, inverted tier range). The engine refuses
    /// to match against it and surfaces a diagnostic.
    #[error("Invalid promotion configuration: {0}")]
    InvalidConfiguration(String),

    /// Arithmetic outside the engine's domain: a zero night threshold in
    /// span-stay proration, a negative cap value. Fatal for the single
    /// promotion, never for the batch.
    #[error("Computation error: {0}")]
    Computation(String),

    /// Database operation errors, automatically converted from sqlx::Error.
    /// Aborts the whole run; runs are idempotent and safely retryable.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Restriction JSONB could not be deserialized
    #[error("Restriction parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for promotion engine operations
pub type PromoResult<T> = Result<T, PromotionError>;

impl PromotionError {
    /// Whether this failure is scoped to one promotion definition and must
    /// not abort matching of the booking against other promotions
    pub fn is_promotion_scoped(&self) -> bool {
        matches!(
            self,
            PromotionError::InvalidConfiguration(_)
                | PromotionError::Computation(_)
                | PromotionError::Json(_)
        )
    }
}

impl IntoResponse for PromotionError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            PromotionError::NotFound { .. } => (StatusCode::NOT_FOUND, "Not found"),
            PromotionError::InvalidConfiguration(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "Invalid promotion configuration")
            }
            PromotionError::Computation(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "Computation error")
            }
            PromotionError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
            }
            PromotionError::Json(_) => (StatusCode::BAD_REQUEST, "Restriction parse error"),
        };

        let body = Json(json!({
            "error": error_message,
            "details": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = PromotionError::NotFound {
            resource: "Booking",
            id: "abc".to_string(),
        };
        assert_eq!(error.to_string(), "Booking not found: abc");

        let error = PromotionError::InvalidConfiguration("both benefits and tiers".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid promotion configuration: both benefits and tiers"
        );
    }

    #[test]
    fn test_promotion_scoped_classification() {
        assert!(PromotionError::InvalidConfiguration("x".into()).is_promotion_scoped());
        assert!(PromotionError::Computation("x".into()).is_promotion_scoped());
        assert!(!PromotionError::Database(sqlx::Error::RowNotFound).is_promotion_scoped());
        assert!(!PromotionError::NotFound {
            resource: "Booking",
            id: "x".into()
        }
        .is_promotion_scoped());
    }

    #[test]
    fn test_error_from_sqlx() {
        let err: PromotionError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, PromotionError::Database(_)));
    }
}
