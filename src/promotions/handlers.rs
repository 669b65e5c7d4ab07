// HTTP handlers for promotion engine endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::promotions::{AppliedBenefit, AppliedPromotion, PromotionError};

/// An applied promotion with its benefit applications expanded
#[derive(Debug, Serialize, ToSchema)]
pub struct AppliedPromotionDetail {
    #[serde(flatten)]
    pub promotion: AppliedPromotion,
    pub benefits: Vec<AppliedBenefit>,
}

/// Request body for targeted re-evaluation
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReevaluateRequest {
    pub booking_ids: Vec<Uuid>,
}

/// Outcome of a re-evaluation run
#[derive(Debug, Serialize, ToSchema)]
pub struct ReevaluationSummary {
    /// Number of bookings whose applied promotions were rewritten
    pub reevaluated: usize,
}

/// Handler for GET /api/bookings/{id}/promotions
/// Lists the promotions applied to a booking, with benefit applications
#[utoipa::path(
    get,
    path = "/api/bookings/{id}/promotions",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Applied promotions for the booking", body = Vec<AppliedPromotionDetail>),
        (status = 500, description = "Internal server error", body = String, example = json!({"error": "Internal server error"}))
    ),
    tag = "promotions"
)]
pub async fn get_booking_promotions_handler(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AppliedPromotionDetail>>, PromotionError> {
    let rows = state.promotion_engine.applied_with_benefits(id).await?;
    let details = rows
        .into_iter()
        .map(|(promotion, benefits)| AppliedPromotionDetail {
            promotion,
            benefits,
        })
        .collect();
    Ok(Json(details))
}

/// Handler for POST /api/bookings/{id}/reevaluate
/// Re-matches one booking against the active catalog
#[utoipa::path(
    post,
    path = "/api/bookings/{id}/reevaluate",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking re-matched", body = Vec<AppliedPromotion>),
        (status = 404, description = "Booking not found", body = String, example = json!({"error": "Booking with id ... not found"}))
    ),
    tag = "promotions"
)]
pub async fn reevaluate_booking_handler(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AppliedPromotion>>, PromotionError> {
    let applied = state.promotion_engine.match_for_booking(id).await?;
    Ok(Json(applied))
}

/// Handler for POST /api/promotions/reevaluate
/// Re-evaluates an explicit set of bookings
#[utoipa::path(
    post,
    path = "/api/promotions/reevaluate",
    request_body = ReevaluateRequest,
    responses(
        (status = 200, description = "Bookings re-evaluated", body = ReevaluationSummary),
        (status = 500, description = "Internal server error", body = String, example = json!({"error": "Internal server error"}))
    ),
    tag = "promotions"
)]
pub async fn reevaluate_bookings_handler(
    State(state): State<crate::AppState>,
    Json(request): Json<ReevaluateRequest>,
) -> Result<Json<ReevaluationSummary>, PromotionError> {
    let reevaluated = state.promotion_engine.reevaluate(request.booking_ids).await?;
    Ok(Json(ReevaluationSummary { reevaluated }))
}

/// Handler for POST /api/promotions/reevaluate-all
/// Kicks off a full re-evaluation in the background
#[utoipa::path(
    post,
    path = "/api/promotions/reevaluate-all",
    responses(
        (status = 202, description = "Full re-evaluation started")
    ),
    tag = "promotions"
)]
pub async fn reevaluate_all_handler(State(state): State<crate::AppState>) -> StatusCode {
    let engine = state.promotion_engine.clone();
    tokio::spawn(async move {
        engine.invalidate_catalog().await;
        match engine.reevaluate_all().await {
            Ok(n) => tracing::info!("Full re-evaluation rewrote {} bookings", n),
            Err(e) => tracing::error!("Full re-evaluation failed: {}", e),
        }
    });
    StatusCode::ACCEPTED
}

/// Handler for POST /api/promotions/{id}/reevaluate
/// Re-evaluates the bookings carrying a promotion after its definition changed
#[utoipa::path(
    post,
    path = "/api/promotions/{id}/reevaluate",
    params(("id" = Uuid, Path, description = "Promotion ID")),
    responses(
        (status = 200, description = "Carrying bookings re-evaluated", body = ReevaluationSummary),
        (status = 500, description = "Internal server error", body = String, example = json!({"error": "Internal server error"}))
    ),
    tag = "promotions"
)]
pub async fn reevaluate_promotion_handler(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReevaluationSummary>, PromotionError> {
    let reevaluated = state.promotion_engine.reevaluate_promotion(id).await?;
    Ok(Json(ReevaluationSummary { reevaluated }))
}
