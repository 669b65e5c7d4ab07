mod bookings;
mod db;
mod error;
mod models;
mod promotions;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use bookings::{Booking, BookingResponse, BookingService, BookingsRepository, CreateBooking, UpdateBooking};
use error::ApiError;
use models::{CertificateValue, CreditCard, HotelChain, ShoppingPortal, SubBrand};
use promotions::handlers::{AppliedPromotionDetail, ReevaluateRequest, ReevaluationSummary};
use promotions::{AppliedBenefit, AppliedPromotion, BookingSource, PromotionEngine};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        bookings::handlers::create_booking_handler,
        bookings::handlers::list_bookings_handler,
        bookings::handlers::get_booking_handler,
        bookings::handlers::update_booking_handler,
        bookings::handlers::delete_booking_handler,
        promotions::handlers::get_booking_promotions_handler,
        promotions::handlers::reevaluate_booking_handler,
        promotions::handlers::reevaluate_bookings_handler,
        promotions::handlers::reevaluate_all_handler,
        promotions::handlers::reevaluate_promotion_handler,
        get_hotel_chains,
        get_sub_brands,
        get_credit_cards,
        get_shopping_portals,
        get_certificate_values,
    ),
    components(
        schemas(
            Booking, BookingResponse, CreateBooking, UpdateBooking, BookingSource,
            AppliedPromotion, AppliedBenefit, AppliedPromotionDetail,
            ReevaluateRequest, ReevaluationSummary,
            HotelChain, SubBrand, CreditCard, ShoppingPortal, CertificateValue,
        )
    ),
    tags(
        (name = "bookings", description = "Hotel booking management endpoints"),
        (name = "promotions", description = "Promotion matching and re-evaluation endpoints"),
        (name = "reference", description = "Static reference data endpoints")
    ),
    info(
        title = "Stay Book API",
        version = "1.0.0",
        description = "RESTful API for tracking hotel bookings and the loyalty, credit card, and portal promotions they earn",
        contact(
            name = "API Support",
            email = "support@staybook.dev"
        )
    )
)]
struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: db::DbPool,
    pub booking_service: BookingService,
    pub promotion_engine: Arc<PromotionEngine>,
}

/// Handler for GET /api/hotel-chains
#[utoipa::path(
    get,
    path = "/api/hotel-chains",
    responses(
        (status = 200, description = "List of hotel chains", body = Vec<HotelChain>),
        (status = 500, description = "Internal server error", body = String, example = json!({"error": "Database error"}))
    ),
    tag = "reference"
)]
async fn get_hotel_chains(State(state): State<AppState>) -> Result<Json<Vec<HotelChain>>, ApiError> {
    let chains = sqlx::query_as::<_, HotelChain>(
        "SELECT id, name, point_value FROM hotel_chains ORDER BY id",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(chains))
}

/// Handler for GET /api/hotel-chains/:id/sub-brands
#[utoipa::path(
    get,
    path = "/api/hotel-chains/{id}/sub-brands",
    params(
        ("id" = i32, Path, description = "Hotel chain ID")
    ),
    responses(
        (status = 200, description = "Sub-brands of the chain", body = Vec<SubBrand>),
        (status = 404, description = "Hotel chain not found", body = String, example = json!({"error": "HotelChain with id 1 not found"}))
    ),
    tag = "reference"
)]
async fn get_sub_brands(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<SubBrand>>, ApiError> {
    let exists: Option<bool> =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM hotel_chains WHERE id = $1)")
            .bind(id)
            .fetch_one(&state.db)
            .await?;
    if !exists.unwrap_or(false) {
        return Err(ApiError::NotFound {
            resource: "HotelChain".to_string(),
            id: id.to_string(),
        });
    }

    let brands = sqlx::query_as::<_, SubBrand>(
        "SELECT id, hotel_chain_id, name FROM sub_brands WHERE hotel_chain_id = $1 ORDER BY id",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(brands))
}

/// Handler for GET /api/credit-cards
#[utoipa::path(
    get,
    path = "/api/credit-cards",
    responses(
        (status = 200, description = "List of credit cards", body = Vec<CreditCard>),
        (status = 500, description = "Internal server error", body = String, example = json!({"error": "Database error"}))
    ),
    tag = "reference"
)]
async fn get_credit_cards(State(state): State<AppState>) -> Result<Json<Vec<CreditCard>>, ApiError> {
    let cards = sqlx::query_as::<_, CreditCard>("SELECT id, name FROM credit_cards ORDER BY id")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(cards))
}

/// Handler for GET /api/shopping-portals
#[utoipa::path(
    get,
    path = "/api/shopping-portals",
    responses(
        (status = 200, description = "List of shopping portals", body = Vec<ShoppingPortal>),
        (status = 500, description = "Internal server error", body = String, example = json!({"error": "Database error"}))
    ),
    tag = "reference"
)]
async fn get_shopping_portals(
    State(state): State<AppState>,
) -> Result<Json<Vec<ShoppingPortal>>, ApiError> {
    let portals =
        sqlx::query_as::<_, ShoppingPortal>("SELECT id, name FROM shopping_portals ORDER BY id")
            .fetch_all(&state.db)
            .await?;

    Ok(Json(portals))
}

/// Handler for GET /api/certificate-values
#[utoipa::path(
    get,
    path = "/api/certificate-values",
    responses(
        (status = 200, description = "Certificate valuation table", body = Vec<CertificateValue>),
        (status = 500, description = "Internal server error", body = String, example = json!({"error": "Database error"}))
    ),
    tag = "reference"
)]
async fn get_certificate_values(
    State(state): State<AppState>,
) -> Result<Json<Vec<CertificateValue>>, ApiError> {
    let values = sqlx::query_as::<_, CertificateValue>(
        "SELECT cert_type, cash_value FROM certificate_values ORDER BY cert_type",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(values))
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds CORS middleware
fn create_router(db: db::DbPool, promotion_engine: Arc<PromotionEngine>) -> Router {
    use tower_http::cors::{Any, CorsLayer};

    let booking_service = BookingService::new(
        BookingsRepository::new(db.clone()),
        promotion_engine.clone(),
    );

    let state = AppState {
        db,
        booking_service,
        promotion_engine,
    };

    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Booking routes
        .route("/api/bookings", post(bookings::handlers::create_booking_handler))
        .route("/api/bookings", get(bookings::handlers::list_bookings_handler))
        .route("/api/bookings/:id", get(bookings::handlers::get_booking_handler))
        .route("/api/bookings/:id", put(bookings::handlers::update_booking_handler))
        .route("/api/bookings/:id", delete(bookings::handlers::delete_booking_handler))
        // Promotion engine routes
        .route(
            "/api/bookings/:id/promotions",
            get(promotions::handlers::get_booking_promotions_handler),
        )
        .route(
            "/api/bookings/:id/reevaluate",
            post(promotions::handlers::reevaluate_booking_handler),
        )
        .route(
            "/api/promotions/reevaluate",
            post(promotions::handlers::reevaluate_bookings_handler),
        )
        .route(
            "/api/promotions/reevaluate-all",
            post(promotions::handlers::reevaluate_all_handler),
        )
        .route(
            "/api/promotions/:id/reevaluate",
            post(promotions::handlers::reevaluate_promotion_handler),
        )
        // Reference data routes
        .route("/api/hotel-chains", get(get_hotel_chains))
        .route("/api/hotel-chains/:id/sub-brands", get(get_sub_brands))
        .route("/api/credit-cards", get(get_credit_cards))
        .route("/api/shopping-portals", get(get_shopping_portals))
        .route("/api/certificate-values", get(get_certificate_values))
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    // RUST_LOG controls verbosity; defaults to info
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Stay Book API - Starting...");

    // Get configuration from environment variables
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set in environment");
    let host = std::env::var("HOST")
        .unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string());

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&database_url)
        .await
        .expect("Failed to create database pool");

    // Run SQLx migrations on startup
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations completed successfully");

    // Pre-load the promotion catalog so the first request doesn't pay for it
    let promotion_engine = Arc::new(PromotionEngine::new(db_pool.clone()));
    if let Err(e) = promotion_engine.warm_cache().await {
        tracing::warn!("Could not warm promotion catalog: {}", e);
    }

    // Create the application router
    let app = create_router(db_pool, promotion_engine);

    // Start the Axum server
    let addr = format!("{}:{}", host, port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Stay Book API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
