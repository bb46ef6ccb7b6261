// handlers/public.rs - Unauthenticated reads: banner, health, catalog, payment status

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::{Career, Category};

pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "ServiceHub API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Service marketplace API",
        "endpoints": {
            "public": ["/", "/health", "/api/categories", "/api/careers", "/api/payments/:order_id"],
            "session": ["/api/auth/whoami", "/api/auth/logout"],
            "user": ["/api/user/*"],
            "employee": ["/api/employee/*"],
            "field_exec": ["/api/field-exec/*"],
            "admin": ["/api/admin/*"]
        }
    }))
}

/// GET /health - 503 when the store does not answer
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let timestamp = chrono::Utc::now().to_rfc3339();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "success": true, "status": "ok", "database": "ok", "timestamp": timestamp })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "success": false, "status": "degraded", "database": "unavailable", "timestamp": timestamp })),
            )
        }
    }
}

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    let categories = state.store.list_categories(false).await?;
    Ok(ApiResponse::success("Categories", categories))
}

pub async fn show_category(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Category> {
    let category = state
        .store
        .find_category(id)
        .await?
        .filter(|category| category.is_active)
        .ok_or_else(|| ApiError::not_found("Category not found"))?;
    Ok(ApiResponse::success("Category", category))
}

pub async fn list_careers(State(state): State<AppState>) -> ApiResult<Vec<Career>> {
    let careers = state.store.list_careers(false).await?;
    Ok(ApiResponse::success("Careers", careers))
}

/// GET /api/payments/:order_id - payment and refund state only, never the booking itself
pub async fn payment_status(State(state): State<AppState>, Path(order_id): Path<String>) -> ApiResult<Value> {
    let booking = state
        .store
        .find_booking_by_order(&order_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No payment found for this order"))?;

    Ok(ApiResponse::success(
        "Payment status",
        json!({
            "payment": booking.payment,
            "refund": booking.refund,
            "is_paid": booking.is_paid,
        }),
    ))
}
