use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Booking;
use crate::services::booking::{self, BookingError, BookingRequest};
use crate::state::AppState;

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookingRequest>,
) -> Response {
    let result = {
        let mut db = state.db.lock().unwrap();
        booking::create_booking(&mut db, &state.promos, &req)
    };

    match result {
        Ok(confirmation) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "success": true,
                "message": "Booking confirmed successfully",
                "data": confirmation,
            })),
        )
            .into_response(),
        Err(err) => booking_error_response(err),
    }
}

fn booking_error_response(err: BookingError) -> Response {
    let message = err.to_string();
    let (status, body) = match err {
        BookingError::MissingFields { missing } => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "success": false, "error": message, "required": missing }),
        ),
        BookingError::InvalidId
        | BookingError::InvalidQuantity
        | BookingError::InvalidEmail
        | BookingError::InvalidSelection => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "success": false, "error": message }),
        ),
        BookingError::ExperienceNotFound => (
            StatusCode::NOT_FOUND,
            serde_json::json!({ "success": false, "error": message }),
        ),
        BookingError::CapacityExceeded {
            available,
            requested,
        } => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({
                "success": false,
                "error": message,
                "available": available,
                "requested": requested,
            }),
        ),
        BookingError::DuplicateBooking { existing_id } => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "success": false, "error": message, "bookingId": existing_id }),
        ),
        BookingError::PromoMinimumNotMet { min_amount } => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "success": false, "error": message, "minAmount": min_amount }),
        ),
        BookingError::Transaction(e) => {
            tracing::error!(error = %e, "booking transaction failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "success": false, "error": "Failed to create booking" }),
            )
        }
    };

    (status, Json(body)).into_response()
}

// GET /api/bookings?email=user@example.com&page=1&limit=10&status=confirmed
#[derive(Deserialize)]
pub struct HistoryQuery {
    pub email: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingHistoryItem {
    id: String,
    experience_id: String,
    experience_title: String,
    full_name: String,
    email: String,
    date: String,
    time: String,
    quantity: i64,
    subtotal: f64,
    discount: f64,
    total: f64,
    promo_code: Option<String>,
    status: String,
    created_at: String,
}

impl From<Booking> for BookingHistoryItem {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            experience_id: b.experience_id,
            experience_title: b.experience_title,
            full_name: b.full_name,
            email: b.email,
            date: b.date,
            time: b.time,
            quantity: b.quantity,
            subtotal: b.subtotal,
            discount: b.discount,
            total: b.total,
            promo_code: b.promo_code,
            status: b.status.as_str().to_string(),
            created_at: b.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

pub async fn booking_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let email = query
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .ok_or_else(|| AppError::BadRequest("Email parameter is required".to_string()))?
        .to_lowercase();

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1) * limit;
    let status_filter = query.status.as_deref();

    let (bookings, total) = {
        let db = state.db.lock().unwrap();
        let bookings = queries::get_bookings_by_email(&db, &email, status_filter, limit, offset)?;
        let total = queries::count_bookings_by_email(&db, &email, status_filter)?;
        (bookings, total)
    };

    let total_pages = if total == 0 { 0 } else { (total + limit - 1) / limit };
    let items: Vec<BookingHistoryItem> = bookings.into_iter().map(Into::into).collect();

    Ok(Json(serde_json::json!({
        "success": true,
        "count": items.len(),
        "total": total,
        "page": page,
        "totalPages": total_pages,
        "hasMore": page < total_pages,
        "data": items,
    })))
}
