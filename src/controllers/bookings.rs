use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::booking::BookingWithSeats;
use crate::models::{Booking, SeatStatus};
use crate::services::{booking, seats};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(get_user_bookings).post(create_booking))
        .route("/bookings/{id}", get(get_booking_by_id))
        .route("/bookings/{id}/cancel", patch(cancel_booking))
        .route("/exhibitor/bookings", get(get_exhibitor_bookings))
}

/* ---------- БРОНИРОВАНИЯ ---------- */

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    show_id: i64,
    seat_status_ids: Vec<i64>,
}

// POST /api/bookings
async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.show_id <= 0 {
        return Err(ApiError::Validation(
            "show_id должен быть > 0".to_string(),
        ));
    }

    let booked = booking::book_seats(&state, &user, req.show_id, &req.seat_status_ids).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "data": booked,
            "message": "Места успешно забронированы. Переходите к оплате!"
        })),
    ))
}

// GET /api/bookings
async fn get_user_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let bookings: Vec<Booking> = sqlx::query_as(&format!(
        "SELECT {} FROM bookings WHERE user_id = $1 ORDER BY created_at DESC",
        Booking::COLUMNS
    ))
    .bind(user.user_id)
    .fetch_all(&state.db.pool)
    .await?;

    let ids: Vec<i64> = bookings.iter().map(|b| b.id).collect();

    let seat_rows: Vec<SeatStatus> = sqlx::query_as(&format!(
        "SELECT {} FROM seat_status WHERE booking_id = ANY($1) ORDER BY row_letter, seat_column",
        SeatStatus::COLUMNS
    ))
    .bind(&ids)
    .fetch_all(&state.db.pool)
    .await?;

    let mut by_booking: HashMap<i64, Vec<SeatStatus>> = HashMap::new();
    for seat in seat_rows {
        if let Some(booking_id) = seat.booking_id {
            by_booking.entry(booking_id).or_default().push(seat);
        }
    }

    let data: Vec<BookingWithSeats> = bookings
        .into_iter()
        .map(|b| {
            let seats = by_booking.remove(&b.id).unwrap_or_default();
            BookingWithSeats { booking: b, seats }
        })
        .collect();

    Ok((StatusCode::OK, Json(json!({ "data": data }))))
}

// GET /api/bookings/{id}
async fn get_booking_by_id(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(booking_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let booking: Option<Booking> = sqlx::query_as(&format!(
        "SELECT {} FROM bookings WHERE id = $1",
        Booking::COLUMNS
    ))
    .bind(booking_id)
    .fetch_optional(&state.db.pool)
    .await?;

    let booking =
        booking.ok_or_else(|| ApiError::NotFound("Бронирование не найдено".to_string()))?;

    if booking.user_id != user.user_id && !user.is_admin() {
        return Err(ApiError::Forbidden(
            "Нет доступа к этой брони".to_string(),
        ));
    }

    let booked = seats::find_by_booking(&state.db.pool, booking.id).await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "data": BookingWithSeats { booking, seats: booked } })),
    ))
}

// PATCH /api/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(booking_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if booking_id <= 0 {
        return Err(ApiError::Validation(
            "booking_id должен быть > 0".to_string(),
        ));
    }

    booking::cancel_booking(&state, booking_id, &user).await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Бронь успешно отменена" })),
    ))
}

// GET /api/exhibitor/bookings
//
// Выборка по живой записи сеанса: денормализованная копия exhibitor_id на
// брони - это индекс, а не источник истины для доступа
async fn get_exhibitor_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    if !user.is_exhibitor() {
        return Err(ApiError::Forbidden(
            "Сводка броней доступна прокатчику или админу".to_string(),
        ));
    }

    let bookings: Vec<Booking> = if user.is_admin() {
        sqlx::query_as(&format!(
            "SELECT {} FROM bookings ORDER BY created_at DESC",
            Booking::COLUMNS
        ))
        .fetch_all(&state.db.pool)
        .await?
    } else {
        sqlx::query_as(
            "SELECT b.* FROM bookings b
             JOIN shows s ON s.id = b.show_id
             WHERE s.exhibitor_id = $1
             ORDER BY b.created_at DESC",
        )
        .bind(user.user_id)
        .fetch_all(&state.db.pool)
        .await?
    };

    Ok((StatusCode::OK, Json(json!({ "data": bookings }))))
}
