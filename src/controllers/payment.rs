use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::{Booking, BookingState};
use crate::services::booking::{self, PaymentFacts};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/payments/checkout", post(initiate_payment))
        .route("/payments/webhook", post(payment_webhook))
        .route("/payments/{booking_id}/status", get(get_payment_status))
}

#[derive(Debug, Deserialize)]
struct CheckoutRequest {
    booking_id: i64,
}

// POST /api/payments/checkout
//
// Создает платёжную сессию у внешнего шлюза для неоплаченной брони вызывающего.
async fn initiate_payment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.booking_id <= 0 {
        return Err(ApiError::Validation(
            "booking_id должен быть > 0".to_string(),
        ));
    }

    let data: Option<(i64, f64, String, String, String, i64)> = sqlx::query_as(
        r#"
        SELECT b.id, b.total_price, b.booking_status, b.payment_status, m.title,
               (SELECT COUNT(*) FROM seat_status ss WHERE ss.booking_id = b.id) AS seat_count
        FROM bookings b
        JOIN movies m ON m.id = b.movie_id
        WHERE b.id = $1 AND b.user_id = $2
        "#,
    )
    .bind(req.booking_id)
    .bind(user.user_id)
    .fetch_optional(&state.db.pool)
    .await?;

    let (booking_id, total_price, booking_status, payment_status, movie_title, seat_count) =
        data.ok_or_else(|| ApiError::NotFound("Бронирование не найдено".to_string()))?;

    let current = BookingState::from_columns(&booking_status, &payment_status).ok_or_else(|| {
        ApiError::Internal(format!(
            "недопустимая комбинация статусов брони {}: {}/{}",
            booking_id, booking_status, payment_status
        ))
    })?;
    if current.ensure_payable()? {
        return Err(ApiError::InvalidState("Бронь уже оплачена".to_string()));
    }

    if total_price <= 0.0 || seat_count == 0 {
        return Err(ApiError::InvalidState(
            "Некорректная стоимость бронирования".to_string(),
        ));
    }

    let amount_minor = (total_price * 100.0).round() as i64;
    let order_id = format!("booking-{}-{}", booking_id, Uuid::new_v4().simple());
    let description = format!("{} - {} билет(ов)", movie_title, seat_count);

    let payment_response = state
        .gateway
        .create_payment(
            amount_minor,
            order_id,
            description.clone(),
            Some(user.email.clone()),
        )
        .await
        .map_err(|e| {
            tracing::error!("Ошибка платежного шлюза: {:?}", e);
            ApiError::Gateway("шлюз недоступен, повторите попытку позже".to_string())
        })?;

    if !payment_response.success {
        let message = payment_response
            .message
            .unwrap_or_else(|| "Неизвестная ошибка".to_string());
        tracing::error!("Платежный шлюз вернул ошибку: {}", message);
        return Err(ApiError::Gateway(message));
    }

    let payment_id = payment_response
        .payment_id
        .ok_or_else(|| ApiError::Gateway("шлюз не вернул ID платежа".to_string()))?;

    sqlx::query(
        "INSERT INTO payments (booking_id, user_id, provider, provider_transaction_id, amount, currency)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (provider_transaction_id) DO NOTHING",
    )
    .bind(booking_id)
    .bind(user.user_id)
    .bind(&state.config.payment.provider)
    .bind(&payment_id)
    .bind(total_price)
    .bind(&state.config.payment.currency)
    .execute(&state.db.pool)
    .await?;

    tracing::info!(
        "Создан платеж для бронирования {}: payment_id={}, сумма={}",
        booking_id,
        payment_id,
        total_price
    );

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "payment_url": payment_response.payment_url,
            "payment_id": payment_id,
            "amount": total_price,
            "currency": state.config.payment.currency,
            "description": description,
            "expires_at": payment_response.expires_at
        })),
    ))
}

// POST /api/payments/webhook
//
// Уведомление шлюза. Подтверждение идемпотентно, неуспех отменяет только
// неоплаченную бронь; ответ всегда 200, чтобы шлюз не ретраил вечно.
async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    let payment_id = payload["paymentId"].as_str().unwrap_or_default().to_string();
    let status = payload["status"].as_str().unwrap_or_default().to_string();

    tracing::info!("Webhook: payment_id={}, status={}", payment_id, status);

    let payment_info: Option<(i64, i64, f64)> = sqlx::query_as(
        "SELECT booking_id, user_id, amount FROM payments WHERE provider_transaction_id = $1",
    )
    .bind(&payment_id)
    .fetch_optional(&state.db.pool)
    .await
    .ok()
    .flatten();

    let Some((booking_id, payer_id, amount)) = payment_info else {
        tracing::warn!("Платеж {} не найден в БД", payment_id);
        return (StatusCode::OK, Json(json!({"received": true})));
    };

    match status.as_str() {
        "CONFIRMED" | "SUCCESS" | "COMPLETED" => {
            let facts = PaymentFacts {
                provider: state.config.payment.provider.clone(),
                provider_transaction_id: payment_id.clone(),
                user_id: Some(payer_id),
                paid_amount: payload["paidAmount"].as_f64().unwrap_or(amount),
            };
            if let Err(e) = booking::confirm_payment(&state, booking_id, &facts).await {
                tracing::warn!(
                    "Не удалось подтвердить оплату брони {}: {:?}",
                    booking_id,
                    e
                );
            }
        }
        "CANCELLED" | "FAILED" | "EXPIRED" | "REJECTED" => {
            if let Err(e) = booking::fail_payment(&state, booking_id).await {
                tracing::warn!(
                    "Не удалось обработать неуспех оплаты брони {}: {:?}",
                    booking_id,
                    e
                );
            }
        }
        _ => {
            tracing::debug!("Неизвестный статус {} для платежа {}", status, payment_id);
        }
    }

    (StatusCode::OK, Json(json!({"received": true})))
}

// GET /api/payments/{booking_id}/status
//
// Вариант relay с опросом: если локально платеж еще pending, спрашиваем шлюз
// и применяем подтверждение на месте.
async fn get_payment_status(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<i64>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let booking: Option<Booking> = sqlx::query_as(&format!(
        "SELECT {} FROM bookings WHERE id = $1",
        Booking::COLUMNS
    ))
    .bind(booking_id)
    .fetch_optional(&state.db.pool)
    .await?;

    let mut booking =
        booking.ok_or_else(|| ApiError::NotFound("Бронирование не найдено".to_string()))?;

    if booking.user_id != user.user_id && !user.is_admin() {
        return Err(ApiError::Forbidden(
            "Нет доступа к этой брони".to_string(),
        ));
    }

    let payment: Option<(String, String, f64)> = sqlx::query_as(
        "SELECT provider_transaction_id, status, amount FROM payments
         WHERE booking_id = $1
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(booking_id)
    .fetch_optional(&state.db.pool)
    .await?;

    let (transaction_id, local_status, amount) = payment.ok_or_else(|| {
        ApiError::NotFound("Платеж для данного бронирования не найден".to_string())
    })?;

    if booking.payment_status == "pending" && local_status == "initiated" {
        if let Ok(check) = state.gateway.check_payment_status(&transaction_id).await {
            if check.success && matches!(check.status.as_deref(), Some("CONFIRMED")) {
                let facts = PaymentFacts {
                    provider: state.config.payment.provider.clone(),
                    provider_transaction_id: transaction_id.clone(),
                    user_id: Some(booking.user_id),
                    paid_amount: check
                        .amount
                        .map(|minor| minor as f64 / 100.0)
                        .unwrap_or(amount),
                };
                booking::confirm_payment(&state, booking_id, &facts).await?;
                booking.payment_status = "paid".to_string();
            }
        }
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "booking_id": booking_id,
            "booking_status": booking.booking_status,
            "payment_status": booking.payment_status,
            "payment_id": transaction_id
        })),
    ))
}
