//! Транзакционное ядро бронирования.
//!
//! Проверка доступности и захват мест выполняются одним условным UPDATE
//! внутри транзакции: параллельные попытки занять пересекающиеся места
//! разрешаются подсчетом затронутых строк, без длинных блокировок. Любая
//! ошибка после начала транзакции откатывает все захваты этого вызова.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::booking::BookingWithSeats;
use crate::models::{Booking, BookingState};
use crate::services::seats;
use crate::AppState;

/// Факты об оплате от внешнего платёжного процессора.
#[derive(Debug, Clone)]
pub struct PaymentFacts {
    pub provider: String,
    pub provider_transaction_id: String,
    pub user_id: Option<i64>,
    pub paid_amount: f64,
}

async fn load_booking_for_update(
    tx: &mut sqlx::PgConnection,
    booking_id: i64,
) -> Result<Booking, ApiError> {
    let booking: Option<Booking> = sqlx::query_as(&format!(
        "SELECT {} FROM bookings WHERE id = $1 FOR UPDATE",
        Booking::COLUMNS
    ))
    .bind(booking_id)
    .fetch_optional(&mut *tx)
    .await?;

    booking.ok_or_else(|| ApiError::NotFound("Бронирование не найдено".to_string()))
}

fn booking_state(booking: &Booking) -> Result<BookingState, ApiError> {
    booking.state().ok_or_else(|| {
        ApiError::Internal(format!(
            "недопустимая комбинация статусов брони {}: {}/{}",
            booking.id, booking.booking_status, booking.payment_status
        ))
    })
}

/// Бронирует места сеанса для пользователя.
///
/// Все или ничего: либо заняты все запрошенные места и создана бронь,
/// либо ни одно место не меняет состояния.
pub async fn book_seats(
    state: &AppState,
    user: &AuthUser,
    show_id: i64,
    seat_ids: &[i64],
) -> Result<BookingWithSeats, ApiError> {
    if seat_ids.is_empty() {
        return Err(ApiError::Validation(
            "Нужно выбрать хотя бы одно место".to_string(),
        ));
    }

    // Сортировка даёт стабильный порядок блокировок строк,
    // дубликаты в запросе не считаются дважды
    let mut ids: Vec<i64> = seat_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let mut tx = state.db.pool.begin().await?;

    let show: Option<(i64, i64, i64, i64)> = sqlx::query_as(
        "SELECT id, movie_id, theater_id, exhibitor_id FROM shows WHERE id = $1",
    )
    .bind(show_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (show_id, movie_id, theater_id, exhibitor_id) =
        show.ok_or_else(|| ApiError::NotFound("Сеанс не найден".to_string()))?;

    let claimed = seats::claim(
        &mut *tx,
        &ids,
        show_id,
        user.user_id,
        state.config.booking.hold_minutes,
    )
    .await?;

    if claimed.len() != ids.len() {
        // Хотя бы одно место занято, не существует или принадлежит другому
        // сеансу - откатываем захваты целиком
        tx.rollback().await?;

        let known = seats::find_by_ids(&state.db.pool, &ids, show_id)
            .await
            .unwrap_or_default();
        let known_ids: HashSet<i64> = known.iter().map(|s| s.id).collect();

        let mut unavailable: Vec<String> = known
            .iter()
            .filter(|s| s.is_booked)
            .map(|s| s.seat_label.clone())
            .collect();
        let unknown = ids.iter().filter(|id| !known_ids.contains(id)).count();
        if unknown > 0 {
            unavailable.push(format!("{} несуществующих id", unknown));
        }
        if unavailable.is_empty() {
            // Места успели освободиться между откатом и перечитыванием
            unavailable.push(format!("{} из {} запрошенных", ids.len() - claimed.len(), ids.len()));
        }

        return Err(ApiError::Conflict(format!(
            "Места недоступны: {}",
            unavailable.join(", ")
        )));
    }

    let total_price: f64 = claimed.iter().map(|(_, price)| price).sum();

    let booking: Booking = sqlx::query_as(&format!(
        "INSERT INTO bookings (user_id, show_id, theater_id, movie_id, exhibitor_id, total_price)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {}",
        Booking::COLUMNS
    ))
    .bind(user.user_id)
    .bind(show_id)
    .bind(theater_id)
    .bind(movie_id)
    .bind(exhibitor_id)
    .bind(total_price)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE seat_status SET booking_id = $1 WHERE id = ANY($2)")
        .bind(booking.id)
        .bind(&ids)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    state.cache.invalidate_seats(show_id).await;

    let booked = seats::find_by_booking(&state.db.pool, booking.id).await?;
    info!(
        "Booking {} created: user {}, show {}, {} seats, total {}",
        booking.id,
        user.user_id,
        show_id,
        booked.len(),
        total_price
    );

    Ok(BookingWithSeats {
        booking,
        seats: booked,
    })
}

/// Отмена брони владельцем или админом.
///
/// Оплаченную бронь может отменить только админ (путь возврата средств).
/// Места возвращаются в свободный пул, сама бронь не удаляется.
pub async fn cancel_booking(
    state: &AppState,
    booking_id: i64,
    caller: &AuthUser,
) -> Result<(), ApiError> {
    let mut tx = state.db.pool.begin().await?;

    let booking = load_booking_for_update(&mut tx, booking_id).await?;

    if booking.user_id != caller.user_id && !caller.is_admin() {
        return Err(ApiError::Forbidden(
            "Нет прав на отмену этой брони".to_string(),
        ));
    }

    let current = booking_state(&booking)?;
    current.ensure_cancellable(caller.is_admin())?;

    let freed = seats::release_booking_seats(&mut *tx, booking.id).await?;

    sqlx::query("UPDATE bookings SET booking_status = 'cancelled', updated_at = NOW() WHERE id = $1")
        .bind(booking.id)
        .execute(&mut *tx)
        .await?;

    // Админ-отмена оплаченной брони помечает платеж к возврату
    if booking.payment_status == "paid" {
        sqlx::query(
            "UPDATE payments SET status = 'refunded', updated_at = NOW()
             WHERE booking_id = $1 AND status = 'success'",
        )
        .bind(booking.id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    state.cache.invalidate_seats(booking.show_id).await;
    info!(
        "Booking {} cancelled by user {}, {} seats released",
        booking.id,
        caller.user_id,
        freed.len()
    );

    Ok(())
}

/// Идемпотентное подтверждение оплаты от платёжного процессора.
///
/// Повторная доставка того же подтверждения ничего не меняет: статус оплаты
/// уже 'paid', а запись платежа защищена уникальным id транзакции провайдера.
pub async fn confirm_payment(
    state: &AppState,
    booking_id: i64,
    facts: &PaymentFacts,
) -> Result<(), ApiError> {
    let mut tx = state.db.pool.begin().await?;

    let booking = load_booking_for_update(&mut tx, booking_id).await?;
    let current = booking_state(&booking)?;

    if current.ensure_payable()? {
        // Уже оплачена - повторная доставка подтверждения
        tx.commit().await?;
        return Ok(());
    }

    if (facts.paid_amount - booking.total_price).abs() > 0.01 {
        warn!(
            "Payment amount mismatch for booking {}: paid {}, expected {}",
            booking.id, facts.paid_amount, booking.total_price
        );
    }

    sqlx::query(
        "INSERT INTO payments (booking_id, user_id, provider, provider_transaction_id, amount, currency, status)
         VALUES ($1, $2, $3, $4, $5, $6, 'success')
         ON CONFLICT (provider_transaction_id)
         DO UPDATE SET status = 'success', updated_at = NOW()",
    )
    .bind(booking.id)
    .bind(facts.user_id.unwrap_or(booking.user_id))
    .bind(&facts.provider)
    .bind(&facts.provider_transaction_id)
    .bind(facts.paid_amount)
    .bind(&state.config.payment.currency)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE bookings SET payment_status = 'paid', updated_at = NOW()
         WHERE id = $1 AND payment_status = 'pending'",
    )
    .bind(booking.id)
    .execute(&mut *tx)
    .await?;

    // Оплаченные места перестают быть мягким удержанием, но остаются занятыми
    seats::clear_hold(&mut *tx, booking.id).await?;

    tx.commit().await?;

    info!(
        "Payment confirmed for booking {}: transaction {}",
        booking.id, facts.provider_transaction_id
    );

    Ok(())
}

/// Неуспех оплаты от процессора: неоплаченная бронь отменяется, места
/// освобождаются. Для уже оплаченной брони уведомление игнорируется -
/// статус 'paid' необратим со стороны шлюза.
pub async fn fail_payment(state: &AppState, booking_id: i64) -> Result<(), ApiError> {
    let mut tx = state.db.pool.begin().await?;

    let booking = load_booking_for_update(&mut tx, booking_id).await?;

    match booking_state(&booking)? {
        BookingState::Active {
            payment: crate::models::PaymentState::Pending,
        } => {}
        other => {
            warn!(
                "Ignoring failed-payment notification for booking {} in state {:?}",
                booking.id, other
            );
            tx.rollback().await?;
            return Ok(());
        }
    }

    let freed = seats::release_booking_seats(&mut *tx, booking.id).await?;

    sqlx::query("UPDATE bookings SET booking_status = 'cancelled', updated_at = NOW() WHERE id = $1")
        .bind(booking.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE payments SET status = 'failed', updated_at = NOW()
         WHERE booking_id = $1 AND status = 'initiated'",
    )
    .bind(booking.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    state.cache.invalidate_seats(booking.show_id).await;
    info!(
        "Payment failed for booking {}, {} seats released",
        booking.id,
        freed.len()
    );

    Ok(())
}

/// Истечение срока мягкого удержания: неоплаченная активная бронь переходит
/// в 'expired', её места возвращаются в пул. Возвращает false, если бронь
/// успели оплатить или отменить - гонка с подтверждением разрешается
/// блокировкой строки брони.
pub async fn expire_booking(state: &AppState, booking_id: i64) -> Result<bool, ApiError> {
    let mut tx = state.db.pool.begin().await?;

    let booking: Option<Booking> = sqlx::query_as(&format!(
        "SELECT {} FROM bookings WHERE id = $1 FOR UPDATE",
        Booking::COLUMNS
    ))
    .bind(booking_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(booking) = booking else {
        return Ok(false);
    };

    let expirable = booking.state().map(|s| s.is_expirable()).unwrap_or(false);
    if !expirable {
        tx.rollback().await?;
        return Ok(false);
    }

    let freed = seats::release_booking_seats(&mut *tx, booking.id).await?;

    sqlx::query("UPDATE bookings SET booking_status = 'expired', updated_at = NOW() WHERE id = $1")
        .bind(booking.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    state.cache.invalidate_seats(booking.show_id).await;
    info!(
        "Booking {} expired, {} seats released",
        booking.id,
        freed.len()
    );

    Ok(true)
}
