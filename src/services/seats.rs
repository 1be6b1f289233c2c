//! Запросы к хранилищу статусов мест.
//!
//! Захват мест - единственная конкурентная операция системы: условный UPDATE
//! переводит в занятое состояние только те строки, что были свободны на момент
//! выполнения, а вызывающий сверяет число затронутых строк с запрошенным.

use sqlx::PgExecutor;

use crate::models::SeatStatus;

/// Свободные места сеанса в порядке ряд-номер (детерминированная карта зала).
pub async fn find_available<'e, E>(executor: E, show_id: i64) -> Result<Vec<SeatStatus>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, SeatStatus>(&format!(
        "SELECT {} FROM seat_status
         WHERE show_id = $1 AND is_booked = FALSE
         ORDER BY row_letter, seat_column",
        SeatStatus::COLUMNS
    ))
    .bind(show_id)
    .fetch_all(executor)
    .await
}

/// Места конкретной брони в порядке ряд-номер.
pub async fn find_by_booking<'e, E>(
    executor: E,
    booking_id: i64,
) -> Result<Vec<SeatStatus>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, SeatStatus>(&format!(
        "SELECT {} FROM seat_status
         WHERE booking_id = $1
         ORDER BY row_letter, seat_column",
        SeatStatus::COLUMNS
    ))
    .bind(booking_id)
    .fetch_all(executor)
    .await
}

/// Места по списку id, ограниченные одним сеансом: id чужого сеанса в
/// запросе просто не находится.
pub async fn find_by_ids<'e, E>(
    executor: E,
    seat_ids: &[i64],
    show_id: i64,
) -> Result<Vec<SeatStatus>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, SeatStatus>(&format!(
        "SELECT {} FROM seat_status
         WHERE id = ANY($1) AND show_id = $2
         ORDER BY row_letter, seat_column",
        SeatStatus::COLUMNS
    ))
    .bind(seat_ids)
    .bind(show_id)
    .fetch_all(executor)
    .await
}

/// Условный захват: занимает только свободные места из списка, причем только
/// относящиеся к указанному сеансу (защита от подмены id чужого сеанса).
/// Возвращает (id, цена) реально захваченных строк - если их меньше, чем
/// запрошено, вызывающий обязан откатить транзакцию.
pub async fn claim<'e, E>(
    executor: E,
    seat_ids: &[i64],
    show_id: i64,
    user_id: i64,
    hold_minutes: i64,
) -> Result<Vec<(i64, f64)>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, (i64, f64)>(
        "UPDATE seat_status
         SET is_booked = TRUE,
             booked_by = $3,
             is_reserved = TRUE,
             reservation_expiry = NOW() + make_interval(mins => $4::int),
             updated_at = NOW()
         WHERE id = ANY($1) AND show_id = $2 AND is_booked = FALSE
         RETURNING id, price",
    )
    .bind(seat_ids)
    .bind(show_id)
    .bind(user_id)
    .bind(hold_minutes)
    .fetch_all(executor)
    .await
}

/// Безусловное освобождение всех мест брони (отмена или истечение срока).
/// Повторный вызов ничего не меняет: строк с таким booking_id уже нет.
pub async fn release_booking_seats<'e, E>(
    executor: E,
    booking_id: i64,
) -> Result<Vec<i64>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, i64>(
        "UPDATE seat_status
         SET is_booked = FALSE,
             booked_by = NULL,
             booking_id = NULL,
             is_reserved = FALSE,
             reservation_expiry = NULL,
             updated_at = NOW()
         WHERE booking_id = $1
         RETURNING id",
    )
    .bind(booking_id)
    .fetch_all(executor)
    .await
}

/// Снятие мягкого удержания после оплаты: места остаются занятыми,
/// но фоновая очистка их больше не трогает.
pub async fn clear_hold<'e, E>(executor: E, booking_id: i64) -> Result<u64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        "UPDATE seat_status
         SET is_reserved = FALSE, reservation_expiry = NULL, updated_at = NOW()
         WHERE booking_id = $1 AND is_booked = TRUE",
    )
    .bind(booking_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
