use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Статус одного физического места одного сеанса - основной конкурентный ресурс.
///
/// `section_name`, `seat_type` и `price` - снимок планировки зала в момент
/// генерации; место доступно тогда и только тогда, когда `is_booked == false`.
/// `is_reserved`/`reservation_expiry` помечают мягкое удержание неоплаченной
/// брони, которое снимает фоновая очистка.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SeatStatus {
    pub id: i64,
    pub show_id: i64,
    pub seat_label: String,
    pub row_letter: String,
    pub seat_column: i32,
    pub section_name: String,
    pub seat_type: String,
    pub price: f64,
    pub is_booked: bool,
    pub booked_by: Option<i64>,
    pub booking_id: Option<i64>,
    pub is_reserved: bool,
    pub reservation_expiry: Option<DateTime<Utc>>,
}

impl SeatStatus {
    /// Столбцы в порядке полей структуры, для запросов через query_as.
    pub const COLUMNS: &'static str = "id, show_id, seat_label, row_letter, seat_column, \
         section_name, seat_type, price, is_booked, booked_by, booking_id, \
         is_reserved, reservation_expiry";
}
