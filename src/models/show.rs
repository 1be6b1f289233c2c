use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

// Сеанс: фильм в кинотеатре в конкретные дату и время.
// Пара (movie, theater, date, time) уникальна на уровне схемы.
// price_overrides - необязательная цена за тип места, перекрывающая цену
// секции при генерации карты мест этого сеанса.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Show {
    pub id: i64,
    pub movie_id: i64,
    pub theater_id: i64,
    pub exhibitor_id: i64,
    pub show_date: NaiveDate,
    pub show_time: String,
    pub price_overrides: Option<sqlx::types::Json<HashMap<String, f64>>>,
    pub created_at: DateTime<Utc>,
}

impl Show {
    pub const COLUMNS: &'static str =
        "id, movie_id, theater_id, exhibitor_id, show_date, show_time, price_overrides, created_at";
}
