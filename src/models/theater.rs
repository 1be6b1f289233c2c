use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Theater {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub exhibitor_id: i64,
    #[serde(rename = "rows")]
    pub seat_rows: i32,
    #[serde(rename = "columns")]
    pub seat_columns: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Секция зала: набор рядов с одним типом места и одной ценой.
// После генерации мест сеанса правки секций на него уже не влияют.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TheaterSection {
    pub id: i64,
    pub theater_id: i64,
    pub position: i32,
    pub section_name: String,
    pub seat_type: String,
    pub price: f64,
    pub row_letters: Vec<String>,
}
