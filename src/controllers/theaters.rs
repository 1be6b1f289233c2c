use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use validator::Validate;

use crate::error::{conflict_on_unique, ApiError};
use crate::middleware::AuthUser;
use crate::models::{Theater, TheaterSection};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/theaters", get(list_theaters).post(create_theater))
        .route("/theaters/{id}", patch(update_theater).delete(delete_theater))
}

/* ---------- запросы ---------- */

#[derive(Debug, Deserialize, Serialize, Validate)]
struct SectionRequest {
    #[validate(length(min = 1, max = 100))]
    section_name: String,
    #[validate(length(min = 1, max = 50))]
    seat_type: String,
    #[validate(range(min = 0.0))]
    price: f64,
    #[validate(length(min = 1))]
    rows: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct CreateTheaterRequest {
    #[validate(length(min = 1, max = 200))]
    name: String,
    #[validate(length(min = 1, max = 200))]
    location: String,
    #[validate(range(min = 1, max = 26))]
    rows: i32,
    #[validate(range(min = 1, max = 500))]
    columns: i32,
    #[validate(length(min = 1), nested)]
    sections: Vec<SectionRequest>,
}

#[derive(Debug, Deserialize, Validate)]
struct LayoutRequest {
    #[validate(range(min = 1, max = 26))]
    rows: i32,
    #[validate(range(min = 1, max = 500))]
    columns: i32,
    #[validate(length(min = 1), nested)]
    sections: Vec<SectionRequest>,
}

#[derive(Debug, Deserialize, Validate)]
struct UpdateTheaterRequest {
    #[validate(length(min = 1, max = 200))]
    name: Option<String>,
    #[validate(length(min = 1, max = 200))]
    location: Option<String>,
    #[validate(nested)]
    layout: Option<LayoutRequest>,
}

// Каждая буква ряда принадлежит не более чем одной секции и лежит в
// диапазоне A..последний ряд зала
fn validate_sections(rows: i32, sections: &[SectionRequest]) -> Result<(), ApiError> {
    let max_letter = char::from(b'A' + rows as u8 - 1);
    let mut seen: HashSet<char> = HashSet::new();

    for section in sections {
        for letter in &section.rows {
            let mut chars = letter.chars();
            let (Some(c), None) = (chars.next(), chars.next()) else {
                return Err(ApiError::Validation(format!(
                    "Некорректная метка ряда '{}'",
                    letter
                )));
            };
            if !c.is_ascii_uppercase() || c > max_letter {
                return Err(ApiError::Validation(format!(
                    "Ряд '{}' вне диапазона A-{}",
                    letter, max_letter
                )));
            }
            if !seen.insert(c) {
                return Err(ApiError::Validation(format!(
                    "Ряд '{}' назначен более чем одной секции",
                    letter
                )));
            }
        }
    }

    Ok(())
}

async fn insert_sections(
    tx: &mut sqlx::PgConnection,
    theater_id: i64,
    sections: &[SectionRequest],
) -> Result<Vec<TheaterSection>, ApiError> {
    let mut inserted = Vec::with_capacity(sections.len());
    for (position, section) in sections.iter().enumerate() {
        let row: TheaterSection = sqlx::query_as(
            "INSERT INTO theater_sections (theater_id, position, section_name, seat_type, price, row_letters)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, theater_id, position, section_name, seat_type, price, row_letters",
        )
        .bind(theater_id)
        .bind(position as i32)
        .bind(&section.section_name)
        .bind(&section.seat_type)
        .bind(section.price)
        .bind(&section.rows)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "Секции зала должны называться по-разному"))?;
        inserted.push(row);
    }
    Ok(inserted)
}

/* ---------- обработчики ---------- */

// POST /api/theaters
async fn create_theater(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateTheaterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !user.is_exhibitor() {
        return Err(ApiError::Forbidden(
            "Только прокатчик может добавлять кинотеатры".to_string(),
        ));
    }

    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    validate_sections(req.rows, &req.sections)?;

    let mut tx = state.db.pool.begin().await?;

    let theater: Theater = sqlx::query_as(
        "INSERT INTO theaters (name, location, exhibitor_id, seat_rows, seat_columns)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, name, location, exhibitor_id, seat_rows, seat_columns, created_at, updated_at",
    )
    .bind(&req.name)
    .bind(&req.location)
    .bind(user.user_id)
    .bind(req.rows)
    .bind(req.columns)
    .fetch_one(&mut *tx)
    .await?;

    let sections = insert_sections(&mut tx, theater.id, &req.sections).await?;

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "data": { "theater": theater, "sections": sections },
            "message": "Кинотеатр добавлен"
        })),
    ))
}

// GET /api/theaters
async fn list_theaters(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    if !user.is_exhibitor() {
        return Err(ApiError::Forbidden(
            "Список кинотеатров доступен прокатчику или админу".to_string(),
        ));
    }

    let theaters: Vec<Theater> = if user.is_admin() {
        sqlx::query_as(
            "SELECT id, name, location, exhibitor_id, seat_rows, seat_columns, created_at, updated_at
             FROM theaters ORDER BY id",
        )
        .fetch_all(&state.db.pool)
        .await?
    } else {
        sqlx::query_as(
            "SELECT id, name, location, exhibitor_id, seat_rows, seat_columns, created_at, updated_at
             FROM theaters WHERE exhibitor_id = $1 ORDER BY id",
        )
        .bind(user.user_id)
        .fetch_all(&state.db.pool)
        .await?
    };

    Ok((StatusCode::OK, Json(json!({ "data": theaters }))))
}

// PATCH /api/theaters/{id}
// Правки планировки не трогают уже сгенерированные сеансы: их места несут
// снимок секций на момент создания
async fn update_theater(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(theater_id): Path<i64>,
    Json(req): Json<UpdateTheaterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let mut tx = state.db.pool.begin().await?;

    let theater: Option<Theater> = sqlx::query_as(
        "SELECT id, name, location, exhibitor_id, seat_rows, seat_columns, created_at, updated_at
         FROM theaters WHERE id = $1 FOR UPDATE",
    )
    .bind(theater_id)
    .fetch_optional(&mut *tx)
    .await?;

    let theater = theater.ok_or_else(|| ApiError::NotFound("Кинотеатр не найден".to_string()))?;

    if theater.exhibitor_id != user.user_id && !user.is_admin() {
        return Err(ApiError::Forbidden(
            "Кинотеатр принадлежит другому прокатчику".to_string(),
        ));
    }

    if let Some(ref name) = req.name {
        sqlx::query("UPDATE theaters SET name = $1, updated_at = NOW() WHERE id = $2")
            .bind(name)
            .bind(theater.id)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(ref location) = req.location {
        sqlx::query("UPDATE theaters SET location = $1, updated_at = NOW() WHERE id = $2")
            .bind(location)
            .bind(theater.id)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(ref layout) = req.layout {
        validate_sections(layout.rows, &layout.sections)?;

        sqlx::query(
            "UPDATE theaters SET seat_rows = $1, seat_columns = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(layout.rows)
        .bind(layout.columns)
        .bind(theater.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM theater_sections WHERE theater_id = $1")
            .bind(theater.id)
            .execute(&mut *tx)
            .await?;

        insert_sections(&mut tx, theater.id, &layout.sections).await?;
    }

    let updated: Theater = sqlx::query_as(
        "SELECT id, name, location, exhibitor_id, seat_rows, seat_columns, created_at, updated_at
         FROM theaters WHERE id = $1",
    )
    .bind(theater.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "data": updated, "message": "Кинотеатр обновлён" })),
    ))
}

// DELETE /api/theaters/{id}
async fn delete_theater(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(theater_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let owner: Option<i64> = sqlx::query_scalar("SELECT exhibitor_id FROM theaters WHERE id = $1")
        .bind(theater_id)
        .fetch_optional(&state.db.pool)
        .await?;

    let owner = owner.ok_or_else(|| ApiError::NotFound("Кинотеатр не найден".to_string()))?;

    if owner != user.user_id && !user.is_admin() {
        return Err(ApiError::Forbidden(
            "Кинотеатр принадлежит другому прокатчику".to_string(),
        ));
    }

    let has_shows: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM shows WHERE theater_id = $1)")
            .bind(theater_id)
            .fetch_one(&state.db.pool)
            .await?;

    if has_shows {
        return Err(ApiError::Conflict(
            "Нельзя удалить кинотеатр: по нему есть сеансы".to_string(),
        ));
    }

    sqlx::query("DELETE FROM theaters WHERE id = $1")
        .bind(theater_id)
        .execute(&state.db.pool)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Кинотеатр удалён" })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(rows: &[&str]) -> SectionRequest {
        SectionRequest {
            section_name: "Партер".to_string(),
            seat_type: "standard".to_string(),
            price: 100.0,
            rows: rows.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn disjoint_sections_pass() {
        let sections = vec![section(&["A", "B"]), {
            let mut s = section(&["C"]);
            s.section_name = "VIP".to_string();
            s
        }];
        assert!(validate_sections(3, &sections).is_ok());
    }

    #[test]
    fn overlapping_sections_fail() {
        let sections = vec![section(&["A", "B"]), section(&["B", "C"])];
        assert!(validate_sections(3, &sections).is_err());
    }

    #[test]
    fn out_of_range_row_fails() {
        // Зал на 3 ряда: D вне диапазона
        let sections = vec![section(&["A", "D"])];
        assert!(validate_sections(3, &sections).is_err());
    }

    #[test]
    fn lowercase_and_multichar_labels_fail() {
        assert!(validate_sections(5, &[section(&["a"])]).is_err());
        assert!(validate_sections(5, &[section(&["AB"])]).is_err());
    }
}
