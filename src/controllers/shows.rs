use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

use crate::error::{conflict_on_unique, ApiError};
use crate::middleware::AuthUser;
use crate::models::{SeatStatus, Show};
use crate::services::{materializer, seats};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shows", get(list_shows).post(create_show))
        .route("/shows/{id}", delete(delete_show))
        .route("/shows/{id}/seats/available", get(available_seats))
}

/* ---------- СЕАНСЫ ---------- */

#[derive(Debug, Deserialize)]
struct ShowsQuery {
    movie_id: Option<i64>,
    theater_id: Option<i64>,
}

// GET /api/shows
async fn list_shows(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ShowsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    // Без фильтров отдаем кешированный список ближайших сеансов
    if params.movie_id.is_none() && params.theater_id.is_none() {
        let shows = state.cache.get_upcoming_shows().await;
        return Ok((StatusCode::OK, Json(json!({ "data": shows }))));
    }

    let mut q = format!("SELECT {} FROM shows WHERE 1=1", Show::COLUMNS);
    let mut bind_idx = 1;
    if params.movie_id.is_some() {
        q.push_str(&format!(" AND movie_id = ${}", bind_idx));
        bind_idx += 1;
    }
    if params.theater_id.is_some() {
        q.push_str(&format!(" AND theater_id = ${}", bind_idx));
    }
    q.push_str(" ORDER BY show_date, show_time");

    let mut dbq = sqlx::query_as::<_, Show>(&q);
    if let Some(movie_id) = params.movie_id {
        dbq = dbq.bind(movie_id);
    }
    if let Some(theater_id) = params.theater_id {
        dbq = dbq.bind(theater_id);
    }

    let shows = dbq.fetch_all(&state.db.pool).await?;

    Ok((StatusCode::OK, Json(json!({ "data": shows }))))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateShowRequest {
    movie_id: i64,
    theater_id: i64,
    show_date: NaiveDate,
    #[validate(length(min = 1, max = 20))]
    show_time: String,
    // Необязательные цены за тип места, перекрывающие цены секций
    price_overrides: Option<HashMap<String, f64>>,
}

// POST /api/shows
//
// Создание сеанса и генерация его мест - одна транзакция: сеанс не может
// существовать с пустой или наполовину сгенерированной картой мест.
async fn create_show(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateShowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !user.is_exhibitor() {
        return Err(ApiError::Forbidden(
            "Только прокатчик может создавать сеансы".to_string(),
        ));
    }
    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let mut tx = state.db.pool.begin().await?;

    let owner: Option<i64> = sqlx::query_scalar("SELECT exhibitor_id FROM theaters WHERE id = $1")
        .bind(req.theater_id)
        .fetch_optional(&mut *tx)
        .await?;
    let owner = owner.ok_or_else(|| ApiError::NotFound("Кинотеатр не найден".to_string()))?;

    if owner != user.user_id && !user.is_admin() {
        return Err(ApiError::Forbidden(
            "Сеансы можно создавать только в своих кинотеатрах".to_string(),
        ));
    }

    let movie_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM movies WHERE id = $1)")
            .bind(req.movie_id)
            .fetch_one(&mut *tx)
            .await?;
    if !movie_exists {
        return Err(ApiError::NotFound("Фильм не найден".to_string()));
    }

    if let Some(ref overrides) = req.price_overrides {
        if overrides.values().any(|price| *price < 0.0) {
            return Err(ApiError::Validation(
                "Переопределённая цена не может быть отрицательной".to_string(),
            ));
        }
    }

    let show: Show = sqlx::query_as(&format!(
        "INSERT INTO shows (movie_id, theater_id, exhibitor_id, show_date, show_time, price_overrides)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {}",
        Show::COLUMNS
    ))
    .bind(req.movie_id)
    .bind(req.theater_id)
    .bind(owner)
    .bind(req.show_date)
    .bind(&req.show_time)
    .bind(req.price_overrides.as_ref().map(sqlx::types::Json))
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| conflict_on_unique(e, "Такой сеанс уже существует"))?;

    let seat_count = materializer::materialize(&mut tx, show.id, req.theater_id).await?;

    // Связка фильм-кинотеатр появляется вместе с первым сеансом пары
    sqlx::query(
        "INSERT INTO movie_theaters (movie_id, theater_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(req.movie_id)
    .bind(req.theater_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    state.cache.invalidate_shows().await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "data": show,
            "message": format!("Сеанс создан, мест сгенерировано: {}", seat_count)
        })),
    ))
}

// DELETE /api/shows/{id}
async fn delete_show(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(show_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = state.db.pool.begin().await?;

    let show: Option<Show> = sqlx::query_as(&format!(
        "SELECT {} FROM shows WHERE id = $1 FOR UPDATE",
        Show::COLUMNS
    ))
    .bind(show_id)
    .fetch_optional(&mut *tx)
    .await?;

    let show = show.ok_or_else(|| ApiError::NotFound("Сеанс не найден".to_string()))?;

    // Владение проверяем по живой записи кинотеатра, а не по копии на сеансе
    let owner: Option<i64> = sqlx::query_scalar("SELECT exhibitor_id FROM theaters WHERE id = $1")
        .bind(show.theater_id)
        .fetch_optional(&mut *tx)
        .await?;
    let owner = owner.ok_or_else(|| {
        ApiError::Internal(format!("сеанс {} ссылается на несуществующий кинотеатр", show.id))
    })?;

    if owner != user.user_id && !user.is_admin() {
        return Err(ApiError::Forbidden(
            "Сеанс принадлежит другому прокатчику".to_string(),
        ));
    }

    // Каскад схемы удалит статусы мест и брони сеанса
    sqlx::query("DELETE FROM shows WHERE id = $1")
        .bind(show.id)
        .execute(&mut *tx)
        .await?;

    // Последний сеанс пары забирает с собой связку фильм-кинотеатр
    let remaining: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM shows WHERE movie_id = $1 AND theater_id = $2)",
    )
    .bind(show.movie_id)
    .bind(show.theater_id)
    .fetch_one(&mut *tx)
    .await?;

    if !remaining {
        sqlx::query("DELETE FROM movie_theaters WHERE movie_id = $1 AND theater_id = $2")
            .bind(show.movie_id)
            .bind(show.theater_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    state.cache.invalidate_shows().await;
    state.cache.invalidate_seats(show.id).await;

    Ok((StatusCode::OK, Json(json!({ "message": "Сеанс удалён" }))))
}

/* ---------- МЕСТА ---------- */

// GET /api/shows/{id}/seats/available
async fn available_seats(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let show_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM shows WHERE id = $1)")
        .bind(show_id)
        .fetch_one(&state.db.pool)
        .await?;
    if !show_exists {
        return Err(ApiError::NotFound("Сеанс не найден".to_string()));
    }

    let available: Vec<SeatStatus> = if state.config.features.enable_seat_cache {
        state
            .cache
            .get_show_seats(show_id)
            .await
            .into_iter()
            .filter(|s| !s.is_booked)
            .collect()
    } else {
        seats::find_available(&state.db.pool, show_id).await?
    };

    if available.is_empty() {
        return Err(ApiError::NotFound(
            "Свободных мест на сеанс нет".to_string(),
        ));
    }

    Ok((
        StatusCode::OK,
        Json(json!({ "data": available, "message": "Свободные места получены" })),
    ))
}
