use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::Movie;
use crate::AppState;

// Минимальный каталог фильмов: ровно столько, чтобы на фильм могли
// ссылаться сеансы и связка фильм-кинотеатр
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/movies", get(list_movies).post(create_movie))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateMovieRequest {
    #[validate(length(min = 1, max = 300))]
    title: String,
    description: Option<String>,
    #[validate(range(min = 1, max = 600))]
    duration_minutes: Option<i32>,
    language: Option<String>,
}

// POST /api/movies
async fn create_movie(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateMovieRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden(
            "Добавлять фильмы может только админ".to_string(),
        ));
    }

    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let movie: Movie = sqlx::query_as(
        "INSERT INTO movies (title, description, duration_minutes, language)
         VALUES ($1, $2, $3, $4)
         RETURNING id, title, description, duration_minutes, language, created_at",
    )
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.duration_minutes)
    .bind(&req.language)
    .fetch_one(&state.db.pool)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "data": movie, "message": "Фильм добавлен" })),
    ))
}

// GET /api/movies
async fn list_movies(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let movies: Vec<Movie> = sqlx::query_as(
        "SELECT id, title, description, duration_minutes, language, created_at
         FROM movies ORDER BY title",
    )
    .fetch_all(&state.db.pool)
    .await?;

    Ok((StatusCode::OK, Json(json!({ "data": movies }))))
}
