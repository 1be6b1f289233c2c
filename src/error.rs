use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Единая таксономия ошибок API.
///
/// Все обработчики возвращают `Result<_, ApiError>`; до первой мутации любая
/// ошибка прерывает запрос без побочных эффектов, ошибки внутри транзакции
/// приводят к её откату целиком.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Сущность (сеанс, кинотеатр, бронирование, место) не существует.
    #[error("{0}")]
    NotFound(String),

    /// Запрошенные места уже заняты либо ресурс конфликтует с существующим.
    #[error("{0}")]
    Conflict(String),

    /// Нарушение владения или роли.
    #[error("{0}")]
    Forbidden(String),

    /// Операция несовместима с текущим состоянием (например, отмена оплаченной брони).
    #[error("{0}")]
    InvalidState(String),

    /// Некорректный запрос: пустой список мест, неверная планировка и т.п.
    #[error("{0}")]
    Validation(String),

    #[error("Ошибка базы данных")]
    Database(#[from] sqlx::Error),

    /// Платёжный шлюз недоступен или вернул ошибку.
    #[error("Ошибка платёжного шлюза: {0}")]
    Gateway(String),

    #[error("Внутренняя ошибка сервера")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::InvalidState(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Нарушение уникальности превращаем в Conflict с понятным сообщением,
/// остальные ошибки БД пробрасываем как есть.
pub fn conflict_on_unique(e: sqlx::Error, message: &str) -> ApiError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ApiError::Conflict(message.to_string())
        }
        _ => ApiError::Database(e),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Database(ref e) => tracing::error!("database error: {:?}", e),
            ApiError::Internal(ref msg) => tracing::error!("internal error: {}", msg),
            _ => {}
        }
        let status = self.status_code();
        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            ApiError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::InvalidState("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Gateway("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn message_passes_through() {
        let e = ApiError::InvalidState("Бронь уже оплачена".into());
        assert_eq!(e.to_string(), "Бронь уже оплачена");
    }
}
