use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::models::User;

// Аутентифицированный вызывающий. Ядро само никого не аутентифицирует,
// только проверяет владение и роль (user | exhibitor | admin).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub first_name: String,
    pub surname: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    pub fn is_exhibitor(&self) -> bool {
        self.role == "exhibitor" || self.role == "admin"
    }
}

// Отпечаток пароля для ключа кеша: bcrypt дорогой, поэтому удачная
// авторизация кешируется по (email, sha256(password))
fn password_fingerprint(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

// Basic Auth extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Получаем заголовок Authorization
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        // Проверяем что это Basic auth
        let encoded = auth_header
            .strip_prefix("Basic ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        // Декодируем base64
        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

        // Разделяем email:password
        let mut parts_iter = credentials.splitn(2, ':');
        let email = parts_iter.next().ok_or(StatusCode::UNAUTHORIZED)?;
        let password = parts_iter.next().ok_or(StatusCode::UNAUTHORIZED)?;

        let fingerprint = password_fingerprint(password);

        // Сначала пробуем кеш авторизации
        if state.config.features.enable_auth_cache {
            if let Ok(Some(cached)) = state.cache.get_cached_auth_user(email, &fingerprint).await {
                if let Ok(user) = serde_json::from_str::<AuthUser>(&cached) {
                    return Ok(user);
                }
            }
        }

        let user = User::find_by_email(email, &state.db)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        if !user.verify_password(password) {
            return Err(StatusCode::UNAUTHORIZED);
        }

        let auth_user = AuthUser {
            user_id: user.user_id,
            email: user.email,
            first_name: user.first_name,
            surname: user.surname,
            role: user.role,
        };

        if state.config.features.enable_auth_cache {
            if let Ok(json) = serde_json::to_string(&auth_user) {
                let _ = state
                    .cache
                    .cache_auth_user(email, &fingerprint, &json, 300)
                    .await;
            }
        }

        // Обновляем last_logged_in не чаще чем раз в 15 минут
        if state.cache.should_update_last_login(auth_user.user_id).await {
            sqlx::query("UPDATE users SET last_logged_in = NOW() WHERE user_id = $1")
                .bind(auth_user.user_id)
                .execute(&state.db.pool)
                .await
                .ok();
        }

        Ok(auth_user)
    }
}
