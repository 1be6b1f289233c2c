use crate::cache::CacheService;
use crate::models::Show;
use redis::AsyncCommands;

impl CacheService {
    // Ближайшие сеансы (сегодня и позже)
    pub async fn get_upcoming_shows(&self) -> Vec<Show> {
        // Сначала пробуем кеш
        if let Ok(shows) = self.get_shows_from_cache().await {
            return shows;
        }

        // Если кеш не работает - идем в БД
        if let Ok(shows) = self.load_shows_from_db().await {
            let _ = self.save_shows_to_cache(&shows).await;
            return shows;
        }

        vec![]
    }

    // Инвалидировать список сеансов (создание/удаление сеанса)
    pub async fn invalidate_shows(&self) {
        let mut conn = self.redis.conn.clone();
        let _: Result<(), _> = conn.del("shows:upcoming").await;
    }

    async fn load_shows_from_db(&self) -> Result<Vec<Show>, sqlx::Error> {
        sqlx::query_as::<_, Show>(&format!(
            "SELECT {} FROM shows
             WHERE show_date >= CURRENT_DATE
             ORDER BY show_date, show_time",
            Show::COLUMNS
        ))
        .fetch_all(&self.db.pool)
        .await
    }

    // === Работа с кешем ===

    async fn get_shows_from_cache(&self) -> Result<Vec<Show>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let data: String = conn.get("shows:upcoming").await?;
        let shows: Vec<Show> = serde_json::from_str(&data)
            .map_err(|_| redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error")))?;
        Ok(shows)
    }

    async fn save_shows_to_cache(&self, shows: &[Show]) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(shows)
            .map_err(|_| redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error")))?;
        let mut conn = self.redis.conn.clone();
        conn.set_ex("shows:upcoming", data, 3600).await // 1 час
    }
}
