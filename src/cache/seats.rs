use crate::cache::CacheService;
use crate::models::SeatStatus;
use redis::AsyncCommands;
use tracing::info;

impl CacheService {
    // Полная карта мест сеанса в порядке ряд-номер
    pub async fn get_show_seats(&self, show_id: i64) -> Vec<SeatStatus> {
        // Сначала пробуем кеш
        if let Ok(seats) = self.get_seats_from_cache(show_id).await {
            return seats;
        }

        // Если кеш не работает - идем в БД
        if let Ok(seats) = self.load_seats_from_db(show_id).await {
            let _ = self.save_seats_to_cache(show_id, &seats).await;
            return seats;
        }

        vec![]
    }

    // Инвалидировать кеш мест сеанса - зовётся после каждой мутации статусов
    pub async fn invalidate_seats(&self, show_id: i64) {
        let key = format!("seats:{}", show_id);
        let mut conn = self.redis.conn.clone();
        let _: Result<(), _> = conn.del(&key).await;
        info!("Invalidated seats cache for show {}", show_id);
    }

    // === Работа с БД ===

    async fn load_seats_from_db(&self, show_id: i64) -> Result<Vec<SeatStatus>, sqlx::Error> {
        sqlx::query_as::<_, SeatStatus>(&format!(
            "SELECT {} FROM seat_status
             WHERE show_id = $1
             ORDER BY row_letter, seat_column",
            SeatStatus::COLUMNS
        ))
        .bind(show_id)
        .fetch_all(&self.db.pool)
        .await
    }

    // === Работа с кешем ===

    async fn get_seats_from_cache(&self, show_id: i64) -> Result<Vec<SeatStatus>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let key = format!("seats:{}", show_id);
        let data: String = conn.get(key).await?;
        let seats: Vec<SeatStatus> = serde_json::from_str(&data)
            .map_err(|_| redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error")))?;
        Ok(seats)
    }

    async fn save_seats_to_cache(
        &self,
        show_id: i64,
        seats: &[SeatStatus],
    ) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(seats)
            .map_err(|_| redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error")))?;
        let key = format!("seats:{}", show_id);
        let mut conn = self.redis.conn.clone();
        conn.set_ex(key, data, 86400).await // 24 часа
    }
}
