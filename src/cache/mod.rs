use crate::{database::Database, redis_client::RedisClient};
use tracing::info;

pub mod auth;
pub mod seats;
pub mod shows;

#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    db: Database,
}

impl CacheService {
    pub fn new(redis: RedisClient, db: Database) -> Self {
        Self { redis, db }
    }

    // Прогрев кеша при старте
    pub async fn warmup_cache(&self) {
        info!("Starting cache warmup...");

        let shows = self.get_upcoming_shows().await;
        info!("Loaded {} upcoming shows", shows.len());

        // Карты мест ближайших сеансов
        let warm = shows.iter().take(3).map(|s| self.get_show_seats(s.id));
        futures::future::join_all(warm).await;

        info!("Cache warmup done");
    }
}
