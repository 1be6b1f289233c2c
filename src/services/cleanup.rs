use std::sync::Arc;
use tracing::{error, info, warn};

use crate::services::booking;
use crate::AppState;

/// Фоновая очистка просроченных удержаний.
///
/// Мягкое удержание ограничено по времени: если оплата не пришла за окно
/// `booking.hold_minutes`, бронь переводится в 'expired', а её места
/// возвращаются в свободный пул. Гонка с одновременным подтверждением оплаты
/// или отменой разрешается в `expire_booking` блокировкой строки брони.
pub struct CleanupService {
    state: Arc<AppState>,
}

impl CleanupService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Один проход очистки: ищет и истекает просроченные брони.
    pub async fn run_expiry_sweep(&self) {
        let candidates: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT b.id
            FROM bookings b
            JOIN seat_status s ON s.booking_id = b.id
            WHERE b.booking_status = 'active'
              AND b.payment_status = 'pending'
              AND s.is_reserved = TRUE
              AND s.reservation_expiry < NOW()
            "#,
        )
        .fetch_all(&self.state.db.pool)
        .await
        .unwrap_or_default();

        if candidates.is_empty() {
            info!("🎫 No expired bookings to release");
            return;
        }

        info!("🎫 Found {} expired bookings to release", candidates.len());

        for booking_id in candidates {
            match booking::expire_booking(&self.state, booking_id).await {
                Ok(true) => {
                    info!("🎫 Booking {} expired, seats released", booking_id);
                }
                Ok(false) => {
                    // Успели оплатить или отменить, пока бронь ждала в списке
                    warn!("🎫 Booking {} skipped (state changed)", booking_id);
                }
                Err(e) => {
                    error!("🎫 Failed to expire booking {}: {:?}", booking_id, e);
                }
            }
        }
    }
}
