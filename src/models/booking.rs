use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::error::ApiError;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub show_id: i64,
    pub theater_id: i64,
    pub movie_id: i64,
    pub exhibitor_id: i64,
    pub total_price: f64,
    pub booking_status: String,
    pub payment_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub const COLUMNS: &'static str = "id, user_id, show_id, theater_id, movie_id, exhibitor_id, \
         total_price, booking_status, payment_status, created_at, updated_at";

    pub fn state(&self) -> Option<BookingState> {
        BookingState::from_columns(&self.booking_status, &self.payment_status)
    }
}

// Бронь вместе с развёрнутым списком её мест - форма ответа API
#[derive(Debug, Serialize)]
pub struct BookingWithSeats {
    #[serde(flatten)]
    pub booking: Booking,
    pub seats: Vec<crate::models::SeatStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    Pending,
    Paid,
}

/// Состояние брони одним значением вместо пары текстовых колонок.
///
/// В хранилище остаются колонки `booking_status`/`payment_status`, но все
/// проверки переходов идут через этот тип, чтобы недопустимые комбинации
/// отсекались в одном месте.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingState {
    Active { payment: PaymentState },
    Cancelled,
    Expired,
}

impl BookingState {
    pub fn from_columns(booking_status: &str, payment_status: &str) -> Option<Self> {
        let payment = match payment_status {
            "pending" => PaymentState::Pending,
            "paid" => PaymentState::Paid,
            _ => return None,
        };
        match booking_status {
            "active" => Some(BookingState::Active { payment }),
            "cancelled" => Some(BookingState::Cancelled),
            "expired" => Some(BookingState::Expired),
            _ => None,
        }
    }

    /// Отмена: владелец отменяет только неоплаченную активную бронь,
    /// оплаченную - только админ (путь возврата средств).
    pub fn ensure_cancellable(self, is_admin: bool) -> Result<(), ApiError> {
        match self {
            BookingState::Active {
                payment: PaymentState::Pending,
            } => Ok(()),
            BookingState::Active {
                payment: PaymentState::Paid,
            } => {
                if is_admin {
                    Ok(())
                } else {
                    Err(ApiError::InvalidState(
                        "Нельзя отменить бронь со статусом оплаты 'paid'".to_string(),
                    ))
                }
            }
            BookingState::Cancelled => {
                Err(ApiError::InvalidState("Бронь уже отменена".to_string()))
            }
            BookingState::Expired => {
                Err(ApiError::InvalidState("Срок брони уже истёк".to_string()))
            }
        }
    }

    /// Подтверждение оплаты. Возвращает true, если бронь уже оплачена -
    /// повторная доставка подтверждения не должна ничего менять.
    pub fn ensure_payable(self) -> Result<bool, ApiError> {
        match self {
            BookingState::Active {
                payment: PaymentState::Pending,
            } => Ok(false),
            BookingState::Active {
                payment: PaymentState::Paid,
            } => Ok(true),
            BookingState::Cancelled => Err(ApiError::InvalidState(
                "Бронь отменена, оплата невозможна".to_string(),
            )),
            BookingState::Expired => Err(ApiError::InvalidState(
                "Срок брони истёк, оплата невозможна".to_string(),
            )),
        }
    }

    /// Истечение срока удержания применимо только к неоплаченной активной брони.
    pub fn is_expirable(self) -> bool {
        matches!(
            self,
            BookingState::Active {
                payment: PaymentState::Pending
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_pending() -> BookingState {
        BookingState::from_columns("active", "pending").unwrap()
    }

    fn active_paid() -> BookingState {
        BookingState::from_columns("active", "paid").unwrap()
    }

    #[test]
    fn owner_cancels_pending_booking() {
        assert!(active_pending().ensure_cancellable(false).is_ok());
    }

    #[test]
    fn owner_cannot_cancel_paid_booking() {
        let err = active_paid().ensure_cancellable(false).unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
        // Сообщение должно называть текущий статус оплаты
        assert!(err.to_string().contains("paid"));
    }

    #[test]
    fn admin_override_cancels_paid_booking() {
        assert!(active_paid().ensure_cancellable(true).is_ok());
    }

    #[test]
    fn cancelled_booking_rejects_everything() {
        let state = BookingState::Cancelled;
        assert!(state.ensure_cancellable(true).is_err());
        assert!(state.ensure_payable().is_err());
        assert!(!state.is_expirable());
    }

    #[test]
    fn payment_confirmation_is_idempotent() {
        assert_eq!(active_pending().ensure_payable().unwrap(), false);
        assert_eq!(active_paid().ensure_payable().unwrap(), true);
    }

    #[test]
    fn only_pending_active_bookings_expire() {
        assert!(active_pending().is_expirable());
        assert!(!active_paid().is_expirable());
        assert!(!BookingState::Expired.is_expirable());
    }

    #[test]
    fn unknown_columns_are_rejected() {
        assert!(BookingState::from_columns("active", "refunded").is_none());
        assert!(BookingState::from_columns("archived", "pending").is_none());
    }
}
