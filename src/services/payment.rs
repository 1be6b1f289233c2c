//! Клиент внешнего платёжного шлюза.
//!
//! Шлюз для ядра непрозрачен: мы создаем платёжную сессию, а результат
//! узнаем либо из вебхука, либо опросом статуса. Все сетевые вызовы идут
//! через Circuit Breaker, чтобы недоступный шлюз не выедал пул соединений.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::{CircuitBreakerConfig, PaymentConfig};

/// Состояния "Автоматического выключателя" (Circuit Breaker).
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    /// Нормальный режим, запросы разрешены.
    Closed,
    /// Шлюз признан недоступным, запросы блокируются до таймаута.
    Open,
    /// Пробный режим после таймаута: разрешен один тестовый запрос.
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: RwLock<CircuitState>,
    failure_count: AtomicU32,
    last_failure: Mutex<Option<Instant>>,
    failure_threshold: u32,
    timeout_duration: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout_seconds: u64) -> Self {
        Self {
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            last_failure: Mutex::new(None),
            failure_threshold,
            timeout_duration: Duration::from_secs(timeout_seconds),
        }
    }

    /// Можно ли выполнить следующий запрос к шлюзу.
    pub fn can_execute(&self) -> bool {
        let state = self.state.read().unwrap();

        match *state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = self
                    .last_failure
                    .lock()
                    .unwrap()
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);

                if elapsed >= self.timeout_duration {
                    drop(state);
                    *self.state.write().unwrap() = CircuitState::HalfOpen;
                    info!("Circuit breaker transitioning to HalfOpen state");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.write().unwrap();

        match *state {
            CircuitState::HalfOpen => {
                *state = CircuitState::Closed;
                self.failure_count.store(0, Ordering::Relaxed);
                info!("Circuit breaker recovered - transitioning to Closed state");
            }
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn record_failure(&self) {
        let failure_count = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        *self.last_failure.lock().unwrap() = Some(Instant::now());

        let mut state = self.state.write().unwrap();

        match *state {
            CircuitState::Closed => {
                if failure_count >= self.failure_threshold {
                    *state = CircuitState::Open;
                    error!(
                        "Circuit breaker OPENED - {} failures reached threshold {}",
                        failure_count, self.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                *state = CircuitState::Open;
                warn!("Circuit breaker test failed - returning to Open state");
            }
            _ => {}
        }
    }

    pub fn get_state(&self) -> CircuitState {
        self.state.read().unwrap().clone()
    }
}

/// Ошибки при работе через Circuit Breaker.
#[derive(Debug)]
pub enum CircuitBreakerError {
    /// Выключатель разомкнут, запрос заблокирован без обращения к сети.
    Open,
    /// Ошибка HTTP-клиента.
    PaymentGatewayError(reqwest::Error),
}

impl std::fmt::Display for CircuitBreakerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitBreakerError::Open => {
                write!(f, "Circuit breaker is open - payment gateway temporarily unavailable")
            }
            CircuitBreakerError::PaymentGatewayError(e) => {
                write!(f, "Payment gateway error: {}", e)
            }
        }
    }
}

impl std::error::Error for CircuitBreakerError {}

// --- Модели данных для API платёжного шлюза ---

#[derive(Debug, Serialize)]
struct PaymentInitRequest {
    #[serde(rename = "merchantId")]
    merchant_id: String,
    token: String,
    amount: i64,
    #[serde(rename = "orderId")]
    order_id: String,
    currency: String,
    description: String,
    #[serde(rename = "successURL")]
    success_url: String,
    #[serde(rename = "failURL")]
    fail_url: String,
    #[serde(rename = "notificationURL")]
    notification_url: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentInitResponse {
    pub success: bool,
    #[serde(rename = "paymentId")]
    pub payment_id: Option<String>,
    #[serde(rename = "paymentURL")]
    pub payment_url: Option<String>,
    #[serde(rename = "expiresAt")]
    pub expires_at: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
struct PaymentCheckRequest {
    #[serde(rename = "merchantId")]
    merchant_id: String,
    token: String,
    #[serde(rename = "paymentId")]
    payment_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentCheckResponse {
    pub success: bool,
    pub status: Option<String>,
    #[serde(rename = "paymentId")]
    pub payment_id: Option<String>,
    pub amount: Option<i64>,
    #[serde(rename = "orderId")]
    pub order_id: Option<String>,
    pub message: Option<String>,
}

/// Клиент платёжного шлюза. Не держит состояния приложения - только
/// конфигурацию, HTTP-клиент и общий Circuit Breaker.
#[derive(Clone)]
pub struct PaymentGatewayClient {
    merchant_id: String,
    password: String,
    base_url: String,
    success_url: String,
    fail_url: String,
    webhook_url: String,
    currency: String,
    http_client: reqwest::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl PaymentGatewayClient {
    pub fn from_config(payment: &PaymentConfig, breaker: &CircuitBreakerConfig) -> Self {
        Self {
            merchant_id: payment.merchant_id.clone(),
            password: payment.merchant_password.clone(),
            base_url: payment.gateway_url.clone(),
            success_url: payment.success_url.clone(),
            fail_url: payment.fail_url.clone(),
            webhook_url: payment.webhook_url.clone(),
            currency: payment.currency.clone(),
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            circuit_breaker: Arc::new(CircuitBreaker::new(
                breaker.failure_threshold,
                breaker.timeout_seconds,
            )),
        }
    }

    async fn execute_with_circuit_breaker<F, T>(&self, operation: F) -> Result<T, CircuitBreakerError>
    where
        F: std::future::Future<Output = Result<T, reqwest::Error>>,
    {
        if !self.circuit_breaker.can_execute() {
            warn!("Circuit breaker is OPEN - blocking payment gateway request");
            return Err(CircuitBreakerError::Open);
        }

        match operation.await {
            Ok(result) => {
                self.circuit_breaker.record_success();
                Ok(result)
            }
            Err(e) => {
                error!("Payment gateway request failed: {:?}", e);
                self.circuit_breaker.record_failure();
                Err(CircuitBreakerError::PaymentGatewayError(e))
            }
        }
    }

    /// Токен запроса на создание платежа.
    fn generate_init_token(&self, amount: i64, order_id: &str) -> String {
        let token_string = format!(
            "{}{}{}{}{}",
            amount, self.currency, order_id, self.password, self.merchant_id
        );
        let mut hasher = Sha256::new();
        hasher.update(token_string.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Токен запроса на проверку статуса платежа.
    fn generate_check_token(&self, payment_id: &str) -> String {
        let token_string = format!("{}{}{}", payment_id, self.password, self.merchant_id);
        let mut hasher = Sha256::new();
        hasher.update(token_string.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Создает платёжную сессию. `amount` - в минорных единицах валюты.
    pub async fn create_payment(
        &self,
        amount: i64,
        order_id: String,
        description: String,
        email: Option<String>,
    ) -> Result<PaymentInitResponse, CircuitBreakerError> {
        let token = self.generate_init_token(amount, &order_id);

        let request = PaymentInitRequest {
            merchant_id: self.merchant_id.clone(),
            token,
            amount,
            order_id,
            currency: self.currency.clone(),
            description,
            success_url: self.success_url.clone(),
            fail_url: self.fail_url.clone(),
            notification_url: self.webhook_url.clone(),
            email,
        };

        info!(
            "Creating payment session: amount={}, currency={}, breaker={:?}",
            amount,
            self.currency,
            self.circuit_breaker.get_state()
        );

        let operation = async {
            self.http_client
                .post(format!("{}/api/v1/payments/init", self.base_url))
                .json(&request)
                .send()
                .await?
                .json::<PaymentInitResponse>()
                .await
        };

        self.execute_with_circuit_breaker(operation).await
    }

    /// Опрашивает статус платежа.
    pub async fn check_payment_status(
        &self,
        payment_id: &str,
    ) -> Result<PaymentCheckResponse, CircuitBreakerError> {
        let token = self.generate_check_token(payment_id);

        let request = PaymentCheckRequest {
            merchant_id: self.merchant_id.clone(),
            token,
            payment_id: payment_id.to_string(),
        };

        let operation = async {
            self.http_client
                .post(format!("{}/api/v1/payments/check", self.base_url))
                .json(&request)
                .send()
                .await?
                .json::<PaymentCheckResponse>()
                .await
        };

        self.execute_with_circuit_breaker(operation).await
    }

    pub fn can_reach_gateway(&self) -> bool {
        self.circuit_breaker.can_execute()
    }

    pub fn get_circuit_breaker_status(&self) -> (CircuitState, u32) {
        (
            self.circuit_breaker.get_state(),
            self.circuit_breaker.failure_count.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, 60);
        assert!(breaker.can_execute());

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Closed);

        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Open);
        assert!(!breaker.can_execute());
    }

    #[test]
    fn breaker_half_open_after_timeout_then_recovers() {
        let breaker = CircuitBreaker::new(1, 0);
        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Open);

        // Таймаут нулевой: следующий вызов сразу переводит в HalfOpen
        assert!(breaker.can_execute());
        assert_eq!(breaker.get_state(), CircuitState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.get_state(), CircuitState::Closed);
    }

    #[test]
    fn breaker_reopens_on_failed_probe() {
        let breaker = CircuitBreaker::new(1, 0);
        breaker.record_failure();
        assert!(breaker.can_execute());
        assert_eq!(breaker.get_state(), CircuitState::HalfOpen);

        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Open);
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(3, 60);
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        // Серия сбоев прервана успехом - порог не достигнут
        assert_eq!(breaker.get_state(), CircuitState::Closed);
    }

    fn test_client() -> PaymentGatewayClient {
        let payment = PaymentConfig {
            provider: "stripe".to_string(),
            merchant_id: "merchant-1".to_string(),
            merchant_password: "secret".to_string(),
            gateway_url: "http://localhost:0".to_string(),
            success_url: "http://localhost/ok".to_string(),
            fail_url: "http://localhost/fail".to_string(),
            webhook_url: "http://localhost/hook".to_string(),
            currency: "INR".to_string(),
        };
        let breaker = CircuitBreakerConfig {
            failure_threshold: 5,
            timeout_seconds: 60,
        };
        PaymentGatewayClient::from_config(&payment, &breaker)
    }

    #[test]
    fn init_token_is_deterministic() {
        let client = test_client();
        let a = client.generate_init_token(15000, "booking-1-abc");
        let b = client.generate_init_token(15000, "booking-1-abc");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64); // hex-строка sha256

        let other = client.generate_init_token(15001, "booking-1-abc");
        assert_ne!(a, other);
    }

    #[test]
    fn check_token_depends_on_payment_id() {
        let client = test_client();
        assert_ne!(
            client.generate_check_token("pay-1"),
            client.generate_check_token("pay-2")
        );
    }
}
