use cinema_system::config::{CircuitBreakerConfig, PaymentConfig};
use cinema_system::services::payment::{CircuitBreakerError, PaymentGatewayClient};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(base_url: String, failure_threshold: u32) -> PaymentGatewayClient {
    let payment = PaymentConfig {
        provider: "stripe".to_string(),
        merchant_id: "merchant-1".to_string(),
        merchant_password: "secret".to_string(),
        gateway_url: base_url,
        success_url: "https://shop.example/payment/success".to_string(),
        fail_url: "https://shop.example/payment/fail".to_string(),
        webhook_url: "https://shop.example/api/payments/webhook".to_string(),
        currency: "INR".to_string(),
    };
    let breaker = CircuitBreakerConfig {
        failure_threshold,
        timeout_seconds: 60,
    };
    PaymentGatewayClient::from_config(&payment, &breaker)
}

#[tokio::test]
async fn create_payment_parses_gateway_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/payments/init"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "paymentId": "pay-123",
            "paymentURL": "https://pay.example/p/123",
            "expiresAt": "2026-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(server.uri(), 5);
    let response = client
        .create_payment(
            15000,
            "booking-1-abc".to_string(),
            "Тестовый фильм - 2 билет(ов)".to_string(),
            Some("user@example.com".to_string()),
        )
        .await
        .expect("gateway call should succeed");

    assert!(response.success);
    assert_eq!(response.payment_id.as_deref(), Some("pay-123"));
    assert_eq!(
        response.payment_url.as_deref(),
        Some("https://pay.example/p/123")
    );
}

#[tokio::test]
async fn gateway_error_message_is_passed_through() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/payments/init"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Invalid merchant"
        })))
        .mount(&server)
        .await;

    let client = client_for(server.uri(), 5);
    let response = client
        .create_payment(100, "booking-2-x".to_string(), "x".to_string(), None)
        .await
        .expect("transport should succeed even when gateway declines");

    assert!(!response.success);
    assert_eq!(response.message.as_deref(), Some("Invalid merchant"));
    assert!(response.payment_id.is_none());
}

#[tokio::test]
async fn check_payment_status_reports_confirmed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/payments/check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "status": "CONFIRMED",
            "paymentId": "pay-123",
            "amount": 15000,
            "orderId": "booking-1-abc"
        })))
        .mount(&server)
        .await;

    let client = client_for(server.uri(), 5);
    let response = client
        .check_payment_status("pay-123")
        .await
        .expect("status check should succeed");

    assert!(response.success);
    assert_eq!(response.status.as_deref(), Some("CONFIRMED"));
    assert_eq!(response.amount, Some(15000));
}

#[tokio::test]
async fn breaker_opens_after_repeated_gateway_failures() {
    let server = MockServer::start().await;

    // Невалидный ответ: каждый вызов завершается ошибкой разбора
    Mock::given(method("POST"))
        .and(path("/api/v1/payments/check"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = client_for(server.uri(), 2);

    for _ in 0..2 {
        let result = client.check_payment_status("pay-1").await;
        assert!(matches!(
            result,
            Err(CircuitBreakerError::PaymentGatewayError(_))
        ));
    }

    // Порог достигнут: следующий вызов блокируется без обращения к сети
    let blocked = client.check_payment_status("pay-1").await;
    assert!(matches!(blocked, Err(CircuitBreakerError::Open)));
}
