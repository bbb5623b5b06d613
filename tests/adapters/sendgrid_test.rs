//! SendGrid adapter tests against a mock HTTP server.

use savta_mail::providers::SendGridMailer;
use savta_mail::{EmailMessage, MailError, Mailer, SendGridConfig, Sender};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helper Functions
// ============================================================================

fn sender() -> Sender {
    Sender::new(("Help Savta", "noreply@helpsavta.org"))
}

fn mailer(server: &MockServer) -> SendGridMailer {
    SendGridMailer::new("SG.test-api-key", sender()).base_url(server.uri())
}

fn valid_message() -> EmailMessage {
    EmailMessage::new("rivka@example.com")
        .subject("Help Savta: your request #999 was received")
        .text_body("Hello")
        .html_body("<h1>Hello</h1>")
}

fn success_response() -> ResponseTemplate {
    ResponseTemplate::new(202).insert_header("X-Message-Id", "123-xyz")
}

// ============================================================================
// Delivery Tests
// ============================================================================

#[tokio::test]
async fn successful_delivery_returns_message_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .and(header("Authorization", "Bearer SG.test-api-key"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({
            "personalizations": [{"to": [{"email": "rivka@example.com"}]}],
            "from": {"email": "noreply@helpsavta.org", "name": "Help Savta"},
            "subject": "Help Savta: your request #999 was received",
            "content": [
                {"type": "text/plain", "value": "Hello"},
                {"type": "text/html", "value": "<h1>Hello</h1>"}
            ],
            "tracking_settings": {
                "click_tracking": {"enable": false, "enable_text": false},
                "open_tracking": {"enable": false}
            }
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    let delivery = mailer(&server).deliver(&valid_message()).await.unwrap();
    assert_eq!(delivery.message_id, "123-xyz");
}

#[tokio::test]
async fn metadata_is_sent_as_custom_args() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .and(body_json(json!({
            "personalizations": [{
                "to": [{"email": "rivka@example.com"}],
                "custom_args": {"request_id": "999", "template": "request-created"}
            }],
            "from": {"email": "noreply@helpsavta.org", "name": "Help Savta"},
            "subject": "Help Savta: your request #999 was received",
            "content": [{"type": "text/plain", "value": "Hello"}]
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    let message = EmailMessage::new("rivka@example.com")
        .subject("Help Savta: your request #999 was received")
        .text_body("Hello")
        .tag("template", "request-created")
        .tag("request_id", "999");

    let result = mailer(&server)
        .disable_tracking(false)
        .deliver(&message)
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn missing_message_id_header_still_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let delivery = mailer(&server).deliver(&valid_message()).await.unwrap();
    assert!(!delivery.message_id.is_empty());
}

#[tokio::test]
async fn empty_body_is_rejected_before_any_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(success_response())
        .expect(0)
        .mount(&server)
        .await;

    let message = EmailMessage::new("rivka@example.com").subject("No body");
    let err = mailer(&server).deliver(&message).await.unwrap_err();
    assert!(matches!(err, MailError::Build(_)));
}

// ============================================================================
// Error Mapping Tests
// ============================================================================

#[tokio::test]
async fn unauthorized_maps_to_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errors": [{"message": "The provided authorization grant is invalid, expired, or revoked", "field": null}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = mailer(&server).deliver(&valid_message()).await.unwrap_err();
    match err {
        MailError::Provider {
            provider,
            message,
            status,
        } => {
            assert_eq!(provider, "sendgrid");
            assert_eq!(status, Some(401));
            assert!(message.contains("authorization grant is invalid"));
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn multiple_errors_are_joined() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [
                {"message": "Invalid from address"},
                {"message": "Subject is required"}
            ]
        })))
        .mount(&server)
        .await;

    let err = mailer(&server).deliver(&valid_message()).await.unwrap_err();
    assert!(err
        .to_string()
        .contains("Invalid from address; Subject is required"));
}

#[tokio::test]
async fn non_json_error_uses_status_reason() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = mailer(&server).deliver(&valid_message()).await.unwrap_err();
    match err {
        MailError::Provider { status, message, .. } => {
            assert_eq!(status, Some(503));
            assert_eq!(message, "Service Unavailable");
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn configured_timeout_cuts_off_slow_responses() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(success_response().set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let mut config = SendGridConfig::new("SG.test-api-key");
    config.base_url = Some(server.uri());
    config.timeout = Duration::from_millis(200);
    let mailer = SendGridMailer::from_config(&config, sender()).unwrap();

    let err = mailer.deliver(&valid_message()).await.unwrap_err();
    assert!(matches!(err, MailError::Http(_)));
}

// ============================================================================
// Connection Test
// ============================================================================

#[tokio::test]
async fn connection_test_reads_scopes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/scopes"))
        .and(header("Authorization", "Bearer SG.test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"scopes": ["mail.send"]})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(mailer(&server).test_connection().await.is_ok());
}

#[tokio::test]
async fn connection_test_fails_on_bad_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/scopes"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    assert!(mailer(&server).test_connection().await.is_err());
}

#[test]
fn empty_api_key_fails_validation() {
    let mailer = SendGridMailer::new("  ", sender());
    assert!(mailer.validate_config().is_err());
    assert_eq!(mailer.provider_name(), "sendgrid");
}
