//! Local adapter tests.

use savta_mail::providers::LocalMailer;
use savta_mail::{EmailMessage, Mailer};

fn message(to: &str) -> EmailMessage {
    EmailMessage::new(to)
        .subject("Help Savta: email delivery test")
        .text_body("Hello!")
}

#[tokio::test]
async fn deliver_returns_ok() {
    let mailer = LocalMailer::new();
    assert!(mailer.deliver(&message("rivka@example.com")).await.is_ok());
    assert_eq!(mailer.provider_name(), "local");
}

#[tokio::test]
async fn captures_sent_emails() {
    let mailer = LocalMailer::new();

    mailer.deliver(&message("rivka@example.com")).await.unwrap();
    mailer.deliver(&message("moshe@example.com")).await.unwrap();

    let messages = mailer.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].message.to.email, "rivka@example.com");
    assert_eq!(messages[1].message.to.email, "moshe@example.com");
    assert!(mailer.sent_to("moshe@example.com"));
    assert!(!mailer.sent_to("nobody@example.com"));
}

#[tokio::test]
async fn failure_counts_attempts_without_capturing() {
    let mailer = LocalMailer::named("smtp");
    mailer.set_failure("connection refused");

    for _ in 0..3 {
        assert!(mailer.deliver(&message("rivka@example.com")).await.is_err());
    }

    assert_eq!(mailer.attempt_count(), 3);
    assert_eq!(mailer.message_count(), 0);
}
