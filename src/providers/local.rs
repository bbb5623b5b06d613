//! Local mailer for development and testing.
//!
//! Stores messages in memory for programmatic assertions, and can be told to
//! fail so tests can exercise the fallback path.
//!
//! # Testing Usage
//!
//! ```rust,ignore
//! use savta_mail::providers::LocalMailer;
//! use savta_mail::EmailService;
//!
//! #[tokio::test]
//! async fn falls_back_to_smtp() {
//!     let primary = LocalMailer::named("sendgrid");
//!     let fallback = LocalMailer::named("smtp");
//!     primary.set_failure("401 Unauthorized");
//!
//!     let service = EmailService::builder()
//!         .primary(primary.clone())
//!         .fallback(fallback.clone())
//!         .build();
//!
//!     // ... send ...
//!     assert_eq!(fallback.message_count(), 1);
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::MailError;
use crate::mailer::{DeliveryResult, Mailer};
use crate::message::EmailMessage;

/// A message captured by [`LocalMailer`].
#[derive(Debug, Clone)]
pub struct StoredMessage {
    /// Identifier returned as the delivery message id.
    pub id: String,
    pub message: EmailMessage,
    pub sent_at: DateTime<Utc>,
}

#[derive(Default)]
struct Shared {
    messages: RwLock<Vec<StoredMessage>>,
    fail_with: RwLock<Option<String>>,
    attempts: AtomicUsize,
}

/// Local mailer that stores messages in memory.
///
/// Clones share storage, failure state and the attempt counter, so a test
/// can keep one handle while the service owns another.
#[derive(Clone)]
pub struct LocalMailer {
    name: &'static str,
    shared: Arc<Shared>,
}

impl LocalMailer {
    /// Create a new local mailer reporting itself as `"local"`.
    pub fn new() -> Self {
        Self::named("local")
    }

    /// Create a local mailer with a custom provider name.
    ///
    /// Useful when two instances stand in for primary and fallback.
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            shared: Arc::default(),
        }
    }

    // =========================================================================
    // Failure Simulation (for testing)
    // =========================================================================

    /// Make every delivery and connection test fail with this message.
    pub fn set_failure(&self, message: impl Into<String>) {
        *self.shared.fail_with.write() = Some(message.into());
    }

    /// Clear the failure state.
    pub fn clear_failure(&self) {
        *self.shared.fail_with.write() = None;
    }

    fn check_failure(&self) -> Result<(), MailError> {
        match *self.shared.fail_with.read() {
            Some(ref message) => Err(MailError::Send(message.clone())),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Message Access (for testing assertions)
    // =========================================================================

    /// All captured messages, oldest first.
    pub fn messages(&self) -> Vec<StoredMessage> {
        self.shared.messages.read().clone()
    }

    /// The most recently captured message.
    pub fn last_message(&self) -> Option<StoredMessage> {
        self.shared.messages.read().last().cloned()
    }

    /// Number of captured messages.
    pub fn message_count(&self) -> usize {
        self.shared.messages.read().len()
    }

    /// Number of `deliver` calls, successful or not.
    pub fn attempt_count(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Check if a message was sent to a specific address.
    pub fn sent_to(&self, email: &str) -> bool {
        self.shared
            .messages
            .read()
            .iter()
            .any(|stored| stored.message.to.email.eq_ignore_ascii_case(email))
    }

    /// Remove and return all captured messages.
    pub fn flush(&self) -> Vec<StoredMessage> {
        std::mem::take(&mut *self.shared.messages.write())
    }
}

impl Default for LocalMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mailer for LocalMailer {
    async fn deliver(&self, message: &EmailMessage) -> Result<DeliveryResult, MailError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let stored = StoredMessage {
            id: uuid::Uuid::new_v4().to_string(),
            message: message.clone(),
            sent_at: Utc::now(),
        };
        let id = stored.id.clone();
        self.shared.messages.write().push(stored);

        tracing::debug!(provider = self.name, message_id = %id, "Message captured");
        Ok(DeliveryResult::new(id))
    }

    async fn test_connection(&self) -> Result<(), MailError> {
        self.check_failure()
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(subject: &str) -> EmailMessage {
        EmailMessage::new("recipient@example.com")
            .subject(subject)
            .text_body("Hello!")
    }

    #[tokio::test]
    async fn test_captures_messages() {
        let mailer = LocalMailer::new();

        let result = mailer.deliver(&message("Test Subject")).await.unwrap();
        assert!(!result.message_id.is_empty());

        assert_eq!(mailer.message_count(), 1);
        assert_eq!(mailer.attempt_count(), 1);
        assert!(mailer.sent_to("RECIPIENT@example.com"));
        assert_eq!(mailer.last_message().unwrap().id, result.message_id);
    }

    #[tokio::test]
    async fn test_can_fail() {
        let mailer = LocalMailer::new();
        mailer.set_failure("Simulated failure");

        let result = mailer.deliver(&message("Test")).await;
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Simulated failure"));
        assert!(mailer.test_connection().await.is_err());
        assert_eq!(mailer.attempt_count(), 1);
        assert_eq!(mailer.message_count(), 0);

        mailer.clear_failure();
        assert!(mailer.deliver(&message("Test")).await.is_ok());
        assert!(mailer.test_connection().await.is_ok());
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let mailer = LocalMailer::named("primary");
        let cloned = mailer.clone();

        cloned.deliver(&message("Via clone")).await.unwrap();
        assert_eq!(mailer.message_count(), 1);

        mailer.set_failure("down");
        assert!(cloned.deliver(&message("Fails")).await.is_err());
        assert_eq!(cloned.provider_name(), "primary");
    }

    #[tokio::test]
    async fn test_flush() {
        let mailer = LocalMailer::new();
        mailer.deliver(&message("Email 1")).await.unwrap();
        mailer.deliver(&message("Email 2")).await.unwrap();

        let flushed = mailer.flush();
        assert_eq!(flushed.len(), 2);
        assert_eq!(flushed[0].message.subject, "Email 1");
        assert_eq!(mailer.message_count(), 0);
    }
}
