//! Mailer trait and delivery result types.
//!
//! # Why `async_trait`?
//!
//! The service holds its providers as `Arc<dyn Mailer>` so that the
//! transport can be chosen from configuration at startup (and swapped for a
//! [`LocalMailer`](crate::providers::LocalMailer) in tests). Native async
//! trait methods are not object-safe, so the futures are boxed. Email
//! delivery is dominated by network latency; the allocation does not matter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MailError;
use crate::message::EmailMessage;

/// Result of a successful email delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResult {
    /// Message ID assigned by the provider
    pub message_id: String,
}

impl DeliveryResult {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
        }
    }
}

/// One email transport (SendGrid, SMTP, in-memory).
///
/// Implementations apply their configured sender and reply-to, never mutate
/// the message, and translate every transport failure into a [`MailError`]:
/// no transport-specific error type crosses this boundary.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a single message. `Ok` means the provider accepted it.
    async fn deliver(&self, message: &EmailMessage) -> Result<DeliveryResult, MailError>;

    /// Lightweight reachability/authentication check.
    ///
    /// Must not send any email.
    async fn test_connection(&self) -> Result<(), MailError> {
        Ok(())
    }

    /// Get the provider name (for logging and delivery outcomes).
    fn provider_name(&self) -> &'static str {
        "unknown"
    }

    /// Validate configuration.
    ///
    /// Called when the service is built; a provider that fails here is not
    /// used.
    fn validate_config(&self) -> Result<(), MailError> {
        Ok(())
    }
}
