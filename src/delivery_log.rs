//! Delivery outcome records and the sinks that receive them.
//!
//! Every delivery attempt made by [`EmailService`](crate::EmailService)
//! produces one [`DeliveryOutcome`], appended to a [`DeliveryLog`]. The log
//! is append-only from the service's point of view, and an append failure
//! never changes what `send` reports to its caller.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::MailError;

/// The result of one delivery attempt against one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub id: Uuid,
    /// Provider identifier (`sendgrid`, `smtp`, ...).
    pub provider: String,
    pub template_id: String,
    pub recipient: String,
    /// 1 for the primary attempt, 2 for the fallback.
    pub attempt: u8,
    pub success: bool,
    /// Provider message id, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Error detail, on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl DeliveryOutcome {
    /// Record a successful attempt.
    pub fn succeeded(
        provider: impl Into<String>,
        template_id: impl Into<String>,
        recipient: impl Into<String>,
        attempt: u8,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider: provider.into(),
            template_id: template_id.into(),
            recipient: recipient.into(),
            attempt,
            success: true,
            message_id: Some(message_id.into()),
            error: None,
            attempted_at: Utc::now(),
        }
    }

    /// Record a failed attempt.
    pub fn failed(
        provider: impl Into<String>,
        template_id: impl Into<String>,
        recipient: impl Into<String>,
        attempt: u8,
        error: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider: provider.into(),
            template_id: template_id.into(),
            recipient: recipient.into(),
            attempt,
            success: false,
            message_id: None,
            error: Some(error.into()),
            attempted_at: Utc::now(),
        }
    }
}

/// Persistence sink for delivery outcomes.
///
/// Implement this over the application's database table. Implementations
/// must accept concurrent appends; no ordering is required between
/// unrelated messages.
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    async fn append(&self, outcome: DeliveryOutcome) -> Result<(), MailError>;
}

#[async_trait]
impl<T: DeliveryLog + ?Sized> DeliveryLog for Arc<T> {
    async fn append(&self, outcome: DeliveryOutcome) -> Result<(), MailError> {
        (**self).append(outcome).await
    }
}

/// Delivery log that emits one tracing event per outcome.
///
/// This is the default sink when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDeliveryLog;

impl TracingDeliveryLog {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DeliveryLog for TracingDeliveryLog {
    async fn append(&self, outcome: DeliveryOutcome) -> Result<(), MailError> {
        if outcome.success {
            tracing::info!(
                target: "savta_mail::delivery",
                outcome_id = %outcome.id,
                provider = %outcome.provider,
                template = %outcome.template_id,
                to = %outcome.recipient,
                attempt = outcome.attempt,
                message_id = outcome.message_id.as_deref().unwrap_or(""),
                "Delivery succeeded"
            );
        } else {
            tracing::warn!(
                target: "savta_mail::delivery",
                outcome_id = %outcome.id,
                provider = %outcome.provider,
                template = %outcome.template_id,
                to = %outcome.recipient,
                attempt = outcome.attempt,
                error = outcome.error.as_deref().unwrap_or(""),
                "Delivery failed"
            );
        }
        Ok(())
    }
}

/// Thread-safe in-memory delivery log.
///
/// Used in tests and by the diagnostic binary to report what happened.
#[derive(Debug, Default)]
pub struct MemoryDeliveryLog {
    outcomes: RwLock<Vec<DeliveryOutcome>>,
}

impl MemoryDeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log wrapped in an Arc for sharing with the service.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// All outcomes, in append order.
    pub fn all(&self) -> Vec<DeliveryOutcome> {
        self.outcomes.read().clone()
    }

    pub fn count(&self) -> usize {
        self.outcomes.read().len()
    }

    pub fn last(&self) -> Option<DeliveryOutcome> {
        self.outcomes.read().last().cloned()
    }

    pub fn clear(&self) {
        self.outcomes.write().clear();
    }

    /// Remove and return all outcomes.
    pub fn flush(&self) -> Vec<DeliveryOutcome> {
        std::mem::take(&mut *self.outcomes.write())
    }
}

#[async_trait]
impl DeliveryLog for MemoryDeliveryLog {
    async fn append(&self, outcome: DeliveryOutcome) -> Result<(), MailError> {
        self.outcomes.write().push(outcome);
        Ok(())
    }
}
