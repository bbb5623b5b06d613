//! The unified email service.
//!
//! [`EmailService`] is the one entry point the rest of Help Savta uses to send
//! mail. It owns an ordered list of providers (a primary and at most one
//! fallback), a [`TemplateResolver`] and a [`DeliveryLog`], all fixed at
//! construction time.
//!
//! ```rust,ignore
//! use savta_mail::{EmailConfig, EmailService, RequestCreated};
//! use std::sync::Arc;
//!
//! let service = Arc::new(EmailService::from_config(&EmailConfig::from_env()?));
//!
//! // In the request-creation handler, after the insert commits:
//! let request = RequestCreated { id: 999, full_name: "Test User".into() };
//! if !service.send_request_created_email("user@example.com", &request).await? {
//!     tracing::warn!(request_id = 999, "Confirmation email was not delivered");
//! }
//! ```
//!
//! # Delivery contract
//!
//! - Malformed recipient, unknown template, or a context the template cannot
//!   use: `Err(..)`, configured or not. Nothing is sent and nothing is logged.
//! - Not configured: `send` returns `Ok(false)` after validation, without
//!   any network I/O.
//! - Otherwise the primary is tried, then the fallback once if the primary
//!   failed. Attempts are strictly sequential. Each one is appended to the
//!   delivery log, and the result is `Ok(true)` as soon as one succeeds.
//!
//! Provider health is not remembered between calls: every send starts with
//! the primary.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::Instrument;

#[cfg(feature = "metrics")]
use std::time::Instant;

use crate::address::Address;
use crate::config::EmailConfig;
use crate::delivery_log::{DeliveryLog, DeliveryOutcome, TracingDeliveryLog};
use crate::error::MailError;
use crate::mailer::Mailer;
use crate::message::EmailMessage;
use crate::template::{
    AdminNewRequest, BuiltinTemplates, RequestCompleted, RequestCreated, StatusUpdate, TemplateId,
    TemplateResolver,
};

/// Primary plus one fallback.
const MAX_PROVIDERS: usize = 2;

/// Fixed diagnostic emails for operational smoke-testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestEmailKind {
    /// A plain "email is working" message.
    Basic,
    /// The request confirmation, with sample data.
    RequestCreated,
    /// A status update, with sample data.
    StatusUpdate,
    /// The completion notice, with sample data.
    RequestCompleted,
}

impl TestEmailKind {
    pub const ALL: [TestEmailKind; 4] = [
        Self::Basic,
        Self::RequestCreated,
        Self::StatusUpdate,
        Self::RequestCompleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::RequestCreated => "request-created",
            Self::StatusUpdate => "status-update",
            Self::RequestCompleted => "request-completed",
        }
    }

    /// The template this kind renders.
    pub fn template(&self) -> TemplateId {
        match self {
            Self::Basic => TemplateId::ConnectionTest,
            Self::RequestCreated => TemplateId::RequestCreated,
            Self::StatusUpdate => TemplateId::StatusUpdate,
            Self::RequestCompleted => TemplateId::RequestCompleted,
        }
    }

    /// Sample context for the template.
    pub fn sample_context(&self) -> Value {
        match self {
            Self::Basic => serde_json::json!({ "sent_at": chrono::Utc::now().to_rfc3339() }),
            Self::RequestCreated | Self::RequestCompleted => {
                serde_json::json!({ "id": 999, "full_name": "Test User" })
            }
            Self::StatusUpdate => serde_json::json!({
                "id": 999,
                "full_name": "Test User",
                "status": "in_progress",
                "message": "This is a test status update from Help Savta."
            }),
        }
    }
}

impl fmt::Display for TestEmailKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestEmailKind {
    type Err = MailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| {
                MailError::Configuration(format!(
                    "Unknown test email kind: {}. Valid kinds are: basic, request-created, status-update, request-completed",
                    s
                ))
            })
    }
}

/// Unified email service with single-step fallback.
///
/// Cheap to clone; share it between handlers with `Arc` or by cloning.
#[derive(Clone)]
pub struct EmailService {
    providers: Vec<Arc<dyn Mailer>>,
    templates: Arc<dyn TemplateResolver>,
    delivery_log: Arc<dyn DeliveryLog>,
}

impl EmailService {
    pub fn builder() -> EmailServiceBuilder {
        EmailServiceBuilder::default()
    }

    /// Build the service from startup configuration, with the built-in
    /// templates and the tracing delivery log.
    pub fn from_config(config: &EmailConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// True iff at least one provider has a valid configuration.
    pub fn is_ready(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Configured provider identifiers, primary first.
    pub fn providers(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.provider_name()).collect()
    }

    /// Handshake with the primary provider. Never errors; any failure is `false`.
    pub async fn test_connection(&self) -> bool {
        let Some(primary) = self.providers.first() else {
            tracing::warn!("Email connection test skipped: no provider configured");
            return false;
        };

        match primary.test_connection().await {
            Ok(()) => {
                tracing::info!(provider = primary.provider_name(), "Email connection test passed");
                true
            }
            Err(e) => {
                tracing::warn!(
                    provider = primary.provider_name(),
                    error = %e,
                    "Email connection test failed"
                );
                false
            }
        }
    }

    /// Handshake with every configured provider, in priority order.
    pub async fn test_all_connections(&self) -> Vec<(&'static str, Result<(), MailError>)> {
        let mut results = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            results.push((provider.provider_name(), provider.test_connection().await));
        }
        results
    }

    /// Render `template_id` with `context` and deliver it to `recipient`.
    ///
    /// Returns `Ok(false)` when the service is not configured or every
    /// provider failed. Returns `Err` only for caller bugs: an invalid
    /// recipient, an unknown template, or a context the template rejects.
    pub async fn send(
        &self,
        template_id: &str,
        recipient: &str,
        context: &Value,
    ) -> Result<bool, MailError> {
        self.send_inner(template_id, recipient, context, None).await
    }

    /// Send one of the fixed diagnostic emails. Same contract as [`send`](Self::send).
    pub async fn send_test_email(
        &self,
        kind: TestEmailKind,
        recipient: &str,
    ) -> Result<bool, MailError> {
        let context = kind.sample_context();
        self.send_inner(kind.template().as_str(), recipient, &context, None)
            .await
    }

    /// Confirmation to the requester after a help request is created.
    pub async fn send_request_created_email(
        &self,
        recipient: &str,
        request: &RequestCreated,
    ) -> Result<bool, MailError> {
        self.send_typed(TemplateId::RequestCreated, recipient, request, request.id)
            .await
    }

    /// Notice to the requester after an admin changes the request status.
    pub async fn send_status_update_email(
        &self,
        recipient: &str,
        update: &StatusUpdate,
    ) -> Result<bool, MailError> {
        self.send_typed(TemplateId::StatusUpdate, recipient, update, update.id)
            .await
    }

    /// Notice to the requester once the request is done.
    pub async fn send_request_completed_email(
        &self,
        recipient: &str,
        request: &RequestCompleted,
    ) -> Result<bool, MailError> {
        self.send_typed(TemplateId::RequestCompleted, recipient, request, request.id)
            .await
    }

    /// Alert to the admin mailbox about a new request.
    pub async fn send_admin_new_request_email(
        &self,
        recipient: &str,
        request: &AdminNewRequest,
    ) -> Result<bool, MailError> {
        self.send_typed(TemplateId::AdminNewRequest, recipient, request, request.id)
            .await
    }

    async fn send_typed<T: Serialize>(
        &self,
        template: TemplateId,
        recipient: &str,
        payload: &T,
        request_id: i64,
    ) -> Result<bool, MailError> {
        let context = serde_json::to_value(payload)?;
        self.send_inner(template.as_str(), recipient, &context, Some(request_id))
            .await
    }

    async fn send_inner(
        &self,
        template_id: &str,
        recipient: &str,
        context: &Value,
        request_id: Option<i64>,
    ) -> Result<bool, MailError> {
        let to = Address::parse(recipient)?;
        let rendered = self.templates.resolve(template_id, context)?;

        if !self.is_ready() {
            tracing::warn!(
                template = template_id,
                "Email service is not configured; message not sent"
            );
            return Ok(false);
        }

        let mut message = EmailMessage::from_template(to, rendered).tag("template", template_id);
        if let Some(id) = request_id {
            message = message.tag("request_id", id.to_string());
        }

        let span = tracing::info_span!(
            "savta_mail.send",
            template = template_id,
            to = %message.to.email,
        );

        Ok(self.deliver(template_id, &message).instrument(span).await)
    }

    /// Try each provider in order until one accepts the message.
    async fn deliver(&self, template_id: &str, message: &EmailMessage) -> bool {
        for (index, mailer) in self.providers.iter().enumerate() {
            let attempt = (index + 1) as u8;
            let provider = mailer.provider_name();

            if attempt > 1 {
                tracing::info!(provider, "Falling back to secondary email provider");
                #[cfg(feature = "metrics")]
                metrics::counter!("savta_mail_fallback_total", "provider" => provider).increment(1);
            }

            #[cfg(feature = "metrics")]
            let start = Instant::now();

            let result = mailer.deliver(message).await;

            #[cfg(feature = "metrics")]
            {
                let status = if result.is_ok() { "success" } else { "error" };
                metrics::counter!("savta_mail_emails_total", "provider" => provider, "status" => status)
                    .increment(1);
                metrics::histogram!("savta_mail_delivery_duration_seconds", "provider" => provider)
                    .record(start.elapsed().as_secs_f64());
            }

            match result {
                Ok(delivery) => {
                    tracing::info!(
                        provider,
                        attempt,
                        message_id = %delivery.message_id,
                        "Email delivered"
                    );
                    self.record(DeliveryOutcome::succeeded(
                        provider,
                        template_id,
                        &message.to.email,
                        attempt,
                        delivery.message_id,
                    ))
                    .await;
                    return true;
                }
                Err(e) => {
                    tracing::warn!(provider, attempt, error = %e, "Email delivery attempt failed");
                    self.record(DeliveryOutcome::failed(
                        provider,
                        template_id,
                        &message.to.email,
                        attempt,
                        e.to_string(),
                    ))
                    .await;
                }
            }
        }

        tracing::error!(
            providers = ?self.providers(),
            "Email delivery failed on every configured provider"
        );
        false
    }

    async fn record(&self, outcome: DeliveryOutcome) {
        if let Err(e) = self.delivery_log.append(outcome).await {
            tracing::warn!(error = %e, "Failed to record delivery outcome");
        }
    }
}

impl fmt::Debug for EmailService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailService")
            .field("providers", &self.providers())
            .finish_non_exhaustive()
    }
}

/// Builder for [`EmailService`].
///
/// ```rust,ignore
/// let service = EmailService::builder()
///     .config(&EmailConfig::from_env()?)
///     .delivery_log(PgDeliveryLog::new(pool))
///     .build();
/// ```
#[derive(Default)]
pub struct EmailServiceBuilder {
    providers: Vec<Arc<dyn Mailer>>,
    templates: Option<Arc<dyn TemplateResolver>>,
    delivery_log: Option<Arc<dyn DeliveryLog>>,
}

impl EmailServiceBuilder {
    /// Put a provider in front of all others.
    pub fn primary<M: Mailer + 'static>(mut self, mailer: M) -> Self {
        self.providers.insert(0, Arc::new(mailer));
        self
    }

    /// Append a provider after those already added.
    pub fn fallback<M: Mailer + 'static>(mut self, mailer: M) -> Self {
        self.providers.push(Arc::new(mailer));
        self
    }

    /// Append every provider from startup configuration, in its order.
    ///
    /// Providers whose adapter cannot be built (e.g. feature not compiled in)
    /// are skipped with a warning.
    pub fn config(mut self, config: &EmailConfig) -> Self {
        for provider in config.providers() {
            match provider.build_mailer() {
                Ok(mailer) => self.providers.push(mailer),
                Err(e) => tracing::warn!(
                    provider = provider.kind().as_str(),
                    error = %e,
                    "Email provider skipped"
                ),
            }
        }
        self
    }

    pub fn templates<R: TemplateResolver + 'static>(mut self, resolver: R) -> Self {
        self.templates = Some(Arc::new(resolver));
        self
    }

    pub fn delivery_log<L: DeliveryLog + 'static>(mut self, log: L) -> Self {
        self.delivery_log = Some(Arc::new(log));
        self
    }

    pub fn build(self) -> EmailService {
        let mut providers: Vec<Arc<dyn Mailer>> = self
            .providers
            .into_iter()
            .filter(|mailer| match mailer.validate_config() {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(
                        provider = mailer.provider_name(),
                        error = %e,
                        "Email provider has invalid configuration and will not be used"
                    );
                    false
                }
            })
            .collect();

        if providers.len() > MAX_PROVIDERS {
            tracing::warn!(
                configured = providers.len(),
                "Only a primary and one fallback provider are used; ignoring the rest"
            );
            providers.truncate(MAX_PROVIDERS);
        }

        let service = EmailService {
            providers,
            templates: self
                .templates
                .unwrap_or_else(|| Arc::new(BuiltinTemplates::new())),
            delivery_log: self
                .delivery_log
                .unwrap_or_else(|| Arc::new(TracingDeliveryLog::new())),
        };

        if service.is_ready() {
            tracing::info!(providers = ?service.providers(), "Email service ready");
        } else {
            tracing::warn!("Email service has no configured provider; emails will not be sent");
        }

        service
    }
}
