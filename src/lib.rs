//! # savta-mail
//!
//! Transactional email for Help Savta: one service, a primary provider with a
//! single fallback, built-in templates, and a per-attempt delivery log.
//!
//! ## Quick Start
//!
//! Set environment variables:
//! ```bash
//! SENDGRID_API_KEY=SG.xxxxx
//! SMTP_HOST=smtp.example.com
//! SMTP_USER=mailer
//! SMTP_PASS=secret
//! EMAIL_FROM=noreply@helpsavta.org
//! ```
//!
//! Build the service once at startup and share it:
//! ```rust,ignore
//! use savta_mail::{EmailConfig, EmailService};
//! use serde_json::json;
//!
//! let service = EmailService::from_config(&EmailConfig::from_env()?);
//!
//! let delivered = service
//!     .send("request-created", "user@example.com", &json!({"id": 999, "full_name": "Test User"}))
//!     .await?;
//! ```
//!
//! `send` returns `Ok(false)` when email is not configured or every provider
//! failed, and `Err` only for caller bugs (bad address, unknown template,
//! unusable context). See [`EmailService`] for the full contract.
//!
//! ## Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `SENDGRID_API_KEY` | Enables the SendGrid provider |
//! | `SENDGRID_BASE_URL` | Override the SendGrid API base URL |
//! | `SENDGRID_DISABLE_TRACKING` | Disable click/open tracking (default: `true`) |
//! | `SMTP_HOST` | Enables the SMTP provider |
//! | `SMTP_PORT` | SMTP port (default: 587, or 465 with implicit TLS) |
//! | `SMTP_USER` / `SMTP_PASS` | SMTP credentials |
//! | `SMTP_SECURE` | `true` (implicit TLS), `false` (STARTTLS), `none` |
//! | `EMAIL_FROM` | Sender address, required for any provider |
//! | `EMAIL_FROM_NAME` | Sender display name (default: `Help Savta`) |
//! | `EMAIL_REPLY_TO` | Reply-To address |
//! | `EMAIL_PRIMARY_PROVIDER` | `sendgrid` or `smtp` (default: `sendgrid`) |
//! | `EMAIL_TIMEOUT_SECS` | Per-attempt timeout (default: 10) |
//!
//! ## Feature Flags
//!
//! - `sendgrid` - SendGrid API provider (default)
//! - `smtp` - SMTP provider via lettre (default)
//! - `metrics` - Prometheus-style metrics (counters/histograms)
//! - `cli` - The `savta-mail-check` diagnostic binary
//!
//! ## Metrics
//!
//! Enable `features = ["metrics"]` to emit:
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `savta_mail_emails_total` | Counter | provider, status | Delivery attempts |
//! | `savta_mail_delivery_duration_seconds` | Histogram | provider | Attempt duration |
//! | `savta_mail_fallback_total` | Counter | provider | Fallback attempts |
//!
//! Install a recorder (e.g., `metrics-exporter-prometheus`) in your app to collect them.

/// The version of the savta-mail crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod address;
mod config;
mod delivery_log;
mod error;
mod mailer;
mod message;
mod service;
mod template;

pub mod providers;

// Re-exports
pub use address::{Address, ToAddress};
pub use config::{
    EmailConfig, ProviderConfig, ProviderKind, SendGridConfig, Sender, SmtpConfig, TlsMode,
    Transport, DEFAULT_FROM_NAME, DEFAULT_TIMEOUT,
};
pub use delivery_log::{DeliveryLog, DeliveryOutcome, MemoryDeliveryLog, TracingDeliveryLog};
pub use error::MailError;
pub use mailer::{DeliveryResult, Mailer};
pub use message::EmailMessage;
pub use service::{EmailService, EmailServiceBuilder, TestEmailKind};
pub use template::{
    AdminNewRequest, BuiltinTemplates, ConnectionTest, RenderedTemplate, RequestCompleted,
    RequestCreated, RequestStatus, StatusUpdate, TemplateId, TemplateResolver,
};

/// Prelude for convenient imports.
///
/// ```rust
/// use savta_mail::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Address, DeliveryLog, DeliveryOutcome, EmailConfig, EmailMessage, EmailService, MailError,
        Mailer, RequestStatus, TemplateId, TemplateResolver, TestEmailKind,
    };
}
