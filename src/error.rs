//! Error types for savta-mail.

use thiserror::Error;

/// Errors that can occur while configuring the service or sending email.
///
/// Ordinary delivery failures are reported by providers through this type but
/// never escape [`EmailService::send`](crate::EmailService::send); only
/// [programming errors](MailError::is_programming_error) do.
#[derive(Debug, Clone, Error)]
pub enum MailError {
    /// Configuration error (malformed env var, invalid value, etc.)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid email address format.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// No template is registered under this identifier.
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    /// Template context did not match the template, or rendering failed.
    #[error("Template error: {0}")]
    Template(String),

    /// Error building the wire message.
    #[error("Build error: {0}")]
    Build(String),

    /// Error sending the email.
    #[error("Send error: {0}")]
    Send(String),

    /// Provider-specific error with details.
    #[error("Provider error ({provider}{}): {message}", status_suffix(.status))]
    Provider {
        provider: &'static str,
        message: String,
        /// Optional HTTP status code
        status: Option<u16>,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// The delivery log rejected an outcome record.
    #[error("Delivery log error: {0}")]
    DeliveryLog(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(", HTTP {}", code),
        None => String::new(),
    }
}

impl MailError {
    /// Create a provider error with HTTP status.
    pub fn provider_with_status(
        provider: &'static str,
        message: impl Into<String>,
        status: u16,
    ) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
            status: Some(status),
        }
    }

    /// Caller bugs that no retry or fallback can fix.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress(_) | Self::UnknownTemplate(_) | Self::Template(_)
        )
    }
}

#[cfg(feature = "sendgrid")]
impl From<reqwest::Error> for MailError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<serde_json::Error> for MailError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<askama::Error> for MailError {
    fn from(err: askama::Error) -> Self {
        Self::Template(err.to_string())
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        Self::Build(err.to_string())
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::Send(err.to_string())
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::address::AddressError> for MailError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}
