//! SMTP provider using lettre.
//!
//! # Example
//!
//! ```rust,ignore
//! use savta_mail::providers::SmtpMailer;
//! use savta_mail::{Sender, SmtpConfig};
//!
//! let config = SmtpConfig::new("smtp.example.com", 587).credentials("username", "password");
//! let mailer = SmtpMailer::from_config(&config, Sender::new("noreply@example.com"))?;
//! ```

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::address::Address;
use crate::config::{Sender, SmtpConfig, TlsMode};
use crate::error::MailError;
use crate::mailer::{DeliveryResult, Mailer};
use crate::message::EmailMessage;

/// SMTP email provider.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Sender,
    host: String,
}

impl SmtpMailer {
    /// Build the transport from startup configuration.
    ///
    /// Fails if TLS was requested and cannot be set up for the host; the
    /// transport is never downgraded to plaintext.
    pub fn from_config(config: &SmtpConfig, sender: Sender) -> Result<Self, MailError> {
        let builder = match config.tls {
            TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| tls_setup_error(&config.host, e))?,
            TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| tls_setup_error(&config.host, e))?,
        };
        let mut builder = builder.port(config.port).timeout(Some(config.timeout));

        if let Some(ref username) = config.username {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                config.password.clone().unwrap_or_default(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            sender,
            host: config.host.clone(),
        })
    }

    /// SMTP mailer for a local relay (no TLS, no auth).
    pub fn localhost(sender: Sender) -> Self {
        Self {
            transport: AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous("localhost")
                .port(25)
                .build(),
            sender,
            host: "localhost".to_string(),
        }
    }

    /// Build a lettre Message from an EmailMessage.
    fn build_message(&self, message: &EmailMessage) -> Result<Message, MailError> {
        let mut builder = Message::builder()
            .from(address_to_mailbox(&self.sender.from)?)
            .to(address_to_mailbox(&message.to)?)
            .subject(&message.subject);

        if let Some(ref reply_to) = self.sender.reply_to {
            builder = builder.reply_to(address_to_mailbox(reply_to)?);
        }

        // Metadata tags have no SMTP equivalent; they stay in the delivery log.
        let built = match (&message.html_body, &message.text_body) {
            (Some(html), Some(text)) => {
                builder.multipart(MultiPart::alternative_plain_html(text.clone(), html.clone()))?
            }
            (Some(html), None) => builder.header(ContentType::TEXT_HTML).body(html.clone())?,
            (None, Some(text)) => builder.header(ContentType::TEXT_PLAIN).body(text.clone())?,
            (None, None) => {
                return Err(MailError::Build(
                    "message has neither text nor HTML body".into(),
                ))
            }
        };

        Ok(built)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn deliver(&self, message: &EmailMessage) -> Result<DeliveryResult, MailError> {
        let built = self.build_message(message)?;

        let response = self
            .transport
            .send(built)
            .await
            .map_err(|e| MailError::Send(e.to_string()))?;

        // Extract message ID from SMTP response, or generate one
        let message_id = response
            .message()
            .next()
            .and_then(|m| m.lines().next())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(DeliveryResult::new(message_id))
    }

    async fn test_connection(&self) -> Result<(), MailError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(MailError::Send(format!(
                "SMTP server {} did not accept the connection",
                self.host
            ))),
            Err(e) => Err(MailError::Send(e.to_string())),
        }
    }

    fn provider_name(&self) -> &'static str {
        "smtp"
    }

    fn validate_config(&self) -> Result<(), MailError> {
        if self.host.trim().is_empty() {
            return Err(MailError::Configuration("SMTP host is empty".into()));
        }
        address_to_mailbox(&self.sender.from).map(|_| ())
    }
}

/// Convert an Address to lettre's Mailbox.
fn address_to_mailbox(addr: &Address) -> Result<Mailbox, MailError> {
    let email = addr
        .email
        .parse()
        .map_err(|e: lettre::address::AddressError| MailError::InvalidAddress(e.to_string()))?;

    Ok(Mailbox::new(addr.name.clone(), email))
}

fn tls_setup_error(host: &str, e: lettre::transport::smtp::Error) -> MailError {
    MailError::Configuration(format!("SMTP TLS setup failed for {}: {}", host, e))
}
