//! The provider-neutral email message.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::address::{Address, ToAddress};
use crate::template::RenderedTemplate;

/// A single outgoing email, before any provider has touched it.
///
/// Sender and reply-to are not part of the message: each provider adapter
/// applies its own configured [`Sender`](crate::Sender).
///
/// ```
/// use savta_mail::EmailMessage;
///
/// let message = EmailMessage::new("user@example.com")
///     .subject("Your request was received")
///     .text_body("We got it.")
///     .html_body("<p>We got it.</p>")
///     .tag("template", "request-created");
///
/// assert_eq!(message.to.email, "user@example.com");
/// assert_eq!(message.metadata.get("template").map(String::as_str), Some("request-created"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Recipient
    pub to: Address,
    /// Subject line
    pub subject: String,
    /// Plain text body
    pub text_body: Option<String>,
    /// HTML body
    pub html_body: Option<String>,
    /// Tracking/correlation tags. Forwarded to providers that support them.
    pub metadata: BTreeMap<String, String>,
}

impl EmailMessage {
    /// Create an empty message for one recipient.
    pub fn new(to: impl ToAddress) -> Self {
        Self {
            to: to.to_address(),
            subject: String::new(),
            text_body: None,
            html_body: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Build a message from a resolved template.
    pub fn from_template(to: impl ToAddress, rendered: RenderedTemplate) -> Self {
        Self::new(to)
            .subject(rendered.subject)
            .text_body(rendered.text)
            .html_body(rendered.html)
    }

    /// Set the subject line.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the plain text body.
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.text_body = Some(body.into());
        self
    }

    /// Set the HTML body.
    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.html_body = Some(body.into());
        self
    }

    /// Attach a metadata tag. Later values replace earlier ones.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Check if there is anything to send.
    pub fn has_body(&self) -> bool {
        self.text_body.is_some() || self.html_body.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;

    #[test]
    fn test_builder() {
        let message = EmailMessage::new("recipient@example.com")
            .subject("Test")
            .text_body("Hello");

        assert_eq!(message.to.email, "recipient@example.com");
        assert_eq!(message.subject, "Test");
        assert_eq!(message.text_body, Some("Hello".to_string()));
        assert!(message.html_body.is_none());
        assert!(message.has_body());
    }

    #[test]
    fn test_empty_message_has_no_body() {
        let message = EmailMessage::new("recipient@example.com");
        assert!(!message.has_body());
        assert!(message.metadata.is_empty());
    }

    #[test]
    fn test_with_name() {
        let message = EmailMessage::new(("Test User", "user@example.com"));
        assert_eq!(message.to.name.as_deref(), Some("Test User"));
    }

    #[test]
    fn test_tag_replaces_value() {
        let message = EmailMessage::new("user@example.com")
            .tag("request_id", "1")
            .tag("request_id", "2");

        assert_eq!(message.metadata.len(), 1);
        assert_eq!(message.metadata["request_id"], "2");
    }

    #[test]
    fn test_from_template() {
        let rendered = RenderedTemplate {
            subject: "Subject".to_string(),
            text: "text".to_string(),
            html: "<p>html</p>".to_string(),
        };
        let message = EmailMessage::from_template(Address::new("user@example.com"), rendered);

        assert_eq!(message.subject, "Subject");
        assert_eq!(message.text_body.as_deref(), Some("text"));
        assert_eq!(message.html_body.as_deref(), Some("<p>html</p>"));
    }

    #[test]
    fn test_to_address_trait() {
        struct Requester {
            full_name: String,
            email: String,
        }

        impl ToAddress for Requester {
            fn to_address(&self) -> Address {
                Address::with_name(&self.full_name, &self.email)
            }
        }

        let requester = Requester {
            full_name: "Rivka Cohen".to_string(),
            email: "rivka@example.com".to_string(),
        };

        let message = EmailMessage::new(&requester);
        assert_eq!(message.to.email, "rivka@example.com");
        assert_eq!(message.to.name.as_deref(), Some("Rivka Cohen"));
    }
}
