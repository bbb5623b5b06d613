//! SendGrid API provider.
//!
//! # Example
//!
//! ```rust,ignore
//! use savta_mail::providers::SendGridMailer;
//! use savta_mail::Sender;
//!
//! let mailer = SendGridMailer::new("SG.xxxxx", Sender::new(("Help Savta", "noreply@example.com")));
//! ```
//!
//! Message metadata is sent as `custom_args`, so tags such as the template id
//! and request id come back in SendGrid event webhooks. Open and click
//! tracking are disabled unless explicitly turned on: recipients are often
//! elderly users and the product promises not to track them.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::address::Address;
use crate::config::{SendGridConfig, Sender};
use crate::error::MailError;
use crate::mailer::{DeliveryResult, Mailer};
use crate::message::EmailMessage;

const SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3";

/// SendGrid API email provider.
pub struct SendGridMailer {
    api_key: String,
    client: Client,
    base_url: String,
    sender: Sender,
    disable_tracking: bool,
}

impl SendGridMailer {
    /// Create a new SendGrid mailer with the given API key and sender.
    pub fn new(api_key: impl Into<String>, sender: Sender) -> Self {
        Self::with_client(api_key, sender, Client::new())
    }

    /// Create with a custom reqwest client.
    pub fn with_client(api_key: impl Into<String>, sender: Sender, client: Client) -> Self {
        Self {
            api_key: api_key.into(),
            client,
            base_url: SENDGRID_API_URL.to_string(),
            sender,
            disable_tracking: true,
        }
    }

    /// Create from startup configuration, applying its timeout.
    pub fn from_config(config: &SendGridConfig, sender: Sender) -> Result<Self, MailError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MailError::Configuration(format!("SendGrid client: {}", e)))?;

        let mut mailer = Self::with_client(&config.api_key, sender, client)
            .disable_tracking(config.disable_tracking);
        if let Some(ref url) = config.base_url {
            mailer = mailer.base_url(url);
        }
        Ok(mailer)
    }

    /// Set a custom base URL (for testing).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Enable or disable open/click tracking suppression.
    pub fn disable_tracking(mut self, disabled: bool) -> Self {
        self.disable_tracking = disabled;
        self
    }

    fn build_request(&self, message: &EmailMessage) -> Result<SendGridRequest, MailError> {
        if !message.has_body() {
            return Err(MailError::Build("message has neither text nor HTML body".into()));
        }

        // SendGrid requires text/plain before text/html.
        let mut content = Vec::new();
        if let Some(ref text) = message.text_body {
            content.push(SendGridContent {
                content_type: "text/plain".to_string(),
                value: text.clone(),
            });
        }
        if let Some(ref html) = message.html_body {
            content.push(SendGridContent {
                content_type: "text/html".to_string(),
                value: html.clone(),
            });
        }

        let tracking_settings = if self.disable_tracking {
            Some(TrackingSettings {
                click_tracking: ClickTracking {
                    enable: false,
                    enable_text: false,
                },
                open_tracking: OpenTracking { enable: false },
            })
        } else {
            None
        };

        Ok(SendGridRequest {
            personalizations: vec![SendGridPersonalization {
                to: vec![SendGridAddress::from(&message.to)],
                custom_args: if message.metadata.is_empty() {
                    None
                } else {
                    Some(message.metadata.clone())
                },
            }],
            from: SendGridAddress::from(&self.sender.from),
            reply_to: self.sender.reply_to.as_ref().map(SendGridAddress::from),
            subject: message.subject.clone(),
            content,
            tracking_settings,
        })
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn deliver(&self, message: &EmailMessage) -> Result<DeliveryResult, MailError> {
        let request = self.build_request(message)?;

        let url = format!("{}/mail/send", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("User-Agent", format!("savta-mail/{}", crate::VERSION))
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        // SendGrid returns 202 Accepted on success with no body
        if status.is_success() {
            let message_id = response
                .headers()
                .get("X-Message-Id")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            Ok(DeliveryResult::new(message_id))
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn test_connection(&self) -> Result<(), MailError> {
        // Any authenticated read works; /scopes is the cheapest.
        let url = format!("{}/scopes", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header("User-Agent", format!("savta-mail/{}", crate::VERSION))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }

    fn provider_name(&self) -> &'static str {
        "sendgrid"
    }

    fn validate_config(&self) -> Result<(), MailError> {
        if self.api_key.trim().is_empty() {
            return Err(MailError::Configuration("SendGrid API key is empty".into()));
        }
        Ok(())
    }
}

async fn error_from_response(response: reqwest::Response) -> MailError {
    let status = response.status();
    let error_msg = match response.json::<SendGridError>().await {
        Ok(error) if !error.errors.is_empty() => error
            .errors
            .iter()
            .map(|e| e.message.clone())
            .collect::<Vec<_>>()
            .join("; "),
        _ => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    };

    MailError::provider_with_status("sendgrid", error_msg, status.as_u16())
}

// ============================================================================
// SendGrid API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct SendGridRequest {
    personalizations: Vec<SendGridPersonalization>,
    from: SendGridAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<SendGridAddress>,
    subject: String,
    content: Vec<SendGridContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tracking_settings: Option<TrackingSettings>,
}

#[derive(Debug, Serialize)]
struct SendGridPersonalization {
    to: Vec<SendGridAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_args: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Serialize)]
struct SendGridAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl From<&Address> for SendGridAddress {
    fn from(addr: &Address) -> Self {
        Self {
            email: addr.email.clone(),
            name: addr.name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SendGridContent {
    #[serde(rename = "type")]
    content_type: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct TrackingSettings {
    click_tracking: ClickTracking,
    open_tracking: OpenTracking,
}

#[derive(Debug, Serialize)]
struct ClickTracking {
    enable: bool,
    enable_text: bool,
}

#[derive(Debug, Serialize)]
struct OpenTracking {
    enable: bool,
}

#[derive(Debug, Deserialize)]
struct SendGridError {
    errors: Vec<SendGridErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct SendGridErrorDetail {
    message: String,
}
