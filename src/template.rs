//! Template resolution.
//!
//! The service never renders bodies itself: it hands a template id and a JSON
//! context to a [`TemplateResolver`] and gets back a subject, a text body and
//! an HTML body. [`BuiltinTemplates`] is the resolver for Help Savta's own
//! emails, rendered with askama from `templates/emails/`.
//!
//! Resolution is synchronous and is never retried. An unknown id or a context
//! that does not fit the template is a caller bug, reported as
//! [`MailError::UnknownTemplate`] or [`MailError::Template`].
//!
//! # Custom resolvers
//!
//! Any closure with the right signature is a resolver:
//!
//! ```rust
//! use savta_mail::{MailError, RenderedTemplate, TemplateResolver};
//! use serde_json::{json, Value};
//!
//! let resolver = |id: &str, _ctx: &Value| -> Result<RenderedTemplate, MailError> {
//!     match id {
//!         "ping" => Ok(RenderedTemplate::new("Ping", "pong", "<p>pong</p>")),
//!         other => Err(MailError::UnknownTemplate(other.to_string())),
//!     }
//! };
//!
//! assert!(resolver.resolve("ping", &json!({})).is_ok());
//! ```

use askama::Template;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::MailError;

/// Output of a template resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTemplate {
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl RenderedTemplate {
    pub fn new(
        subject: impl Into<String>,
        text: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            text: text.into(),
            html: html.into(),
        }
    }
}

/// Turns a template id plus context into a subject/text/HTML triple.
pub trait TemplateResolver: Send + Sync {
    fn resolve(&self, template_id: &str, context: &Value) -> Result<RenderedTemplate, MailError>;
}

impl<F> TemplateResolver for F
where
    F: Fn(&str, &Value) -> Result<RenderedTemplate, MailError> + Send + Sync,
{
    fn resolve(&self, template_id: &str, context: &Value) -> Result<RenderedTemplate, MailError> {
        (self)(template_id, context)
    }
}

// ============================================================================
// Template identifiers and contexts
// ============================================================================

/// Identifiers of the built-in templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    /// Sent to the requester right after a help request is created.
    RequestCreated,
    /// Sent to the requester when an admin changes the request status.
    StatusUpdate,
    /// Sent to the requester when the request is closed as done.
    RequestCompleted,
    /// Sent to the admin mailbox for every new request.
    AdminNewRequest,
    /// Operator smoke test.
    ConnectionTest,
}

impl TemplateId {
    pub const ALL: [TemplateId; 5] = [
        Self::RequestCreated,
        Self::StatusUpdate,
        Self::RequestCompleted,
        Self::AdminNewRequest,
        Self::ConnectionTest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestCreated => "request-created",
            Self::StatusUpdate => "status-update",
            Self::RequestCompleted => "request-completed",
            Self::AdminNewRequest => "admin-new-request",
            Self::ConnectionTest => "connection-test",
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateId {
    type Err = MailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| MailError::UnknownTemplate(s.to_string()))
    }
}

/// Lifecycle status of a help request, as shown to the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    InProgress,
    Scheduled,
    Completed,
    Cancelled,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "Pending review",
            Self::InProgress => "In progress",
            Self::Scheduled => "Scheduled",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        })
    }
}

/// Context for `request-created`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestCreated {
    pub id: i64,
    pub full_name: String,
}

/// Context for `status-update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub id: i64,
    pub full_name: String,
    pub status: RequestStatus,
    /// Free-form note from the admin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Context for `request-completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestCompleted {
    pub id: i64,
    pub full_name: String,
}

/// Context for `admin-new-request`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminNewRequest {
    pub id: i64,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Context for `connection-test`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionTest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<String>,
}

// ============================================================================
// askama templates
// ============================================================================

#[derive(Template)]
#[template(path = "emails/request_created.html")]
struct RequestCreatedHtml<'a> {
    r: &'a RequestCreated,
}

#[derive(Template)]
#[template(path = "emails/request_created.txt")]
struct RequestCreatedText<'a> {
    r: &'a RequestCreated,
}

#[derive(Template)]
#[template(path = "emails/status_update.html")]
struct StatusUpdateHtml<'a> {
    r: &'a StatusUpdate,
    message: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "emails/status_update.txt")]
struct StatusUpdateText<'a> {
    r: &'a StatusUpdate,
    message: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "emails/request_completed.html")]
struct RequestCompletedHtml<'a> {
    r: &'a RequestCompleted,
}

#[derive(Template)]
#[template(path = "emails/request_completed.txt")]
struct RequestCompletedText<'a> {
    r: &'a RequestCompleted,
}

#[derive(Template)]
#[template(path = "emails/admin_new_request.html")]
struct AdminNewRequestHtml<'a> {
    r: &'a AdminNewRequest,
    phone: Option<&'a str>,
    city: Option<&'a str>,
    description: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "emails/admin_new_request.txt")]
struct AdminNewRequestText<'a> {
    r: &'a AdminNewRequest,
    phone: Option<&'a str>,
    city: Option<&'a str>,
    description: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "emails/connection_test.html")]
struct ConnectionTestHtml<'a> {
    sent_at: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "emails/connection_test.txt")]
struct ConnectionTestText<'a> {
    sent_at: Option<&'a str>,
}

/// Help Savta's built-in email templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplates;

impl BuiltinTemplates {
    pub fn new() -> Self {
        Self
    }

    /// Render a template from an already typed id.
    pub fn render(&self, id: TemplateId, context: &Value) -> Result<RenderedTemplate, MailError> {
        match id {
            TemplateId::RequestCreated => {
                let r: RequestCreated = parse_context(id, context)?;
                Ok(RenderedTemplate {
                    subject: format!("Help Savta: your request #{} was received", r.id),
                    text: RequestCreatedText { r: &r }.render()?,
                    html: RequestCreatedHtml { r: &r }.render()?,
                })
            }
            TemplateId::StatusUpdate => {
                let r: StatusUpdate = parse_context(id, context)?;
                Ok(RenderedTemplate {
                    subject: format!("Help Savta: request #{} is now {}", r.id, r.status),
                    text: StatusUpdateText {
                        r: &r,
                        message: r.message.as_deref(),
                    }
                    .render()?,
                    html: StatusUpdateHtml {
                        r: &r,
                        message: r.message.as_deref(),
                    }
                    .render()?,
                })
            }
            TemplateId::RequestCompleted => {
                let r: RequestCompleted = parse_context(id, context)?;
                Ok(RenderedTemplate {
                    subject: format!("Help Savta: request #{} completed", r.id),
                    text: RequestCompletedText { r: &r }.render()?,
                    html: RequestCompletedHtml { r: &r }.render()?,
                })
            }
            TemplateId::AdminNewRequest => {
                let r: AdminNewRequest = parse_context(id, context)?;
                Ok(RenderedTemplate {
                    subject: format!("New help request #{} from {}", r.id, r.full_name),
                    text: AdminNewRequestText {
                        r: &r,
                        phone: r.phone.as_deref(),
                        city: r.city.as_deref(),
                        description: r.description.as_deref(),
                    }
                    .render()?,
                    html: AdminNewRequestHtml {
                        r: &r,
                        phone: r.phone.as_deref(),
                        city: r.city.as_deref(),
                        description: r.description.as_deref(),
                    }
                    .render()?,
                })
            }
            TemplateId::ConnectionTest => {
                let t: ConnectionTest = if context.is_null() {
                    ConnectionTest::default()
                } else {
                    parse_context(id, context)?
                };
                Ok(RenderedTemplate {
                    subject: "Help Savta: email delivery test".to_string(),
                    text: ConnectionTestText {
                        sent_at: t.sent_at.as_deref(),
                    }
                    .render()?,
                    html: ConnectionTestHtml {
                        sent_at: t.sent_at.as_deref(),
                    }
                    .render()?,
                })
            }
        }
    }
}

impl TemplateResolver for BuiltinTemplates {
    fn resolve(&self, template_id: &str, context: &Value) -> Result<RenderedTemplate, MailError> {
        self.render(template_id.parse()?, context)
    }
}

fn parse_context<T: DeserializeOwned>(id: TemplateId, context: &Value) -> Result<T, MailError> {
    T::deserialize(context)
        .map_err(|e| MailError::Template(format!("invalid context for '{}': {}", id, e)))
}
