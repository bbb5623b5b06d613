//! Email provider implementations.
//!
//! Each provider implements the [`Mailer`](crate::Mailer) trait.
//!
//! | Provider | Feature Flag | Description |
//! |----------|-------------|-------------|
//! | [`SendGridMailer`] | `sendgrid` | SendGrid API |
//! | [`SmtpMailer`] | `smtp` | SMTP via lettre |
//! | [`LocalMailer`] | (none) | In-memory capture for dev/testing |

#[cfg(feature = "smtp")]
mod smtp;
#[cfg(feature = "smtp")]
pub use smtp::SmtpMailer;

#[cfg(feature = "sendgrid")]
mod sendgrid;
#[cfg(feature = "sendgrid")]
pub use sendgrid::SendGridMailer;

mod local;
pub use local::{LocalMailer, StoredMessage};
