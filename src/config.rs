//! Startup configuration.
//!
//! The environment is read exactly once, into an [`EmailConfig`]: an ordered
//! list of validated [`ProviderConfig`]s (primary first). Missing variables
//! simply mean "provider not configured"; only malformed values are errors.
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `SENDGRID_API_KEY` | Enables the SendGrid provider |
//! | `SENDGRID_BASE_URL` | API base URL override (default `https://api.sendgrid.com/v3`) |
//! | `SENDGRID_DISABLE_TRACKING` | Disable open/click tracking (default `true`) |
//! | `SMTP_HOST` | Enables the SMTP provider |
//! | `SMTP_PORT` | SMTP port (default 587, or 465 when `SMTP_SECURE=true`) |
//! | `SMTP_USER` / `SMTP_PASS` | SMTP credentials |
//! | `SMTP_SECURE` | `true` (implicit TLS), `false` (STARTTLS, default), `none` |
//! | `EMAIL_FROM` | Sender address; required for any provider |
//! | `EMAIL_FROM_NAME` | Sender display name (default `Help Savta`) |
//! | `EMAIL_REPLY_TO` | Reply-to address |
//! | `EMAIL_PRIMARY_PROVIDER` | `sendgrid` (default) or `smtp` |
//! | `EMAIL_TIMEOUT_SECS` | Transport timeout in seconds (default 10) |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::address::Address;
use crate::error::MailError;
use crate::mailer::Mailer;

/// Default sender display name.
pub const DEFAULT_FROM_NAME: &str = "Help Savta";

/// Default transport timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The closed set of supported transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// SendGrid transactional HTTP API.
    SendGrid,
    /// SMTP relay.
    Smtp,
}

impl ProviderKind {
    /// Identifier used in logs and delivery outcomes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendGrid => "sendgrid",
            Self::Smtp => "smtp",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = MailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sendgrid" => Ok(Self::SendGrid),
            "smtp" => Ok(Self::Smtp),
            other => Err(MailError::Configuration(format!(
                "Unknown email provider: {}. Valid providers are: sendgrid, smtp",
                other
            ))),
        }
    }
}

/// Sender identity applied by every provider adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub from: Address,
    pub reply_to: Option<Address>,
}

impl Sender {
    pub fn new(from: impl Into<Address>) -> Self {
        Self {
            from: from.into(),
            reply_to: None,
        }
    }

    pub fn reply_to(mut self, addr: impl Into<Address>) -> Self {
        self.reply_to = Some(addr.into());
        self
    }
}

/// SendGrid credentials and options.
#[derive(Clone)]
pub struct SendGridConfig {
    pub api_key: String,
    /// Overrides the public API endpoint (tests, regional endpoints).
    pub base_url: Option<String>,
    /// Turn off open/click tracking pixels and link rewriting.
    pub disable_tracking: bool,
    pub timeout: Duration,
}

impl SendGridConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            disable_tracking: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl fmt::Debug for SendGridConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendGridConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("disable_tracking", &self.disable_tracking)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// TLS mode for SMTP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// No TLS (only for localhost/testing relays)
    None,
    /// STARTTLS - upgrade to TLS after connecting (port 587)
    #[default]
    StartTls,
    /// Implicit TLS - connect with TLS from start (port 465)
    Tls,
}

impl TlsMode {
    fn default_port(&self) -> u16 {
        match self {
            Self::Tls => 465,
            Self::StartTls | Self::None => 587,
        }
    }
}

impl FromStr for TlsMode {
    type Err = MailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "true" | "1" | "tls" => Ok(Self::Tls),
            "false" | "0" | "starttls" => Ok(Self::StartTls),
            "none" | "plain" => Ok(Self::None),
            other => Err(MailError::Configuration(format!(
                "Invalid SMTP_SECURE value: {}. Expected true, false or none",
                other
            ))),
        }
    }
}

/// SMTP relay settings.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            tls: TlsMode::StartTls,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn tls(mut self, mode: TlsMode) -> Self {
        self.tls = mode;
        self
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("tls", &self.tls)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Transport-specific settings, one variant per [`ProviderKind`].
#[derive(Debug, Clone)]
pub enum Transport {
    SendGrid(SendGridConfig),
    Smtp(SmtpConfig),
}

/// Everything needed to build one provider adapter.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub transport: Transport,
    pub sender: Sender,
}

impl ProviderConfig {
    pub fn sendgrid(config: SendGridConfig, sender: Sender) -> Self {
        Self {
            transport: Transport::SendGrid(config),
            sender,
        }
    }

    pub fn smtp(config: SmtpConfig, sender: Sender) -> Self {
        Self {
            transport: Transport::Smtp(config),
            sender,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self.transport {
            Transport::SendGrid(_) => ProviderKind::SendGrid,
            Transport::Smtp(_) => ProviderKind::Smtp,
        }
    }

    /// Build the adapter for this provider.
    ///
    /// Fails if the crate was compiled without the provider's feature.
    pub fn build_mailer(&self) -> Result<Arc<dyn Mailer>, MailError> {
        match &self.transport {
            #[cfg(feature = "sendgrid")]
            Transport::SendGrid(config) => Ok(Arc::new(crate::providers::SendGridMailer::from_config(
                config,
                self.sender.clone(),
            )?)),
            #[cfg(not(feature = "sendgrid"))]
            Transport::SendGrid(_) => Err(MailError::Configuration(
                "SENDGRID_API_KEY is set but the 'sendgrid' feature is not enabled. \
                Add `features = [\"sendgrid\"]` to Cargo.toml"
                    .into(),
            )),

            #[cfg(feature = "smtp")]
            Transport::Smtp(config) => Ok(Arc::new(crate::providers::SmtpMailer::from_config(
                config,
                self.sender.clone(),
            )?)),
            #[cfg(not(feature = "smtp"))]
            Transport::Smtp(_) => Err(MailError::Configuration(
                "SMTP_HOST is set but the 'smtp' feature is not enabled. \
                Add `features = [\"smtp\"]` to Cargo.toml"
                    .into(),
            )),
        }
    }
}

/// Validated startup configuration: providers in fallback-priority order.
#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    providers: Vec<ProviderConfig>,
}

impl EmailConfig {
    /// Configuration with providers in the given priority order.
    pub fn new(providers: Vec<ProviderConfig>) -> Self {
        Self { providers }
    }

    /// Configuration with no providers. The service built from it is not ready.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, MailError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    ///
    /// Empty values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MailError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let timeout = match get("EMAIL_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(secs.parse().map_err(|_| {
                MailError::Configuration(format!("Invalid EMAIL_TIMEOUT_SECS: {}", secs))
            })?),
            None => DEFAULT_TIMEOUT,
        };

        let sendgrid = match get("SENDGRID_API_KEY") {
            Some(api_key) => {
                let mut config = SendGridConfig::new(api_key);
                config.base_url = get("SENDGRID_BASE_URL");
                config.timeout = timeout;
                if let Some(value) = get("SENDGRID_DISABLE_TRACKING") {
                    config.disable_tracking = parse_bool("SENDGRID_DISABLE_TRACKING", &value)?;
                }
                Some(config)
            }
            None => None,
        };

        let smtp = match get("SMTP_HOST") {
            Some(host) => {
                let tls = match get("SMTP_SECURE") {
                    Some(value) => value.parse()?,
                    None => TlsMode::StartTls,
                };
                let port = match get("SMTP_PORT") {
                    Some(port) => port.parse().map_err(|_| {
                        MailError::Configuration(format!("Invalid SMTP_PORT: {}", port))
                    })?,
                    None => tls.default_port(),
                };
                let mut config = SmtpConfig::new(host, port).tls(tls);
                config.timeout = timeout;
                if let Some(username) = get("SMTP_USER") {
                    config = config.credentials(username, get("SMTP_PASS").unwrap_or_default());
                }
                Some(config)
            }
            None => None,
        };

        if sendgrid.is_none() && smtp.is_none() {
            return Ok(Self::empty());
        }

        let sender = match get("EMAIL_FROM") {
            Some(from) => {
                let name = get("EMAIL_FROM_NAME").unwrap_or_else(|| DEFAULT_FROM_NAME.to_string());
                let mut sender = Sender::new(Address::parse_with_name(&name, &from).map_err(
                    |e| MailError::Configuration(format!("Invalid EMAIL_FROM: {}", e)),
                )?);
                if let Some(reply_to) = get("EMAIL_REPLY_TO") {
                    sender.reply_to = Some(Address::parse(&reply_to).map_err(|e| {
                        MailError::Configuration(format!("Invalid EMAIL_REPLY_TO: {}", e))
                    })?);
                }
                sender
            }
            None => {
                tracing::warn!(
                    "Email provider credentials found but EMAIL_FROM is not set; email is disabled"
                );
                return Ok(Self::empty());
            }
        };

        let primary = match get("EMAIL_PRIMARY_PROVIDER") {
            Some(name) => name.parse()?,
            None => ProviderKind::SendGrid,
        };

        let mut providers = Vec::with_capacity(2);
        if let Some(config) = sendgrid {
            providers.push(ProviderConfig::sendgrid(config, sender.clone()));
        }
        if let Some(config) = smtp {
            providers.push(ProviderConfig::smtp(config, sender));
        }
        // Stable sort: the preferred kind moves to the front, the rest keep order.
        providers.sort_by_key(|p| p.kind() != primary);

        tracing::debug!(
            providers = ?providers.iter().map(|p| p.kind().as_str()).collect::<Vec<_>>(),
            "Loaded email configuration"
        );

        Ok(Self { providers })
    }

    /// Providers in fallback-priority order (primary first).
    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }

    /// True if no provider is configured.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, MailError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(MailError::Configuration(format!(
            "Invalid {}: {}",
            key, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn kinds(config: &EmailConfig) -> Vec<ProviderKind> {
        config.providers().iter().map(|p| p.kind()).collect()
    }

    #[test]
    fn test_empty_environment() {
        let config = EmailConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_blank_values_are_absent() {
        let config = EmailConfig::from_lookup(lookup(&[
            ("SENDGRID_API_KEY", "  "),
            ("SMTP_HOST", ""),
            ("EMAIL_FROM", "noreply@example.com"),
        ]))
        .unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_sendgrid_only() {
        let config = EmailConfig::from_lookup(lookup(&[
            ("SENDGRID_API_KEY", "SG.key"),
            ("EMAIL_FROM", "noreply@example.com"),
        ]))
        .unwrap();

        assert_eq!(kinds(&config), vec![ProviderKind::SendGrid]);
        let provider = &config.providers()[0];
        assert_eq!(provider.sender.from.email, "noreply@example.com");
        assert_eq!(provider.sender.from.name.as_deref(), Some(DEFAULT_FROM_NAME));
        match &provider.transport {
            Transport::SendGrid(sg) => {
                assert_eq!(sg.api_key, "SG.key");
                assert!(sg.disable_tracking);
                assert_eq!(sg.timeout, DEFAULT_TIMEOUT);
            }
            other => panic!("unexpected transport {:?}", other),
        }
    }

    #[test]
    fn test_both_providers_sendgrid_first() {
        let config = EmailConfig::from_lookup(lookup(&[
            ("SENDGRID_API_KEY", "SG.key"),
            ("SMTP_HOST", "smtp.example.com"),
            ("EMAIL_FROM", "noreply@example.com"),
        ]))
        .unwrap();

        assert_eq!(kinds(&config), vec![ProviderKind::SendGrid, ProviderKind::Smtp]);
    }

    #[test]
    fn test_primary_override() {
        let config = EmailConfig::from_lookup(lookup(&[
            ("SENDGRID_API_KEY", "SG.key"),
            ("SMTP_HOST", "smtp.example.com"),
            ("EMAIL_FROM", "noreply@example.com"),
            ("EMAIL_PRIMARY_PROVIDER", "SMTP"),
        ]))
        .unwrap();

        assert_eq!(kinds(&config), vec![ProviderKind::Smtp, ProviderKind::SendGrid]);
    }

    #[test]
    fn test_unknown_primary_is_error() {
        let result = EmailConfig::from_lookup(lookup(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("EMAIL_FROM", "noreply@example.com"),
            ("EMAIL_PRIMARY_PROVIDER", "mailgun"),
        ]));
        assert!(matches!(result, Err(MailError::Configuration(_))));
    }

    #[test]
    fn test_missing_from_disables_email() {
        let config = EmailConfig::from_lookup(lookup(&[("SENDGRID_API_KEY", "SG.key")])).unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_invalid_from_is_error() {
        let result = EmailConfig::from_lookup(lookup(&[
            ("SENDGRID_API_KEY", "SG.key"),
            ("EMAIL_FROM", "not-an-address"),
        ]));
        assert!(matches!(result, Err(MailError::Configuration(_))));
    }

    #[test]
    fn test_smtp_settings() {
        let config = EmailConfig::from_lookup(lookup(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USER", "mailer"),
            ("SMTP_PASS", "secret"),
            ("SMTP_SECURE", "true"),
            ("EMAIL_FROM", "noreply@example.com"),
            ("EMAIL_FROM_NAME", "Savta Support"),
            ("EMAIL_REPLY_TO", "help@example.com"),
            ("EMAIL_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();

        let provider = &config.providers()[0];
        assert_eq!(provider.sender.from.name.as_deref(), Some("Savta Support"));
        assert_eq!(
            provider.sender.reply_to.as_ref().map(|a| a.email.as_str()),
            Some("help@example.com")
        );
        match &provider.transport {
            Transport::Smtp(smtp) => {
                assert_eq!(smtp.host, "smtp.example.com");
                assert_eq!(smtp.port, 465);
                assert_eq!(smtp.tls, TlsMode::Tls);
                assert_eq!(smtp.username.as_deref(), Some("mailer"));
                assert_eq!(smtp.password.as_deref(), Some("secret"));
                assert_eq!(smtp.timeout, Duration::from_secs(3));
            }
            other => panic!("unexpected transport {:?}", other),
        }
    }

    #[test]
    fn test_smtp_default_port() {
        let config = EmailConfig::from_lookup(lookup(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("EMAIL_FROM", "noreply@example.com"),
        ]))
        .unwrap();

        match &config.providers()[0].transport {
            Transport::Smtp(smtp) => {
                assert_eq!(smtp.port, 587);
                assert_eq!(smtp.tls, TlsMode::StartTls);
                assert!(smtp.username.is_none());
            }
            other => panic!("unexpected transport {:?}", other),
        }
    }

    #[test]
    fn test_malformed_values_are_errors() {
        for (key, value) in [
            ("SMTP_PORT", "abc"),
            ("SMTP_SECURE", "maybe"),
            ("EMAIL_TIMEOUT_SECS", "soon"),
        ] {
            let result = EmailConfig::from_lookup(lookup(&[
                ("SMTP_HOST", "smtp.example.com"),
                ("EMAIL_FROM", "noreply@example.com"),
                (key, value),
            ]));
            assert!(matches!(result, Err(MailError::Configuration(_))), "{key}");
        }
    }

    #[test]
    fn test_tracking_flag() {
        let config = EmailConfig::from_lookup(lookup(&[
            ("SENDGRID_API_KEY", "SG.key"),
            ("SENDGRID_DISABLE_TRACKING", "false"),
            ("EMAIL_FROM", "noreply@example.com"),
        ]))
        .unwrap();

        match &config.providers()[0].transport {
            Transport::SendGrid(sg) => assert!(!sg.disable_tracking),
            other => panic!("unexpected transport {:?}", other),
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let sg = SendGridConfig::new("SG.very-secret");
        assert!(!format!("{:?}", sg).contains("very-secret"));

        let smtp = SmtpConfig::new("smtp.example.com", 587).credentials("user", "hunter2");
        assert!(!format!("{:?}", smtp).contains("hunter2"));
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("sendgrid".parse::<ProviderKind>().unwrap(), ProviderKind::SendGrid);
        assert_eq!(" Smtp ".parse::<ProviderKind>().unwrap(), ProviderKind::Smtp);
        assert!("ses".parse::<ProviderKind>().is_err());
        assert_eq!(ProviderKind::SendGrid.to_string(), "sendgrid");
    }
}
