//! Operator diagnostics for Help Savta email.
//!
//! Run with: cargo run --features cli --bin savta-mail-check -- --all
//!
//! Prints which providers are configured, runs the connection handshake, and
//! optionally sends one of the fixed test emails.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

use savta_mail::{EmailConfig, EmailService, MemoryDeliveryLog, TestEmailKind};

#[derive(Debug, Parser)]
#[command(name = "savta-mail-check", version, about = "Check Help Savta email delivery")]
struct Args {
    /// Handshake with every provider, not just the primary.
    #[arg(long)]
    all: bool,

    /// Send a test email of this kind (basic, request-created, status-update, request-completed).
    #[arg(long, requires = "to")]
    send: Option<TestEmailKind>,

    /// Recipient for --send.
    #[arg(long, env = "EMAIL_TEST_RECIPIENT")]
    to: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let config = match EmailConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid email configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log = MemoryDeliveryLog::shared();
    let service = EmailService::builder()
        .config(&config)
        .delivery_log(Arc::clone(&log))
        .build();

    if !service.is_ready() {
        println!("Email is not configured (set EMAIL_FROM and SENDGRID_API_KEY or SMTP_HOST)");
        return ExitCode::FAILURE;
    }

    println!("Providers: {}", service.providers().join(" -> "));

    let mut healthy = true;
    if args.all {
        for (provider, result) in service.test_all_connections().await {
            match result {
                Ok(()) => println!("  {provider}: ok"),
                Err(e) => {
                    healthy = false;
                    println!("  {provider}: FAILED ({e})");
                }
            }
        }
    } else if service.test_connection().await {
        println!("Primary connection: ok");
    } else {
        healthy = false;
        println!("Primary connection: FAILED");
    }

    if let (Some(kind), Some(to)) = (args.send, args.to.as_deref()) {
        println!("Sending '{kind}' test email to {to}");
        match service.send_test_email(kind, to).await {
            Ok(delivered) => {
                for outcome in log.all() {
                    let detail = outcome
                        .message_id
                        .as_deref()
                        .or(outcome.error.as_deref())
                        .unwrap_or("");
                    println!(
                        "  attempt {} via {}: {} {}",
                        outcome.attempt,
                        outcome.provider,
                        if outcome.success { "delivered" } else { "failed" },
                        detail
                    );
                }
                if !delivered {
                    healthy = false;
                }
            }
            Err(e) => {
                eprintln!("Could not send test email: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    if healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
