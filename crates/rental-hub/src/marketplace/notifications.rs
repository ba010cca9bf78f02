//! Best-effort email side channel for booking notices and password-reset links.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{MailBackend, MailConfig, SmtpConfig};

const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail delivery is disabled")]
    Disabled,
    #[error("invalid mail address: {0}")]
    Address(String),
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}

/// Outbound mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "email"
        );
        Ok(())
    }
}

/// Keeps every message in an outbox.
#[derive(Debug, Default, Clone)]
pub struct MemoryMailer {
    outbox: Arc<Mutex<Vec<EmailMessage>>>,
}

impl MemoryMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        match self.outbox.lock() {
            Ok(outbox) => outbox.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        self.outbox
            .lock()
            .map_err(|_| MailError::Transport("outbox lock poisoned".to_string()))?
            .push(message.clone());
        Ok(())
    }
}

/// Delivers through an SMTP relay, with STARTTLS unless `EMAIL_USE_TLS` is off.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    relay: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|err| MailError::Transport(err.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        let mut builder = builder.port(config.port).timeout(Some(SMTP_TIMEOUT));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: Arc::new(builder.build()),
            relay: format!("{}:{}", config.host, config.port),
        })
    }
}

impl fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("relay", &self.relay)
            .finish_non_exhaustive()
    }
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .parse::<Mailbox>()
        .map_err(|err| MailError::Address(format!("{address}: {err}")))
}

fn build_message(message: &EmailMessage) -> Result<Message, MailError> {
    Message::builder()
        .from(mailbox(&message.from)?)
        .to(mailbox(&message.to)?)
        .subject(message.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())
        .map_err(|err| MailError::Address(err.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let email = build_message(message)?;
        self.transport
            .send(email)
            .await
            .map_err(|err| MailError::Transport(err.to_string()))?;
        debug!(relay = %self.relay, to = %message.to, "email handed to relay");
        Ok(())
    }
}

/// Transport selected by `EMAIL_BACKEND`.
#[derive(Debug)]
pub enum MailerBackend {
    Console(ConsoleMailer),
    Smtp(SmtpMailer),
    Memory(MemoryMailer),
    Disabled,
}

impl MailerBackend {
    pub fn from_config(config: &MailConfig) -> Result<Self, MailError> {
        Ok(match config.backend {
            MailBackend::Console => Self::Console(ConsoleMailer),
            MailBackend::Smtp => {
                let smtp = config
                    .smtp
                    .as_ref()
                    .ok_or_else(|| MailError::Transport("EMAIL_HOST is not set".to_string()))?;
                Self::Smtp(SmtpMailer::new(smtp)?)
            }
            MailBackend::Memory => Self::Memory(MemoryMailer::default()),
            MailBackend::Disabled => Self::Disabled,
        })
    }
}

#[async_trait]
impl Mailer for MailerBackend {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        match self {
            MailerBackend::Console(mailer) => mailer.send(message).await,
            MailerBackend::Smtp(mailer) => mailer.send(message).await,
            MailerBackend::Memory(mailer) => mailer.send(message).await,
            MailerBackend::Disabled => Err(MailError::Disabled),
        }
    }
}

/// Composes marketplace emails and swallows delivery failures.
pub struct Notifier<M> {
    mailer: Arc<M>,
    from: String,
}

impl<M> Clone for Notifier<M> {
    fn clone(&self) -> Self {
        Self {
            mailer: self.mailer.clone(),
            from: self.from.clone(),
        }
    }
}

impl<M: Mailer> Notifier<M> {
    pub fn new(mailer: Arc<M>, from: impl Into<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
        }
    }

    /// Returns whether the message went out; failures are logged and never propagated.
    pub async fn deliver(&self, to: &str, subject: &str, body: String) -> bool {
        let message = EmailMessage {
            from: self.from.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            body,
        };

        match self.mailer.send(&message).await {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, to, subject, "email delivery failed");
                false
            }
        }
    }

    pub async fn booking_requested(
        &self,
        to: &str,
        tenant_name: &str,
        property_title: &str,
    ) -> bool {
        self.deliver(
            to,
            "Booking Request Received",
            format!(
                "Hi {tenant_name},\n\nYour booking request for {property_title} has been sent to the \
                 property owner. You will hear back once they respond."
            ),
        )
        .await
    }

    pub async fn booking_decision(
        &self,
        to: &str,
        property_title: &str,
        status_label: &str,
        owner_response: &str,
    ) -> bool {
        let mut body = format!("Your booking request for {property_title} was {status_label}.");
        if !owner_response.trim().is_empty() {
            body.push_str(&format!("\n\nMessage from the owner:\n{}", owner_response.trim()));
        }
        self.deliver(to, "Booking Request Update", body).await
    }

    pub async fn password_reset(&self, to: &str, reset_link: &str, ttl_minutes: u32) -> bool {
        self.deliver(
            to,
            "Password Reset",
            format!(
                "Use the link below to choose a new password. It expires in {ttl_minutes} minutes.\n\n\
                 {reset_link}\n\nIf you did not ask for a reset, ignore this email."
            ),
        )
        .await
    }
}
