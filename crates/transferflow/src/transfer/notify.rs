use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::jobs::settings::{self, SettingsRepo};

const SUBJECT: &str = "Transfer system error";
const DEFAULT_SMTP_PORT: u16 = 587;

/// Receives run failures. Implementations must swallow their own errors.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _message: &str) {}
}

/// Keeps messages in memory; for tests and embedding hosts that poll.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub to: String,
}

impl SmtpSettings {
    /// `None` unless every field is present and non-empty.
    pub fn from_values(
        server: Option<String>,
        port: Option<String>,
        user: Option<String>,
        pass: Option<String>,
        to: Option<String>,
    ) -> Option<Self> {
        let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let port = non_empty(port)?;
        Some(Self {
            server: non_empty(server)?,
            port: port.parse().unwrap_or(DEFAULT_SMTP_PORT),
            user: non_empty(user)?,
            pass: non_empty(pass)?,
            to: non_empty(to)?,
        })
    }
}

/// Mails each message using the `smtp_*` settings, read fresh every time.
#[derive(Clone)]
pub struct SmtpNotifier {
    settings: SettingsRepo,
}

impl SmtpNotifier {
    pub fn new(settings: SettingsRepo) -> Self {
        Self { settings }
    }

    async fn load(&self) -> anyhow::Result<Option<SmtpSettings>> {
        Ok(SmtpSettings::from_values(
            self.settings.get(settings::SMTP_SERVER).await?,
            self.settings.get(settings::SMTP_PORT).await?,
            self.settings.get(settings::SMTP_USER).await?,
            self.settings.get(settings::SMTP_PASS).await?,
            self.settings.get(settings::SMTP_TO).await?,
        ))
    }

    async fn send(&self, cfg: &SmtpSettings, body: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(cfg.user.parse()?)
            .to(cfg.to.parse()?)
            .subject(SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.server)?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.user.clone(), cfg.pass.clone()))
            .build();

        mailer.send(email).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, message: &str) {
        let cfg = match self.load().await {
            Ok(Some(cfg)) => cfg,
            Ok(None) => {
                tracing::debug!("smtp not configured, notification dropped");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "reading smtp settings failed");
                return;
            }
        };

        if let Err(e) = self.send(&cfg, message).await {
            tracing::warn!(error = %e, server = %cfg.server, "sending error mail failed");
        }
    }
}
