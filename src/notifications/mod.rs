use std::sync::Arc;

use askama::Template;
use async_trait::async_trait;

use crate::{
    config::EmailConfig,
    domain::{RefundRequest, RefundStatus},
    error::{AppError, Result},
};

pub mod smtp;

pub use smtp::SmtpMailer;

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, message: EmailMessage) -> Result<()>;
}

pub type DynMailer = Arc<dyn Mailer>;

pub fn create_mailer(config: &EmailConfig) -> Result<DynMailer> {
    if config.enabled {
        tracing::info!("SMTP email delivery via {}:{}", config.smtp_host, config.smtp_port);
        Ok(Arc::new(SmtpMailer::new(config)?))
    } else {
        tracing::info!("Email delivery disabled; messages will be logged");
        Ok(Arc::new(LogMailer))
    }
}

/// Writes messages to the log instead of delivering them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, message: EmailMessage) -> Result<()> {
        tracing::info!(
            to = ?message.to,
            subject = %message.subject,
            "Email (not delivered):\n{}",
            message.body_text
        );
        Ok(())
    }
}

#[derive(Template)]
#[template(path = "emails/refund_status.html")]
struct RefundStatusHtml<'a> {
    refund: &'a RefundRequest,
}

#[derive(Template)]
#[template(path = "emails/refund_status.txt")]
struct RefundStatusText<'a> {
    refund: &'a RefundRequest,
}

/// The status a save moves a record to, if it moves it at all.
/// New records (no prior state) never count as a transition.
pub fn status_transition(
    previous: Option<&RefundRequest>,
    next: &RefundRequest,
) -> Option<RefundStatus> {
    match previous {
        Some(prev) if prev.status != next.status => Some(next.status),
        _ => None,
    }
}

pub struct StatusNotifier {
    mailer: DynMailer,
    from: String,
}

impl StatusNotifier {
    pub fn new(mailer: DynMailer, from: impl Into<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
        }
    }

    pub fn render(&self, refund: &RefundRequest) -> Result<EmailMessage> {
        let body_text = RefundStatusText { refund }
            .render()
            .map_err(|e| AppError::Internal(format!("Failed to render email: {}", e)))?;
        let body_html = RefundStatusHtml { refund }
            .render()
            .map_err(|e| AppError::Internal(format!("Failed to render email: {}", e)))?;

        Ok(EmailMessage {
            from: self.from.clone(),
            to: vec![refund.email.clone()],
            subject: format!("Status of your request #{} changed", refund.id),
            body_text,
            body_html,
        })
    }

    pub async fn notify_status_change(&self, refund: &RefundRequest) -> Result<()> {
        let message = self.render(refund)?;
        self.mailer.send(message).await?;
        tracing::info!(
            "Sent status notification for refund #{} ({}) via {}",
            refund.id,
            refund.status,
            self.mailer.name()
        );
        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Keeps every message in memory, like an outbox.
    #[derive(Default)]
    pub struct RecordingMailer {
        outbox: Mutex<Vec<EmailMessage>>,
    }

    impl RecordingMailer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn outbox(&self) -> Vec<EmailMessage> {
            self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
        }

        pub fn clear(&self) {
            if let Ok(mut outbox) = self.outbox.lock() {
                outbox.clear();
            }
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, message: EmailMessage) -> Result<()> {
            self.outbox
                .lock()
                .map_err(|_| AppError::Email("outbox poisoned".to_string()))?
                .push(message);
            Ok(())
        }
    }
}
