use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use super::{EmailMessage, Mailer};
use crate::{
    config::EmailConfig,
    error::{AppError, Result},
};

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| AppError::Email(format!("Failed to create SMTP transport: {}", e)))?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| AppError::Email(format!("Invalid address {}: {}", address, e)))
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, message: EmailMessage) -> Result<()> {
        let mut builder = Message::builder()
            .from(parse_mailbox(&message.from)?)
            .subject(&message.subject);
        for recipient in &message.to {
            builder = builder.to(parse_mailbox(recipient)?);
        }

        let email = builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(message.body_text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(message.body_html),
                    ),
            )
            .map_err(|e| AppError::Email(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| AppError::Email(format!("Failed to send email via SMTP: {}", e)))?;

        Ok(())
    }
}
