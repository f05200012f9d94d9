use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tokio::task::JoinHandle;
use tracing_futures::Instrument;

use crate::{configuration::EmailClientSettings, domain::OutgoingMessage};

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("failed to build the email message")]
    Message(#[from] lettre::error::Error),
    #[error("failed to submit the email to the SMTP server")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Something able to deliver one message.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: OutgoingMessage) -> Result<(), DeliveryError>;
}

/// SMTP delivery through a pooled `lettre` transport.
#[derive(Clone, Debug)]
pub struct SmtpMailer {
    sender: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(settings: &EmailClientSettings) -> Result<Self, DeliveryError> {
        let builder = if settings.ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.server)?
        } else if settings.tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.server)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server)
        };

        let builder = builder
            .port(settings.port)
            .timeout(Some(settings.timeout()));

        let builder = if settings.username.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
        };

        Ok(SmtpMailer {
            sender: Mailbox::new(None, settings.sender_email.clone()),
            transport: builder.build(),
        })
    }

    pub fn build_message(&self, message: OutgoingMessage) -> Result<Message, DeliveryError> {
        let builder = message.recipients.into_iter().fold(
            Message::builder().from(self.sender.clone()),
            |builder, recipient| builder.to(Mailbox::new(None, recipient)),
        );

        let email = builder
            .subject(message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)?;

        Ok(email)
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, message: OutgoingMessage) -> Result<(), DeliveryError> {
        let email = self.build_message(message)?;
        self.transport.send(email).await?;
        Ok(())
    }
}

/// Runs deliveries in the background, off the request path.
#[derive(Clone)]
pub struct MailDispatcher {
    transport: Arc<dyn MailTransport>,
}

impl MailDispatcher {
    pub fn new(transport: impl MailTransport + 'static) -> Self {
        MailDispatcher {
            transport: Arc::new(transport),
        }
    }

    /// Hand `message` over to a background task.
    ///
    /// The returned handle may be dropped; the delivery proceeds either way and its
    /// outcome is only reported through the logs.
    pub fn dispatch(&self, message: OutgoingMessage) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        let span = tracing::info_span!(
            "Deliver a contact email",
            recipients = %message.recipient_list(),
        );

        tokio::spawn(deliver(transport, message).instrument(span))
    }
}

async fn deliver(transport: Arc<dyn MailTransport>, message: OutgoingMessage) {
    let recipients = message.recipient_list();

    match transport.send(message).await {
        Ok(()) => tracing::info!(%recipients, "email delivered"),
        Err(e) => {
            let source = std::error::Error::source(&e).map(ToString::to_string);
            tracing::error!(
                %recipients,
                error = %e,
                source = source.as_deref().unwrap_or_default(),
                "failed to deliver email"
            );
        }
    }
}
