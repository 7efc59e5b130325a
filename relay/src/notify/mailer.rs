//! SMTP thank-you mailer.
//!
//! The mailer keeps one SMTP session per process. The session is built on
//! first use, reused while it is valid, and dropped after a failed send so the
//! next call starts from scratch. How the session authenticates is decided by
//! [`MailAuth`]:
//!
//! - `AppPassword`: static credentials; the connection is tested when the
//!   session is built.
//! - `OAuth2`: a refresh token is exchanged for an access token used with
//!   XOAUTH2; the session expires a minute before the token does.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::{Credentials, Mechanism},
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::oauth::OAuthClient;
use super::template::{EmailTemplates, THANK_YOU_SUBJECT};
use super::{Delivery, Notifier};
use crate::config::{MailAuth, MailConfig};
use crate::error::NotifyError;

/// Refresh OAuth sessions this long before the access token expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// An authenticated SMTP transport and how long it may be used.
struct MailSession {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    expires_at: Option<Instant>,
}

impl MailSession {
    fn is_valid(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

/// Sends thank-you emails over SMTP.
pub struct SmtpMailer {
    config: MailConfig,
    from: Mailbox,
    templates: EmailTemplates,
    oauth: Option<OAuthClient>,
    session: RwLock<Option<MailSession>>,
}

impl SmtpMailer {
    /// Create a mailer. No network traffic happens until the first send.
    pub fn new(config: MailConfig, http: Client) -> Result<Self, NotifyError> {
        let from = Mailbox::new(
            Some(config.from_name.clone()),
            config.user.parse::<Address>()?,
        );

        let templates = EmailTemplates::new(&config.from_name, config.site_url.as_deref())?;

        let oauth = match &config.auth {
            MailAuth::OAuth2 {
                client_id,
                client_secret,
                refresh_token,
            } => Some(OAuthClient::new(
                http,
                config.token_url.clone(),
                client_id.clone(),
                client_secret.clone(),
                refresh_token.clone(),
            )),
            MailAuth::AppPassword { .. } => None,
        };

        Ok(Self {
            config,
            from,
            templates,
            oauth,
            session: RwLock::new(None),
        })
    }

    /// Return the current transport, building a new session if needed.
    async fn ensure_session(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
        {
            let session = self.session.read().await;
            if let Some(s) = session.as_ref().filter(|s| s.is_valid()) {
                return Ok(s.transport.clone());
            }
        }

        let mut session = self.session.write().await;

        // Another request may have rebuilt it while we waited.
        if let Some(s) = session.as_ref().filter(|s| s.is_valid()) {
            return Ok(s.transport.clone());
        }

        info!(auth = self.config.auth.kind(), host = %self.config.smtp_host, "mail_session_connecting");

        let fresh = match self.connect().await {
            Ok(s) => s,
            Err(e) => {
                *session = None;
                error!(auth = self.config.auth.kind(), error = %e, "mail_session_init_failed");
                return Err(e);
            }
        };

        info!(auth = self.config.auth.kind(), "mail_session_ready");

        let transport = fresh.transport.clone();
        *session = Some(fresh);

        Ok(transport)
    }

    async fn connect(&self) -> Result<MailSession, NotifyError> {
        let builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)?;

        match (&self.config.auth, &self.oauth) {
            (MailAuth::OAuth2 { .. }, Some(oauth)) => {
                let token = oauth.access_token().await?;
                let transport = builder
                    .credentials(Credentials::new(self.config.user.clone(), token.token))
                    .authentication(vec![Mechanism::Xoauth2])
                    .build();

                Ok(MailSession {
                    transport,
                    expires_at: Some(
                        Instant::now() + token.expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN),
                    ),
                })
            }
            (MailAuth::AppPassword { password }, _) => {
                let transport = builder
                    .credentials(Credentials::new(self.config.user.clone(), password.clone()))
                    .build();

                if !transport.test_connection().await? {
                    return Err(NotifyError::Unverified);
                }

                Ok(MailSession {
                    transport,
                    expires_at: None,
                })
            }
            (MailAuth::OAuth2 { .. }, None) => Err(NotifyError::Config(
                "OAuth2 selected without a token client".to_string(),
            )),
        }
    }

    /// Drop the current session so the next use rebuilds it.
    pub async fn invalidate(&self) {
        *self.session.write().await = None;
    }

    /// Build the thank-you message and the Message-ID it carries.
    pub fn build_message(
        &self,
        recipient_email: &str,
        recipient_name: &str,
        original_message: &str,
    ) -> Result<(Message, String), NotifyError> {
        let name = recipient_name.trim();
        let to = Mailbox::new(
            (!name.is_empty()).then(|| name.to_string()),
            recipient_email.trim().parse::<Address>()?,
        );

        let body = self.templates.render(recipient_name, original_message)?;
        let message_id = format!("<{}@{}>", Uuid::new_v4(), self.from.email.domain());

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(THANK_YOU_SUBJECT)
            .message_id(Some(message_id.clone()))
            .multipart(MultiPart::alternative_plain_html(body.text, body.html))?;

        Ok((message, message_id))
    }
}

#[async_trait]
impl Notifier for SmtpMailer {
    fn kind(&self) -> &'static str {
        self.config.auth.kind()
    }

    async fn send(
        &self,
        recipient_email: &str,
        recipient_name: &str,
        original_message: &str,
    ) -> Result<Delivery, NotifyError> {
        let (message, message_id) =
            self.build_message(recipient_email, recipient_name, original_message)?;

        let transport = self.ensure_session().await?;

        info!(recipient = %recipient_email, message_id = %message_id, "thank_you_email_sending");

        match transport.send(message).await {
            Ok(response) => {
                info!(
                    recipient = %recipient_email,
                    message_id = %message_id,
                    smtp_code = %response.code(),
                    "thank_you_email_sent"
                );
                Ok(Delivery {
                    message_id,
                    recipient: recipient_email.to_string(),
                })
            }
            Err(e) => {
                warn!(recipient = %recipient_email, error = %e, "mail_session_discarded");
                self.invalidate().await;
                Err(e.into())
            }
        }
    }

    async fn verify(&self) -> Result<(), NotifyError> {
        self.invalidate().await;
        let transport = self.ensure_session().await?;

        if transport.test_connection().await? {
            info!(auth = self.kind(), "mail_configuration_verified");
            Ok(())
        } else {
            self.invalidate().await;
            Err(NotifyError::Unverified)
        }
    }
}
