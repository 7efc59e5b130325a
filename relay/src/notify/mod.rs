//! Thank-you email notifications.
//!
//! Notification is best-effort: the webhook handler logs and swallows every
//! [`NotifyError`](crate::error::NotifyError) so that a mail outage never
//! blocks capturing a submission.

pub mod mailer;
pub mod oauth;
pub mod template;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::NotifyError;

pub use mailer::SmtpMailer;
pub use oauth::{AccessToken, OAuthClient};
pub use template::{EmailTemplates, RenderedEmail, THANK_YOU_SUBJECT};

/// Outcome of a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub message_id: String,
    pub recipient: String,
}

/// Capability to acknowledge a submission by email.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short label for the configured delivery mechanism.
    fn kind(&self) -> &'static str;

    /// Send one thank-you email. Called at most once per submission.
    async fn send(
        &self,
        recipient_email: &str,
        recipient_name: &str,
        original_message: &str,
    ) -> Result<Delivery, NotifyError>;

    /// Build a fresh session and check that the server accepts it.
    async fn verify(&self) -> Result<(), NotifyError>;
}
