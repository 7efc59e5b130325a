//! Form Relay - contact-form webhook relay.
//!
//! Receives form submissions, stores each one as a page in a Notion database,
//! and sends the submitter a thank-you email.
//!
//! ## Architecture
//!
//! ```text
//! POST /webhook → intake (normalize, validate) → RecordSink → Notifier
//! ```

pub mod config;
pub mod error;
pub mod intake;
pub mod notify;
pub mod sink;
pub mod web;

// Re-export commonly used types
pub use config::{Config, MailAuth, MailConfig};
pub use error::{NotifyError, RelayError, SinkError};
pub use intake::{normalize, validate, CandidateFieldSet, RawInboundPayload, Submission};
pub use notify::{Delivery, Notifier, SmtpMailer};
pub use sink::{NotionSink, RecordSink};
pub use web::{router, AppState};
