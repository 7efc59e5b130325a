//! Record sink: where validated submissions are stored.
//!
//! The webhook handler only depends on [`RecordSink`]; [`NotionSink`] is the
//! production implementation.

pub mod notion;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::intake::SubmissionRecord;

pub use notion::NotionSink;

/// Stores one record per submission and returns its identifier.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn create(&self, record: &SubmissionRecord) -> Result<String, SinkError>;
}
