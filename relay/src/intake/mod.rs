//! Submission intake: turning a raw webhook request into a validated submission.
//!
//! ## Processing Flow
//!
//! ```text
//! RawInboundPayload → normalize() → CandidateFieldSet → validate() → Submission
//! ```

pub mod normalizer;
pub mod types;
pub mod validation;

pub use normalizer::{normalize, resolve_aliases, FIELD_ALIASES};
pub use types::{
    CandidateFieldSet, RawInboundPayload, Submission, SubmissionRecord, REQUIRED_FIELDS,
};
pub use validation::{validate, ExtractedFields, ValidationRejection};
