//! Validation gate between normalization and persistence.

use serde::Serialize;
use tracing::warn;

use super::types::{CandidateFieldSet, Submission, REQUIRED_FIELDS};

/// Operator-facing diagnostics for a submission that was turned away.
///
/// Only extracted form fields, key names and the content type are included;
/// header values and configuration never end up here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationRejection {
    pub error: &'static str,
    pub missing: Vec<&'static str>,
    pub extracted: ExtractedFields,
    pub body_keys: Vec<String>,
    pub query_keys: Vec<String>,
    pub content_type: Option<String>,
}

/// Whatever the normalizer managed to recover for the canonical fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedFields {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
}

/// Accept the field set only if name, email and message are all non-blank.
///
/// Values are trimmed. Email format is not checked.
pub fn validate(fields: &CandidateFieldSet) -> Result<Submission, ValidationRejection> {
    let trimmed = |key: &str| fields.get_non_blank(key).map(|v| v.trim().to_string());

    match (trimmed("name"), trimmed("email"), trimmed("message")) {
        (Some(name), Some(email), Some(message)) => Ok(Submission {
            name,
            email,
            message,
        }),
        _ => {
            let missing: Vec<&'static str> = REQUIRED_FIELDS
                .into_iter()
                .filter(|key| fields.get_non_blank(key).is_none())
                .collect();

            warn!(
                missing = ?missing,
                body_keys = ?fields.body_keys,
                query_keys = ?fields.query_keys,
                content_type = ?fields.content_type,
                "submission_rejected"
            );

            Err(ValidationRejection {
                error: "Missing required fields: name, email, message",
                missing,
                extracted: ExtractedFields {
                    name: fields.get("name").map(str::to_string),
                    email: fields.get("email").map(str::to_string),
                    message: fields.get("message").map(str::to_string),
                },
                body_keys: fields.body_keys.clone(),
                query_keys: fields.query_keys.clone(),
                content_type: fields.content_type.clone(),
            })
        }
    }
}
