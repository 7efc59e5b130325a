//! Types flowing through the intake pipeline.
//!
//! ```text
//! RawInboundPayload → CandidateFieldSet → Submission → SubmissionRecord
//! ```

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::http::{header, HeaderMap};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Canonical field names every submission must carry.
pub const REQUIRED_FIELDS: [&str; 3] = ["name", "email", "message"];

/// Untyped content of one inbound request.
#[derive(Debug, Clone, Default)]
pub struct RawInboundPayload {
    /// Declared `Content-Type`, if any
    pub content_type: Option<String>,
    /// Raw request body
    pub body: Bytes,
    /// Decoded query-string pairs, in order
    pub query: Vec<(String, String)>,
    /// Header name/value pairs whose values are visible ASCII, in arrival order
    pub headers: Vec<(String, String)>,
}

impl RawInboundPayload {
    /// Capture the parts of an HTTP request the normalizer looks at.
    pub fn from_parts(headers: &HeaderMap, raw_query: Option<&str>, body: Bytes) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let query: Vec<(String, String)> = raw_query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        let headers: Vec<(String, String)> = headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Self {
            content_type,
            body,
            query,
            headers,
        }
    }
}

/// Working set of extracted fields, plus a summary of where they came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateFieldSet {
    fields: BTreeMap<String, String>,
    /// Declared content type of the request
    pub content_type: Option<String>,
    /// Top-level keys found in the body
    pub body_keys: Vec<String>,
    /// Keys found in the query string
    pub query_keys: Vec<String>,
}

impl CandidateFieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite one field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Merge pairs in order; later pairs overwrite earlier ones.
    pub fn merge<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in pairs {
            self.insert(k, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Value of `key` when present and not blank.
    pub fn get_non_blank(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}

/// A validated submission: all three fields trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl Submission {
    /// Stamp the submission with the time it is persisted.
    pub fn into_record(self, submitted_at: DateTime<Utc>) -> SubmissionRecord {
        SubmissionRecord {
            submission: self,
            submitted_at,
        }
    }
}

/// What the record sink stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub submission: Submission,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionRecord {
    /// ISO-8601 timestamp with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`.
    pub fn submitted_at_iso(&self) -> String {
        self.submitted_at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}
