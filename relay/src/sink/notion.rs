//! Notion database sink.
//!
//! Each submission becomes a page in the configured database with the
//! properties `Name` (title), `Email`, `Message` and `Date Submitted`.
//! Reference: https://developers.notion.com/reference/post-page

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use super::RecordSink;
use crate::error::SinkError;
use crate::intake::SubmissionRecord;
use crate::Config;

/// Notion rejects rich text objects longer than this many characters.
const RICH_TEXT_LIMIT: usize = 2000;

/// Writes submissions as pages of a Notion database.
#[derive(Clone)]
pub struct NotionSink {
    client: Client,
    api_url: String,
    api_key: String,
    database_id: String,
    version: String,
}

/// Error object returned by the Notion API on non-2xx responses.
#[derive(Debug, Deserialize)]
struct NotionErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NotionPage {
    #[serde(default)]
    id: Option<String>,
}

impl NotionSink {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            api_url: config.notion_api_url.clone(),
            api_key: config.notion_api_key.clone(),
            database_id: config.notion_database_id.clone(),
            version: config.notion_version.clone(),
        }
    }

    /// Build the `POST /v1/pages` request body for a record.
    pub fn page_body(&self, record: &SubmissionRecord) -> Value {
        let submission = &record.submission;

        json!({
            "parent": { "database_id": self.database_id },
            "properties": {
                "Name": {
                    "title": [{ "text": { "content": truncate_chars(&submission.name, RICH_TEXT_LIMIT) } }]
                },
                "Email": { "email": submission.email },
                "Message": {
                    "rich_text": [{ "text": { "content": truncate_chars(&submission.message, RICH_TEXT_LIMIT) } }]
                },
                "Date Submitted": { "date": { "start": record.submitted_at_iso() } },
            }
        })
    }
}

#[async_trait]
impl RecordSink for NotionSink {
    async fn create(&self, record: &SubmissionRecord) -> Result<String, SinkError> {
        let url = format!("{}/v1/pages", self.api_url);

        info!(
            database_id = %self.database_id,
            message_length = record.submission.message.len(),
            "notion_page_create_start"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Notion-Version", &self.version)
            .json(&self.page_body(record))
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let (code, message) = match serde_json::from_str::<NotionErrorBody>(&text) {
                Ok(body) => (
                    body.code.unwrap_or_else(|| "unknown".to_string()),
                    body.message.unwrap_or_default(),
                ),
                Err(_) => ("unknown".to_string(), truncate_chars(&text, 200)),
            };

            error!(
                status = status.as_u16(),
                code = %code,
                message = %message,
                "notion_page_create_failed"
            );

            return Err(SinkError::Api {
                status: status.as_u16(),
                code,
                message,
            });
        }

        let page: NotionPage = response.json().await?;
        let id = page
            .id
            .filter(|id| !id.is_empty())
            .ok_or(SinkError::InvalidResponse)?;

        info!(page_id = %id, "notion_page_created");

        Ok(id)
    }
}

fn truncate_chars(value: &str, limit: usize) -> String {
    value.chars().take(limit).collect()
}
