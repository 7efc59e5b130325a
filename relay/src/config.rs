//! Configuration module for environment variable parsing.
//!
//! Everything is read once at startup. Secrets never appear in `Debug` output.

use std::env;
use std::fmt;
use tracing::warn;

/// Default Notion API base URL.
pub const DEFAULT_NOTION_API_URL: &str = "https://api.notion.com";

/// Notion API version the page payload is written against.
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";

/// Google's OAuth2 token endpoint.
pub const DEFAULT_OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Notion integration token
    pub notion_api_key: String,

    /// Notion database that receives one page per submission
    pub notion_database_id: String,

    /// Notion API base URL (overridable for tests and proxies)
    pub notion_api_url: String,

    /// Value of the `Notion-Version` header
    pub notion_version: String,

    /// Timeout applied to outbound HTTP requests, in milliseconds
    pub http_timeout_ms: u64,

    /// Thank-you email settings; `None` disables the notifier
    pub mail: Option<MailConfig>,
}

/// Settings for the SMTP thank-you mailer.
#[derive(Clone)]
pub struct MailConfig {
    /// Sending account, also used as the SMTP username
    pub user: String,

    /// How the mailer authenticates against the relay
    pub auth: MailAuth,

    /// SMTP relay host (implicit TLS)
    pub smtp_host: String,

    /// OAuth2 token endpoint used by [`MailAuth::OAuth2`]
    pub token_url: String,

    /// Display name in the `From` header and email signature
    pub from_name: String,

    /// Optional link rendered as a call to action
    pub site_url: Option<String>,
}

/// SMTP authorization strategy.
#[derive(Clone, PartialEq, Eq)]
pub enum MailAuth {
    /// Static application password.
    AppPassword { password: String },
    /// Refresh-token exchange for a short-lived XOAUTH2 access token.
    OAuth2 {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
}

impl MailAuth {
    /// Short label used in logs and the diagnostics route.
    pub fn kind(&self) -> &'static str {
        match self {
            MailAuth::AppPassword { .. } => "app_password",
            MailAuth::OAuth2 { .. } => "oauth2",
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Config {
            port: parse_or(&lookup, "PORT", 3000),

            notion_api_key: lookup("NOTION_API_KEY").unwrap_or_default(),

            notion_database_id: lookup("NOTION_DATABASE_ID").unwrap_or_default(),

            notion_api_url: non_empty(&lookup, "NOTION_API_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_NOTION_API_URL.to_string()),

            notion_version: non_empty(&lookup, "NOTION_VERSION")
                .unwrap_or_else(|| DEFAULT_NOTION_VERSION.to_string()),

            http_timeout_ms: parse_or(&lookup, "HTTP_TIMEOUT_MS", 10_000),

            mail: mail_config(&lookup),
        }
    }

    /// Whether both Notion settings are present.
    pub fn notion_configured(&self) -> bool {
        !self.notion_api_key.trim().is_empty() && !self.notion_database_id.trim().is_empty()
    }
}

/// Build the mailer settings, preferring OAuth2 when all three OAuth values are set.
fn mail_config<F>(lookup: &F) -> Option<MailConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let user = non_empty(lookup, "GMAIL_USER")?;

    let oauth = (
        non_empty(lookup, "GMAIL_CLIENT_ID"),
        non_empty(lookup, "GMAIL_CLIENT_SECRET"),
        non_empty(lookup, "GMAIL_REFRESH_TOKEN"),
    );

    let auth = match oauth {
        (Some(client_id), Some(client_secret), Some(refresh_token)) => MailAuth::OAuth2 {
            client_id,
            client_secret,
            refresh_token,
        },
        _ => match non_empty(lookup, "GMAIL_APP_PASSWORD") {
            Some(password) => MailAuth::AppPassword { password },
            None => {
                warn!(user = %user, "mail_credentials_missing");
                return None;
            }
        },
    };

    Some(MailConfig {
        user,
        auth,
        smtp_host: non_empty(lookup, "SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
        token_url: non_empty(lookup, "OAUTH_TOKEN_URL")
            .unwrap_or_else(|| DEFAULT_OAUTH_TOKEN_URL.to_string()),
        from_name: non_empty(lookup, "MAIL_FROM_NAME").unwrap_or_else(|| "Form Relay".to_string()),
        site_url: non_empty(lookup, "SITE_URL"),
    })
}

/// Read a variable, treating blank values as unset.
fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable, falling back to `default` when unset or invalid.
fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy,
{
    match non_empty(lookup, name) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }),
        None => default,
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("notion_api_key_set", &!self.notion_api_key.is_empty())
            .field("notion_database_id", &self.notion_database_id)
            .field("notion_api_url", &self.notion_api_url)
            .field("notion_version", &self.notion_version)
            .field("http_timeout_ms", &self.http_timeout_ms)
            .field("mail", &self.mail)
            .finish()
    }
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("user", &self.user)
            .field("auth", &self.auth.kind())
            .field("smtp_host", &self.smtp_host)
            .field("token_url", &self.token_url)
            .field("from_name", &self.from_name)
            .field("site_url", &self.site_url)
            .finish()
    }
}
