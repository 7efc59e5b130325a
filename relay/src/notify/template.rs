//! Thank-you email rendering.

use handlebars::Handlebars;
use serde_json::json;

use crate::error::NotifyError;

/// Subject line of the thank-you email.
pub const THANK_YOU_SUBJECT: &str = "Thanks for reaching out!";

const HTML_TEMPLATE: &str = "thank_you_html";
const TEXT_TEMPLATE: &str = "thank_you_text";

/// A rendered email body in both formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub html: String,
    pub text: String,
}

/// Compiled thank-you templates.
///
/// The HTML template escapes interpolated values; the plain-text one does not.
pub struct EmailTemplates {
    registry: Handlebars<'static>,
    sender_name: String,
    site_url: Option<String>,
}

impl EmailTemplates {
    pub fn new(sender_name: &str, site_url: Option<&str>) -> Result<Self, NotifyError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);

        registry
            .register_template_string(
                HTML_TEMPLATE,
                include_str!("../../templates/thank_you.html.hbs"),
            )
            .map_err(|e| NotifyError::Config(format!("html template: {}", e)))?;
        registry
            .register_template_string(
                TEXT_TEMPLATE,
                include_str!("../../templates/thank_you.txt.hbs"),
            )
            .map_err(|e| NotifyError::Config(format!("text template: {}", e)))?;

        Ok(Self {
            registry,
            sender_name: sender_name.to_string(),
            site_url: site_url.map(str::to_string),
        })
    }

    /// Render both bodies for one recipient.
    pub fn render(&self, name: &str, message: &str) -> Result<RenderedEmail, NotifyError> {
        let name = name.trim();
        let data = json!({
            "name": if name.is_empty() { "there" } else { name },
            "message": message.trim(),
            "sender_name": self.sender_name,
            "site_url": self.site_url,
        });

        Ok(RenderedEmail {
            html: self.registry.render(HTML_TEMPLATE, &data)?,
            text: self.registry.render(TEXT_TEMPLATE, &data)?,
        })
    }
}
