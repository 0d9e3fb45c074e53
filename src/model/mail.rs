//! Body, meeting and summary types shared by stores and the adapter.

use chrono::{DateTime, Utc};

use super::address::EmailAddress;

/// Declared flavor of a structured body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    Text,
    Html,
}

/// The body as exposed by the store's standard schema.
///
/// An absent `content` is treated exactly like an empty one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredBody {
    pub kind: BodyKind,
    pub content: Option<String>,
}

impl StructuredBody {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: BodyKind::Text,
            content: Some(content.into()),
        }
    }

    pub fn html(content: impl Into<String>) -> Self {
        Self {
            kind: BodyKind::Html,
            content: Some(content.into()),
        }
    }

    /// Content, or `""` when absent.
    pub fn content_or_empty(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Meeting-request fields. Present as a whole or not at all.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MeetingFacet {
    pub location: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Serializable snapshot of a normalized message.
///
/// Not stored anywhere. Built on demand for JSON output and logging.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MessageSummary {
    pub item_id: String,
    pub subject: String,
    pub conversation_topic: String,
    pub conversation_id: Option<String>,
    pub is_html_body: bool,
    pub raw_body: String,
    pub plain_text_body: String,
    pub sender: EmailAddress,
    pub sender_alias: Option<String>,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub sent_on: DateTime<Utc>,
    pub received_on: DateTime<Utc>,
    pub meeting: Option<MeetingFacet>,
    pub attachments: Vec<AttachmentSummary>,
    pub mime_size: u64,
}

/// One attachment line in a [`MessageSummary`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct AttachmentSummary {
    pub kind: &'static str,
    pub name: String,
    pub size: u64,
}
