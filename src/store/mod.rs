//! The mail-store boundary: what a store hands back for one item, and the
//! operations the adapter forwards to it.

pub mod eml_dir;
pub mod memory;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::address::EmailAddress;
use crate::model::mail::{MeetingFacet, StructuredBody};

/// `PidTagHtml`: binary HTML body.
pub const PROP_TAG_HTML: u32 = 0x1013;

/// `PidTagConversationId`: 16-byte native conversation id.
pub const PROP_TAG_CONVERSATION_ID: u32 = 0x3013;

/// Opaque store-assigned item identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub String);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque store-assigned folder identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderId(pub String);

impl std::fmt::Display for FolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FolderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A field a store can be asked to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Subject,
    Body,
    Extended(u32),
    ConversationIndex,
    ConversationTopic,
    Sender,
    From,
    ToRecipients,
    CcRecipients,
    MimeContent,
    SentOn,
    ReceivedOn,
    Attachments,
    Meeting,
}

/// The set of fields requested in one `load` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet(Vec<Field>);

impl FieldSet {
    /// Everything a normalized message needs, fetched as one batch.
    pub fn message() -> Self {
        Self(vec![
            Field::Subject,
            Field::Body,
            Field::Extended(PROP_TAG_HTML),
            Field::ConversationIndex,
            Field::Extended(PROP_TAG_CONVERSATION_ID),
            Field::Sender,
            Field::From,
            Field::ToRecipients,
            Field::CcRecipients,
            Field::MimeContent,
            Field::SentOn,
            Field::ReceivedOn,
            Field::ConversationTopic,
            Field::Attachments,
            Field::Meeting,
        ])
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains(&field)
    }

    pub fn fields(&self) -> &[Field] {
        &self.0
    }
}

/// A numerically tagged binary property outside the standard schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedProperty {
    pub tag: u32,
    pub value: Vec<u8>,
}

/// An attachment exactly as reported by the store, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawAttachment {
    File {
        name: Option<String>,
        content_type: Option<String>,
        content_id: Option<String>,
        is_inline: bool,
        content: Vec<u8>,
    },
    Item {
        name: Option<String>,
        subject: Option<String>,
        mime_content: Vec<u8>,
    },
    /// A link to content held elsewhere (cloud file share).
    Reference { name: Option<String>, url: String },
    /// Any kind this crate does not know about.
    Other { kind: String, name: Option<String> },
}

/// One hydrated store item: the answer to a [`FieldSet::message`] request.
#[derive(Debug, Clone, Default)]
pub struct StoreItem {
    pub id: Option<ItemId>,
    pub subject: Option<String>,
    pub body: Option<StructuredBody>,
    pub extended_properties: Vec<ExtendedProperty>,
    pub conversation_index: Vec<u8>,
    pub conversation_topic: Option<String>,
    pub sender: Option<EmailAddress>,
    pub from: Option<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub mime_content: Vec<u8>,
    pub sent_on: Option<DateTime<Utc>>,
    pub received_on: Option<DateTime<Utc>>,
    pub attachments: Vec<RawAttachment>,
    /// Set only when the item is a meeting request.
    pub meeting: Option<MeetingFacet>,
}

impl StoreItem {
    /// Value of the extended property with `tag`, if the store returned one.
    pub fn extended(&self, tag: u32) -> Option<&[u8]> {
        self.extended_properties
            .iter()
            .find(|p| p.tag == tag)
            .map(|p| p.value.as_slice())
    }

    /// Set or replace an extended property.
    pub fn set_extended(&mut self, tag: u32, value: Vec<u8>) {
        self.extended_properties.retain(|p| p.tag != tag);
        self.extended_properties.push(ExtendedProperty { tag, value });
    }
}

/// A reply to send through the store. The body is always HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyDraft {
    pub html_body: String,
    pub reply_all: bool,
}

/// A remote or local mail store.
///
/// Every call is blocking. Retries, batching and authentication are the
/// implementation's business.
pub trait MailStore {
    /// Fetch `fields` for one item in a single round trip.
    fn load(&self, id: &ItemId, fields: &FieldSet) -> Result<StoreItem>;

    /// Delete an item, either to the trash folder or permanently.
    fn delete_item(&self, id: &ItemId, move_to_trash: bool) -> Result<()>;

    /// Move an item into another folder.
    fn move_item(&self, id: &ItemId, destination: &FolderId) -> Result<()>;

    /// Create a reply to an item and send it.
    fn send_reply(&self, id: &ItemId, reply: &ReplyDraft) -> Result<()>;
}

impl<S: MailStore + ?Sized> MailStore for &S {
    fn load(&self, id: &ItemId, fields: &FieldSet) -> Result<StoreItem> {
        (**self).load(id, fields)
    }

    fn delete_item(&self, id: &ItemId, move_to_trash: bool) -> Result<()> {
        (**self).delete_item(id, move_to_trash)
    }

    fn move_item(&self, id: &ItemId, destination: &FolderId) -> Result<()> {
        (**self).move_item(id, destination)
    }

    fn send_reply(&self, id: &ItemId, reply: &ReplyDraft) -> Result<()> {
        (**self).send_reply(id, reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_field_set_covers_extended_tags() {
        let fields = FieldSet::message();
        assert!(fields.contains(Field::Extended(PROP_TAG_HTML)));
        assert!(fields.contains(Field::Extended(PROP_TAG_CONVERSATION_ID)));
        assert!(fields.contains(Field::MimeContent));
        assert!(!fields.contains(Field::Extended(0x0037)));
    }

    #[test]
    fn test_set_extended_replaces() {
        let mut item = StoreItem::default();
        item.set_extended(PROP_TAG_HTML, b"a".to_vec());
        item.set_extended(PROP_TAG_HTML, b"b".to_vec());
        assert_eq!(item.extended_properties.len(), 1);
        assert_eq!(item.extended(PROP_TAG_HTML), Some(&b"b"[..]));
        assert_eq!(item.extended(PROP_TAG_CONVERSATION_ID), None);
    }
}
