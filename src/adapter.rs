//! The canonical message view over one store item.
//!
//! [`MessageAdapter`] owns the store and converter; [`MessageAdapter::hydrate`]
//! fetches one item in a single batch and returns an [`IncomingMessage`].
//! Conversation id bytes, recipients and attachments are resolved at
//! hydration; body text and aliases are derived when first read.
//!
//! `delete` and `move_to` consume the message, so a view whose item has left
//! its folder cannot be read again.

use std::cell::OnceCell;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use encoding_rs::Encoding;
use tracing::{debug, info};

use crate::config::{self, Config};
use crate::error::{NormalizeError, Result};
use crate::model::address::{alias_from_address, EmailAddress};
use crate::model::attachment::{sanitize_filename_part, Attachment};
use crate::model::mail::{AttachmentSummary, MeetingFacet, MessageSummary};
use crate::normalize::conversation::{self, ConversationIdMode, ConversationIndex, GUID_LEN};
use crate::normalize::html::{HtmlConverter, TagStripConverter};
use crate::normalize::{attachment, body};
use crate::store::{
    FieldSet, FolderId, ItemId, MailStore, ReplyDraft, StoreItem, PROP_TAG_CONVERSATION_ID,
    PROP_TAG_HTML,
};

/// Caller-level policy applied to every hydrated message.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    pub conversation_mode: ConversationIdMode,
    /// Encoding of the binary HTML property.
    pub body_encoding: &'static Encoding,
    /// Directory used by `save_to_file` when no path is given.
    pub save_dir: PathBuf,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            conversation_mode: ConversationIdMode::default(),
            body_encoding: encoding_rs::UTF_8,
            save_dir: std::env::temp_dir(),
        }
    }
}

impl AdapterOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            conversation_mode: config.conversation.id_mode,
            body_encoding: body::encoding_for_label(&config.body.encoding),
            save_dir: config::save_dir(config),
        }
    }

    pub fn with_conversation_mode(mut self, mode: ConversationIdMode) -> Self {
        self.conversation_mode = mode;
        self
    }
}

/// Builds [`IncomingMessage`] views from a store.
pub struct MessageAdapter<S, C = TagStripConverter> {
    store: S,
    converter: C,
    options: AdapterOptions,
}

impl<S: MailStore> MessageAdapter<S> {
    /// Adapter with the built-in HTML converter.
    pub fn with_defaults(store: S, options: AdapterOptions) -> Self {
        Self::new(store, TagStripConverter, options)
    }
}

impl<S: MailStore, C: HtmlConverter> MessageAdapter<S, C> {
    pub fn new(store: S, converter: C, options: AdapterOptions) -> Self {
        Self {
            store,
            converter,
            options,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    /// Fetch the full field set for `id` and build the message view.
    ///
    /// Any fetch failure, or a missing sent/received timestamp, is fatal.
    pub fn hydrate(&self, id: &ItemId) -> Result<IncomingMessage<'_>> {
        debug!(item = %id, "Hydrating item");
        let item = self
            .store
            .load(id, &FieldSet::message())
            .map_err(|e| match e {
                e @ NormalizeError::StoreFetch { .. } => e,
                other => NormalizeError::fetch(id, other.to_string()),
            })?;

        let sent_on = item
            .sent_on
            .ok_or_else(|| NormalizeError::fetch(id, "missing sent timestamp"))?;
        let received_on = item
            .received_on
            .ok_or_else(|| NormalizeError::fetch(id, "missing received timestamp"))?;

        let native_conversation_id =
            conversation::native_guid(item.extended(PROP_TAG_CONVERSATION_ID));
        let attachments = attachment::classify(&item.attachments);
        let sender = item.from.clone().or_else(|| item.sender.clone()).unwrap_or_default();
        let to = unique_by_address(&item.to);
        let cc = unique_by_address(&item.cc);

        Ok(IncomingMessage {
            store: &self.store,
            converter: &self.converter,
            options: &self.options,
            id: id.clone(),
            item,
            native_conversation_id,
            sender,
            to,
            cc,
            sent_on,
            received_on,
            attachments,
            plain_text: OnceCell::new(),
        })
    }
}

/// Canonical, store-agnostic view of one inbound message or meeting request.
pub struct IncomingMessage<'a> {
    store: &'a dyn MailStore,
    converter: &'a dyn HtmlConverter,
    options: &'a AdapterOptions,
    id: ItemId,
    item: StoreItem,
    native_conversation_id: Option<[u8; GUID_LEN]>,
    sender: EmailAddress,
    to: Vec<EmailAddress>,
    cc: Vec<EmailAddress>,
    sent_on: DateTime<Utc>,
    received_on: DateTime<Utc>,
    attachments: Vec<Attachment>,
    plain_text: OnceCell<String>,
}

impl std::fmt::Debug for IncomingMessage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncomingMessage")
            .field("id", &self.id)
            .field("subject", &self.subject())
            .field("sender", &self.sender)
            .field("attachments", &self.attachments.len())
            .finish_non_exhaustive()
    }
}

impl<'a> IncomingMessage<'a> {
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    // ── Identity ────────────────────────────────────────────────

    pub fn subject(&self) -> &str {
        self.item.subject.as_deref().unwrap_or("")
    }

    pub fn conversation_topic(&self) -> &str {
        self.item.conversation_topic.as_deref().unwrap_or("")
    }

    /// Uppercase hex conversation id under the configured mode.
    pub fn conversation_id(&self) -> Result<String> {
        conversation::resolve(
            self.options.conversation_mode,
            self.native_conversation_id.as_ref(),
            &self.item.conversation_index,
        )
    }

    /// Structured view of the conversation index, when it has a full header.
    pub fn conversation_index(&self) -> Option<ConversationIndex<'_>> {
        ConversationIndex::parse(&self.item.conversation_index).ok()
    }

    // ── Body ────────────────────────────────────────────────────

    pub fn raw_body(&self) -> String {
        body::raw_body(
            self.item.extended(PROP_TAG_HTML),
            self.item.body.as_ref(),
            self.options.body_encoding,
        )
    }

    /// Plain-text body. Converted once, then cached.
    pub fn plain_text_body(&self) -> &str {
        self.plain_text
            .get_or_init(|| body::plain_text_body(self.item.body.as_ref(), self.converter))
    }

    pub fn is_html_body(&self) -> bool {
        body::is_html(self.item.body.as_ref())
    }

    // ── Participants ────────────────────────────────────────────

    pub fn sender(&self) -> &EmailAddress {
        &self.sender
    }

    pub fn sender_name(&self) -> &str {
        &self.sender.name
    }

    pub fn sender_address(&self) -> &str {
        &self.sender.address
    }

    /// Local part of the sender address; fails only when it is empty.
    pub fn sender_alias(&self) -> Result<String> {
        alias_from_address(Some(&self.sender.address))
    }

    pub fn to(&self) -> &[EmailAddress] {
        &self.to
    }

    pub fn cc(&self) -> &[EmailAddress] {
        &self.cc
    }

    pub fn to_addresses(&self) -> Vec<&str> {
        addresses(&self.to)
    }

    pub fn to_names(&self) -> Vec<&str> {
        names(&self.to)
    }

    pub fn cc_addresses(&self) -> Vec<&str> {
        addresses(&self.cc)
    }

    pub fn cc_names(&self) -> Vec<&str> {
        names(&self.cc)
    }

    // ── Time ────────────────────────────────────────────────────

    pub fn sent_on(&self) -> DateTime<Utc> {
        self.sent_on
    }

    pub fn received_on(&self) -> DateTime<Utc> {
        self.received_on
    }

    // ── Meeting ─────────────────────────────────────────────────

    pub fn is_meeting_request(&self) -> bool {
        self.item.meeting.is_some()
    }

    pub fn meeting(&self) -> Option<&MeetingFacet> {
        self.item.meeting.as_ref()
    }

    /// Meeting location, `""` when the item is not a meeting request.
    pub fn location(&self) -> &str {
        self.item
            .meeting
            .as_ref()
            .map(|m| m.location.as_str())
            .unwrap_or("")
    }

    pub fn meeting_start(&self) -> Option<DateTime<Utc>> {
        self.item.meeting.as_ref().map(|m| m.start)
    }

    pub fn meeting_end(&self) -> Option<DateTime<Utc>> {
        self.item.meeting.as_ref().map(|m| m.end)
    }

    // ── Attachments & MIME ──────────────────────────────────────

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn mime_content(&self) -> &[u8] {
        &self.item.mime_content
    }

    /// Write the MIME blob verbatim to `path`, or to the configured save
    /// directory under a generated name. Existing files are overwritten.
    pub fn save_to_file(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => self.options.save_dir.join(self.default_filename()),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| NormalizeError::io(parent, e))?;
        }

        let file = std::fs::File::create(&path).map_err(|e| NormalizeError::io(&path, e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&self.item.mime_content)
            .and_then(|()| writer.flush())
            .map_err(|e| NormalizeError::io(&path, e))?;

        info!(
            item = %self.id,
            path = %path.display(),
            bytes = self.item.mime_content.len(),
            "Saved MIME content"
        );
        Ok(path)
    }

    /// Generated filename: `{received}_{sender}_{subject}.eml`, at most 200 chars.
    pub fn default_filename(&self) -> String {
        let date = self.received_on.format("%Y%m%d_%H%M%S");
        let from = sanitize_filename_part(&self.sender.address, 30);
        let subject = sanitize_filename_part(self.subject(), 80);

        let name = format!("{date}_{from}_{subject}");
        let truncated: String = name.chars().take(196).collect();
        format!("{truncated}.eml")
    }

    // ── Store operations ────────────────────────────────────────

    /// Delete the item in the store. The view is consumed.
    pub fn delete(self, move_to_trash: bool) -> Result<()> {
        info!(item = %self.id, move_to_trash, "Deleting item");
        self.store
            .delete_item(&self.id, move_to_trash)
            .map_err(|e| operation_error("delete", &self.id, e))
    }

    /// Move the item to `destination`. The view is consumed.
    pub fn move_to(self, destination: &FolderId) -> Result<()> {
        info!(item = %self.id, destination = %destination, "Moving item");
        self.store
            .move_item(&self.id, destination)
            .map_err(|e| operation_error("move", &self.id, e))
    }

    /// Send a reply with an HTML body.
    pub fn reply(&self, html_body: &str, reply_all: bool) -> Result<()> {
        info!(item = %self.id, reply_all, "Sending reply");
        let draft = ReplyDraft {
            html_body: html_body.to_string(),
            reply_all,
        };
        self.store
            .send_reply(&self.id, &draft)
            .map_err(|e| operation_error("reply", &self.id, e))
    }

    // ── Snapshot ────────────────────────────────────────────────

    /// Serializable snapshot of every derived field.
    pub fn summary(&self) -> MessageSummary {
        MessageSummary {
            item_id: self.id.to_string(),
            subject: self.subject().to_string(),
            conversation_topic: self.conversation_topic().to_string(),
            conversation_id: self.conversation_id().ok(),
            is_html_body: self.is_html_body(),
            raw_body: self.raw_body(),
            plain_text_body: self.plain_text_body().to_string(),
            sender: self.sender.clone(),
            sender_alias: self.sender_alias().ok(),
            to: self.to.clone(),
            cc: self.cc.clone(),
            sent_on: self.sent_on,
            received_on: self.received_on,
            meeting: self.item.meeting.clone(),
            attachments: self
                .attachments
                .iter()
                .map(|a| AttachmentSummary {
                    kind: if a.is_file() { "file" } else { "item" },
                    name: a.name().to_string(),
                    size: a.content().len() as u64,
                })
                .collect(),
            mime_size: self.item.mime_content.len() as u64,
        }
    }
}

fn operation_error(op: &'static str, id: &ItemId, err: NormalizeError) -> NormalizeError {
    match err {
        e @ NormalizeError::StoreOperation { .. } => e,
        other => NormalizeError::operation(op, id, other.to_string()),
    }
}

/// Drop repeated addresses (case-insensitive), keeping first occurrence order.
fn unique_by_address(list: &[EmailAddress]) -> Vec<EmailAddress> {
    let mut seen: Vec<String> = Vec::with_capacity(list.len());
    list.iter()
        .filter(|a| {
            let key = a.address.to_lowercase();
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        })
        .cloned()
        .collect()
}

fn addresses(list: &[EmailAddress]) -> Vec<&str> {
    list.iter().map(|a| a.address.as_str()).collect()
}

/// Non-empty display names, without repeats.
fn names(list: &[EmailAddress]) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for name in list.iter().map(|a| a.name.as_str()) {
        if !name.is_empty() && !out.contains(&name) {
            out.push(name);
        }
    }
    out
}
