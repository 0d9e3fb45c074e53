//! A mail store backed by a directory of `.eml` files.
//!
//! Layout:
//!
//! ```text
//! root/
//!   inbox/1.eml          item id "inbox/1.eml", folder "inbox"
//!   archive/2.eml
//!   .trash/              soft-deleted items
//!   outbox/              replies written by `send_reply`
//! ```
//!
//! Item ids are paths relative to the root, folders are subdirectories.

use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::{Address, Message};
use tracing::{debug, info, warn};

use super::{FieldSet, FolderId, ItemId, MailStore, ReplyDraft, StoreItem};
use crate::error::{NormalizeError, Result};
use crate::model::address::EmailAddress;
use crate::model::attachment::{sanitize_filename_part, unique_path};
use crate::parser::mime::{self, ParsedMessage};

/// Folder soft-deleted items are moved to.
pub const TRASH_DIR: &str = ".trash";

/// Folder replies are written to.
pub const OUTBOX_DIR: &str = "outbox";

#[derive(Debug, Clone)]
pub struct EmlDirStore {
    root: PathBuf,
}

impl EmlDirStore {
    /// Open an existing directory as a store.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let meta = std::fs::metadata(&root).map_err(|e| NormalizeError::io(&root, e))?;
        if !meta.is_dir() {
            return Err(NormalizeError::InvalidArgument(format!(
                "not a directory: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Item ids in `folder` (the root when `None`), sorted.
    pub fn list(&self, folder: Option<&FolderId>) -> Result<Vec<ItemId>> {
        let dir = match folder {
            Some(f) => self.resolve(&f.0)?,
            None => self.root.clone(),
        };
        let entries = std::fs::read_dir(&dir).map_err(|e| NormalizeError::io(&dir, e))?;

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| NormalizeError::io(&dir, e))?.path();
            let is_eml = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("eml"));
            if is_eml && path.is_file() {
                ids.push(self.id_for(&path));
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Parse an item together with its threading headers.
    pub fn load_parsed(&self, id: &ItemId) -> Result<ParsedMessage> {
        let path = self.existing(id)?;
        let raw = std::fs::read(&path).map_err(|e| NormalizeError::io(&path, e))?;
        let mut parsed = mime::parse_message(&raw);
        parsed.item.id = Some(id.clone());
        Ok(parsed)
    }

    /// Join a relative id or folder onto the root, refusing to escape it.
    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let rel = Path::new(relative);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if relative.is_empty() || escapes {
            return Err(NormalizeError::InvalidArgument(format!(
                "path must stay inside the store: '{relative}'"
            )));
        }
        Ok(self.root.join(rel))
    }

    fn existing(&self, id: &ItemId) -> Result<PathBuf> {
        let path = self.resolve(&id.0)?;
        if path.is_file() {
            Ok(path)
        } else {
            Err(NormalizeError::ItemNotFound(id.to_string()))
        }
    }

    fn id_for(&self, path: &Path) -> ItemId {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        ItemId(parts.join("/"))
    }

    /// Move `path` into `folder`, keeping its file name unless taken.
    fn relocate(&self, path: &Path, folder: &str) -> Result<PathBuf> {
        let dir = self.resolve(folder)?;
        std::fs::create_dir_all(&dir).map_err(|e| NormalizeError::io(&dir, e))?;
        let file_name = path
            .file_name()
            .ok_or_else(|| NormalizeError::InvalidArgument(path.display().to_string()))?;
        let target = unique_path(&dir.join(file_name));
        std::fs::rename(path, &target).map_err(|e| NormalizeError::io(path, e))?;
        Ok(target)
    }
}

impl MailStore for EmlDirStore {
    fn load(&self, id: &ItemId, _fields: &FieldSet) -> Result<StoreItem> {
        // Parsing a file yields every field at once
        debug!(item = %id, "Loading item from disk");
        self.load_parsed(id).map(|parsed| parsed.item)
    }

    fn delete_item(&self, id: &ItemId, move_to_trash: bool) -> Result<()> {
        let path = self.existing(id)?;
        if move_to_trash {
            let target = self.relocate(&path, TRASH_DIR)?;
            info!(item = %id, trash = %target.display(), "Moved item to trash");
        } else {
            std::fs::remove_file(&path).map_err(|e| NormalizeError::io(&path, e))?;
            info!(item = %id, "Removed item");
        }
        Ok(())
    }

    fn move_item(&self, id: &ItemId, destination: &FolderId) -> Result<()> {
        let path = self.existing(id)?;
        let target = self.relocate(&path, &destination.0)?;
        info!(item = %id, target = %target.display(), "Moved item");
        Ok(())
    }

    fn send_reply(&self, id: &ItemId, reply: &ReplyDraft) -> Result<()> {
        let original = self.load_parsed(id)?;
        let now = Utc::now();
        let message = compose_reply(&original, reply, now)?;

        let subject = original.item.subject.as_deref().unwrap_or("");
        let dir = self.resolve(OUTBOX_DIR)?;
        std::fs::create_dir_all(&dir).map_err(|e| NormalizeError::io(&dir, e))?;
        let path = unique_path(&dir.join(format!(
            "{}_{}.eml",
            now.format("%Y%m%d_%H%M%S"),
            sanitize_filename_part(&reply_subject(subject), 80)
        )));
        std::fs::write(&path, message).map_err(|e| NormalizeError::io(&path, e))?;

        info!(item = %id, reply_all = reply.reply_all, path = %path.display(), "Wrote reply");
        Ok(())
    }
}

/// `Re: ` prefix unless the subject already carries one.
///
/// Line breaks and whitespace runs collapse to single spaces.
pub fn reply_subject(subject: &str) -> String {
    let subject = single_line(subject);
    if subject.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("re:")) {
        subject
    } else {
        format!("Re: {subject}")
    }
}

/// Build an RFC 5322 reply with an HTML body.
///
/// The first `To` recipient of the original is taken as our own address:
/// it becomes `From` and is left out of reply-all recipients. Recipients
/// whose address does not parse are skipped.
pub fn compose_reply(
    original: &ParsedMessage,
    reply: &ReplyDraft,
    now: DateTime<Utc>,
) -> Result<Vec<u8>> {
    let item = &original.item;
    let me = item.to.first();
    let is_me = |a: &EmailAddress| me.is_some_and(|m| m.address.eq_ignore_ascii_case(&a.address));

    let mut to: Vec<EmailAddress> = if original.reply_to.is_empty() {
        item.from.iter().chain(item.sender.iter()).take(1).cloned().collect()
    } else {
        original.reply_to.clone()
    };
    let mut cc = Vec::new();
    if reply.reply_all {
        for addr in item.to.iter().filter(|a| !is_me(a)) {
            push_unique(&mut to, addr);
        }
        for addr in item.cc.iter().filter(|a| !is_me(a)) {
            if !to.iter().any(|t| t.address.eq_ignore_ascii_case(&addr.address)) {
                push_unique(&mut cc, addr);
            }
        }
    }

    let from = me.and_then(mailbox).ok_or_else(|| {
        NormalizeError::InvalidArgument("original message has no recipient to reply as".into())
    })?;
    let mut builder = Message::builder()
        .from(from)
        .subject(reply_subject(item.subject.as_deref().unwrap_or("")))
        .date(SystemTime::from(now));
    for mbox in to.iter().filter_map(mailbox) {
        builder = builder.to(mbox);
    }
    for mbox in cc.iter().filter_map(mailbox) {
        builder = builder.cc(mbox);
    }
    if let Some(ref message_id) = original.message_id {
        let mut references = original.references.clone();
        references.push(message_id.clone());
        builder = builder
            .in_reply_to(message_id.clone())
            .references(references.join(" "));
    }

    let message = builder
        .header(ContentType::TEXT_HTML)
        .body(reply.html_body.clone())
        .map_err(|e| NormalizeError::InvalidArgument(format!("cannot build reply: {e}")))?;
    Ok(message.formatted())
}

fn push_unique(list: &mut Vec<EmailAddress>, addr: &EmailAddress) {
    if !list
        .iter()
        .any(|a| a.address.eq_ignore_ascii_case(&addr.address))
    {
        list.push(addr.clone());
    }
}

fn mailbox(addr: &EmailAddress) -> Option<Mailbox> {
    match addr.address.parse::<Address>() {
        Ok(email) => {
            let name = single_line(&addr.name);
            Some(Mailbox::new((!name.is_empty()).then_some(name), email))
        }
        Err(e) => {
            warn!(address = %addr.address, error = %e, "Skipping unusable reply address");
            None
        }
    }
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
