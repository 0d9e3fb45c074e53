//! In-memory mail store.
//!
//! Holds fully populated [`StoreItem`]s keyed by id and records every call
//! made against it. Useful for embedding and for exercising the adapter
//! without a real server.

use std::cell::RefCell;
use std::collections::BTreeMap;

use tracing::debug;

use super::{FieldSet, FolderId, ItemId, MailStore, ReplyDraft, StoreItem};
use crate::error::{NormalizeError, Result};

/// Folder items land in when deleted with `move_to_trash`.
pub const TRASH_FOLDER: &str = "deleteditems";

/// One recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Load(ItemId),
    Delete { id: ItemId, move_to_trash: bool },
    Move { id: ItemId, destination: FolderId },
    Reply { id: ItemId, draft: ReplyDraft },
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RefCell<BTreeMap<ItemId, (FolderId, StoreItem)>>,
    calls: RefCell<Vec<StoreCall>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an item in `folder`.
    pub fn insert(&self, folder: &str, id: &str, mut item: StoreItem) {
        let id = ItemId::from(id);
        item.id = Some(id.clone());
        self.items
            .borrow_mut()
            .insert(id, (FolderId::from(folder), item));
    }

    /// Drop an item without recording a call.
    pub fn remove(&self, id: &ItemId) -> Option<StoreItem> {
        self.items.borrow_mut().remove(id).map(|(_, item)| item)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.borrow().contains_key(id)
    }

    pub fn folder_of(&self, id: &ItemId) -> Option<FolderId> {
        self.items.borrow().get(id).map(|(folder, _)| folder.clone())
    }

    /// Ids of every item in `folder`, sorted.
    pub fn list(&self, folder: &FolderId) -> Vec<ItemId> {
        self.items
            .borrow()
            .iter()
            .filter(|(_, (f, _))| f == folder)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: StoreCall) {
        debug!(?call, "Memory store call");
        self.calls.borrow_mut().push(call);
    }
}

impl MailStore for MemoryStore {
    fn load(&self, id: &ItemId, _fields: &FieldSet) -> Result<StoreItem> {
        self.record(StoreCall::Load(id.clone()));
        self.items
            .borrow()
            .get(id)
            .map(|(_, item)| item.clone())
            .ok_or_else(|| NormalizeError::ItemNotFound(id.to_string()))
    }

    fn delete_item(&self, id: &ItemId, move_to_trash: bool) -> Result<()> {
        self.record(StoreCall::Delete {
            id: id.clone(),
            move_to_trash,
        });
        let mut items = self.items.borrow_mut();
        if move_to_trash {
            let (folder, _) = items
                .get_mut(id)
                .ok_or_else(|| NormalizeError::ItemNotFound(id.to_string()))?;
            *folder = FolderId::from(TRASH_FOLDER);
        } else if items.remove(id).is_none() {
            return Err(NormalizeError::ItemNotFound(id.to_string()));
        }
        Ok(())
    }

    fn move_item(&self, id: &ItemId, destination: &FolderId) -> Result<()> {
        self.record(StoreCall::Move {
            id: id.clone(),
            destination: destination.clone(),
        });
        let mut items = self.items.borrow_mut();
        let (folder, _) = items
            .get_mut(id)
            .ok_or_else(|| NormalizeError::ItemNotFound(id.to_string()))?;
        *folder = destination.clone();
        Ok(())
    }

    fn send_reply(&self, id: &ItemId, reply: &ReplyDraft) -> Result<()> {
        self.record(StoreCall::Reply {
            id: id.clone(),
            draft: reply.clone(),
        });
        if !self.contains(id) {
            return Err(NormalizeError::ItemNotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing() {
        let store = MemoryStore::new();
        let err = store.load(&"x".into(), &FieldSet::message()).unwrap_err();
        assert!(matches!(err, NormalizeError::ItemNotFound(_)));
        assert_eq!(store.calls(), vec![StoreCall::Load("x".into())]);
    }

    #[test]
    fn test_delete_to_trash_and_hard_delete() {
        let store = MemoryStore::new();
        store.insert("inbox", "a", StoreItem::default());
        store.insert("inbox", "b", StoreItem::default());

        store.delete_item(&"a".into(), true).unwrap();
        assert_eq!(store.folder_of(&"a".into()), Some(TRASH_FOLDER.into()));

        store.delete_item(&"b".into(), false).unwrap();
        assert!(!store.contains(&"b".into()));
        assert!(store.delete_item(&"b".into(), false).is_err());
    }

    #[test]
    fn test_move_and_list() {
        let store = MemoryStore::new();
        store.insert("inbox", "a", StoreItem::default());
        store.insert("inbox", "b", StoreItem::default());
        store.move_item(&"a".into(), &"archive".into()).unwrap();

        assert_eq!(store.list(&"inbox".into()), vec![ItemId::from("b")]);
        assert_eq!(store.list(&"archive".into()), vec![ItemId::from("a")]);
    }

    #[test]
    fn test_loaded_item_carries_id() {
        let store = MemoryStore::new();
        store.insert("inbox", "a", StoreItem::default());
        let item = store.load(&"a".into(), &FieldSet::message()).unwrap();
        assert_eq!(item.id, Some(ItemId::from("a")));
    }
}
