//! Integration tests: `.eml` directory store through the message adapter.

use std::path::{Path, PathBuf};

use mailnorm::adapter::{AdapterOptions, MessageAdapter};
use mailnorm::error::NormalizeError;
use mailnorm::model::attachment::Attachment;
use mailnorm::normalize::conversation::ConversationIdMode;
use mailnorm::store::eml_dir::{EmlDirStore, OUTBOX_DIR, TRASH_DIR};
use mailnorm::store::{FolderId, ItemId};

fn fixture_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("store")
}

/// Copy the fixture store into a scratch directory so tests can mutate it.
fn scratch_store() -> (tempfile::TempDir, EmlDirStore) {
    let dir = tempfile::tempdir().unwrap();
    copy_tree(&fixture_root(), dir.path());
    let store = EmlDirStore::open(dir.path()).unwrap();
    (dir, store)
}

fn copy_tree(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).unwrap();
    for entry in std::fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_tree(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), &target).unwrap();
        }
    }
}

fn options(save_dir: &Path) -> AdapterOptions {
    AdapterOptions {
        save_dir: save_dir.to_path_buf(),
        ..AdapterOptions::default()
    }
}

// ─── Listing ────────────────────────────────────────────────────────

#[test]
fn test_list_inbox() {
    let store = EmlDirStore::open(fixture_root()).unwrap();
    let ids = store.list(Some(&FolderId::from("inbox"))).unwrap();
    assert_eq!(
        ids,
        vec![
            ItemId::from("inbox/invite.eml"),
            ItemId::from("inbox/report.eml"),
            ItemId::from("inbox/undated.eml"),
        ]
    );
}

// ─── Meeting invitation ─────────────────────────────────────────────

#[test]
fn test_hydrate_meeting_invite() {
    let store = EmlDirStore::open(fixture_root()).unwrap();
    let adapter = MessageAdapter::with_defaults(store, AdapterOptions::default());
    let msg = adapter.hydrate(&ItemId::from("inbox/invite.eml")).unwrap();

    assert_eq!(msg.subject(), "Planning");
    assert_eq!(msg.conversation_topic(), "Planning");
    assert_eq!(msg.sender_name(), "Doe, Jane");
    assert_eq!(msg.sender_alias().unwrap(), "jdoe");
    assert_eq!(msg.to_addresses(), vec!["me@example.com", "ops@example.com"]);
    assert_eq!(msg.cc_addresses(), vec!["OPS@example.com", "boss@example.com"]);
    assert_eq!(msg.cc_names(), vec!["Boss"]);

    assert!(msg.is_meeting_request());
    assert_eq!(msg.location(), "Room 4");
    assert_eq!(
        msg.meeting_start().unwrap().format("%H:%M").to_string(),
        "14:00"
    );
    assert_eq!(
        msg.received_on().format("%Y-%m-%d %H:%M:%S").to_string(),
        "2024-03-05 09:00:05"
    );
}

#[test]
fn test_invite_body_is_html() {
    let store = EmlDirStore::open(fixture_root()).unwrap();
    let adapter = MessageAdapter::with_defaults(store, AdapterOptions::default());
    let msg = adapter.hydrate(&ItemId::from("inbox/invite.eml")).unwrap();

    assert!(msg.is_html_body());
    assert!(msg.raw_body().contains("<p>Let&#39;s plan.</p>"));
    let text = msg.plain_text_body();
    assert!(text.contains("Let's plan."));
    assert!(text.contains("Room 4 & coffee"));
    assert!(!text.contains('<'));
}

#[test]
fn test_conversation_id_modes() {
    let store = EmlDirStore::open(fixture_root()).unwrap();
    let id = ItemId::from("inbox/invite.eml");

    let adapter = MessageAdapter::with_defaults(&store, AdapterOptions::default());
    let msg = adapter.hydrate(&id).unwrap();
    assert_eq!(
        msg.conversation_id().unwrap(),
        "01D9692F1F0000112233445566778899AABBCCDDEEFF0000012C10"
    );
    assert_eq!(msg.conversation_index().unwrap().reply_depth(), 1);

    // The native id wins over the GUID embedded in the index
    let guid_only =
        AdapterOptions::default().with_conversation_mode(ConversationIdMode::GuidOnly);
    let adapter = MessageAdapter::with_defaults(&store, guid_only);
    let msg = adapter.hydrate(&id).unwrap();
    assert_eq!(
        msg.conversation_id().unwrap(),
        "A1B2C3D4E5F60718293A4B5C6D7E8F90"
    );
}

#[test]
fn test_guid_only_without_native_id_uses_index_guid() {
    let store = EmlDirStore::open(fixture_root()).unwrap();
    let options = AdapterOptions::default().with_conversation_mode(ConversationIdMode::GuidOnly);
    let adapter = MessageAdapter::with_defaults(store, options);
    let msg = adapter.hydrate(&ItemId::from("inbox/report.eml")).unwrap();
    assert_eq!(
        msg.conversation_id().unwrap(),
        "00112233445566778899AABBCCDDEEFF"
    );
}

// ─── Attachments ────────────────────────────────────────────────────

#[test]
fn test_attachments_are_classified() {
    let store = EmlDirStore::open(fixture_root()).unwrap();
    let adapter = MessageAdapter::with_defaults(store, AdapterOptions::default());
    let msg = adapter.hydrate(&ItemId::from("inbox/report.eml")).unwrap();

    assert!(!msg.is_html_body());
    assert!(msg.plain_text_body().starts_with("See attached."));
    assert!(!msg.is_meeting_request());
    assert_eq!(msg.location(), "");

    let files: Vec<_> = msg
        .attachments()
        .iter()
        .filter_map(|a| match a {
            Attachment::File(f) => Some(f),
            Attachment::Item(_) => None,
        })
        .collect();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "report.pdf");
    assert_eq!(files[0].content_type, "application/pdf");
    assert_eq!(files[0].content, b"%PDF-1.4\n");

    let items: Vec<_> = msg.attachments().iter().filter(|a| a.is_item()).collect();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name(), "Previous notes");
}

#[test]
fn test_extract_attachments() {
    let store = EmlDirStore::open(fixture_root()).unwrap();
    let adapter = MessageAdapter::with_defaults(store, AdapterOptions::default());
    let msg = adapter.hydrate(&ItemId::from("inbox/report.eml")).unwrap();

    let out = tempfile::tempdir().unwrap();
    for att in msg.attachments() {
        att.save_to(out.path()).unwrap();
    }
    assert!(out.path().join("report.pdf").is_file());
    assert!(out.path().join("Previous_notes.eml").is_file());
}

// ─── Failures ───────────────────────────────────────────────────────

#[test]
fn test_missing_date_is_a_fetch_error() {
    let store = EmlDirStore::open(fixture_root()).unwrap();
    let adapter = MessageAdapter::with_defaults(store, AdapterOptions::default());
    let err = adapter
        .hydrate(&ItemId::from("inbox/undated.eml"))
        .unwrap_err();
    assert!(matches!(err, NormalizeError::StoreFetch { .. }));
}

#[test]
fn test_unknown_item_is_a_fetch_error() {
    let store = EmlDirStore::open(fixture_root()).unwrap();
    let adapter = MessageAdapter::with_defaults(store, AdapterOptions::default());
    let err = adapter.hydrate(&ItemId::from("inbox/nope.eml")).unwrap_err();
    assert!(matches!(err, NormalizeError::StoreFetch { .. }));
}

// ─── Store operations ───────────────────────────────────────────────

#[test]
fn test_save_to_file_default_name() {
    let (_dir, store) = scratch_store();
    let save = tempfile::tempdir().unwrap();
    let adapter = MessageAdapter::with_defaults(store, options(save.path()));
    let msg = adapter.hydrate(&ItemId::from("inbox/report.eml")).unwrap();

    let path = msg.save_to_file(None).unwrap();
    assert_eq!(
        path.file_name().unwrap(),
        "20240301_073000_reports@example.com_Monthly_report.eml"
    );
    assert_eq!(std::fs::read(&path).unwrap(), msg.mime_content());
}

#[test]
fn test_move_then_delete() {
    let (dir, store) = scratch_store();
    let adapter = MessageAdapter::with_defaults(&store, AdapterOptions::default());

    let msg = adapter.hydrate(&ItemId::from("inbox/report.eml")).unwrap();
    msg.move_to(&FolderId::from("archive")).unwrap();
    assert!(dir.path().join("archive").join("report.eml").is_file());
    assert!(!dir.path().join("inbox").join("report.eml").exists());

    let msg = adapter.hydrate(&ItemId::from("archive/report.eml")).unwrap();
    msg.delete(true).unwrap();
    assert!(dir.path().join(TRASH_DIR).join("report.eml").is_file());
}

#[test]
fn test_operation_errors_name_the_operation() {
    let (dir, store) = scratch_store();
    let adapter = MessageAdapter::with_defaults(&store, AdapterOptions::default());
    let msg = adapter.hydrate(&ItemId::from("inbox/report.eml")).unwrap();

    // Remove the file behind the view's back
    std::fs::remove_file(dir.path().join("inbox").join("report.eml")).unwrap();
    match msg.delete(false).unwrap_err() {
        NormalizeError::StoreOperation { op, .. } => assert_eq!(op, "delete"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_reply_all_lands_in_outbox() {
    let (dir, store) = scratch_store();
    let adapter = MessageAdapter::with_defaults(&store, AdapterOptions::default());
    let msg = adapter.hydrate(&ItemId::from("inbox/invite.eml")).unwrap();
    msg.reply("<p>Works for me</p>", true).unwrap();

    let outbox: Vec<_> = std::fs::read_dir(dir.path().join(OUTBOX_DIR))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(outbox.len(), 1);

    // The reply is itself a readable item
    let file_name = outbox[0].file_name().unwrap().to_string_lossy();
    let reply_id = ItemId(format!("{OUTBOX_DIR}/{file_name}"));
    let parsed = store.load_parsed(&reply_id).unwrap();
    let reply = &parsed.item;

    assert_eq!(reply.subject.as_deref(), Some("Re: Planning"));
    assert_eq!(parsed.references, vec!["<plan@example.com>"]);
    assert_eq!(reply.from.as_ref().unwrap().address, "me@example.com");
    assert_eq!(reply.to[0].name, "Doe, Jane");
    assert_eq!(
        reply.to.iter().map(|a| a.address.as_str()).collect::<Vec<_>>(),
        vec!["jdoe@example.com", "ops@example.com"]
    );
    assert_eq!(
        reply.cc.iter().map(|a| a.address.as_str()).collect::<Vec<_>>(),
        vec!["boss@example.com"]
    );
    assert!(reply
        .body
        .as_ref()
        .unwrap()
        .content_or_empty()
        .contains("<p>Works for me</p>"));
}
