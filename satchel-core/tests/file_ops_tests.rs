mod common;

use common::*;
use satchel_core::{Account, CoreConfig, CoreError, Satchel, ValidationError};
use satchel_remote::MemoryGateway;
use satchel_types::FileKind;
use std::sync::Arc;

fn satchel() -> Satchel {
    first_device(Arc::new(MemoryGateway::new())).0
}

fn assert_validation(err: CoreError, expected: ValidationError) {
    match err {
        CoreError::Validation(v) => assert_eq!(v, expected),
        other => panic!("expected validation error, got {other}"),
    }
}

// ── Create / list ────────────────────────────────────────────────

#[test]
fn create_and_list_children() {
    let s = satchel();
    let root = s.root().unwrap();
    let docs = s.create_file(root.id, "docs", FileKind::Folder).unwrap();
    s.create_file(docs.id, "b.txt", FileKind::Document).unwrap();
    s.create_file(docs.id, "a.txt", FileKind::Document).unwrap();

    let names: Vec<String> = s
        .list_children(docs.id)
        .unwrap()
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]); // sorted
}

#[test]
fn duplicate_sibling_name_is_rejected() {
    let s = satchel();
    let root = s.root().unwrap();
    s.create_file(root.id, "a.txt", FileKind::Document).unwrap();
    let err = s.create_file(root.id, "a.txt", FileKind::Folder).unwrap_err();
    assert_validation(err, ValidationError::DuplicateSiblingName("a.txt".to_string()));
}

#[test]
fn invalid_names_are_rejected() {
    let s = satchel();
    let root = s.root().unwrap();
    assert!(matches!(
        s.create_file(root.id, "", FileKind::Document),
        Err(CoreError::Validation(ValidationError::InvalidName(_)))
    ));
    assert!(matches!(
        s.create_file(root.id, "a/b.txt", FileKind::Document),
        Err(CoreError::Validation(ValidationError::InvalidName(_)))
    ));
    assert!(matches!(
        s.create_file(root.id, &"x".repeat(231), FileKind::Document),
        Err(CoreError::Validation(ValidationError::InvalidName(_)))
    ));
}

#[test]
fn create_under_a_document_is_rejected() {
    let s = satchel();
    let root = s.root().unwrap();
    let doc = s.create_file(root.id, "a.txt", FileKind::Document).unwrap();
    let err = s.create_file(doc.id, "inner", FileKind::Folder).unwrap_err();
    assert_validation(err, ValidationError::ParentNotAFolder(doc.id));
}

#[test]
fn create_under_a_deleted_folder_is_rejected() {
    let s = satchel();
    let root = s.root().unwrap();
    let folder = s.create_file(root.id, "gone", FileKind::Folder).unwrap();
    s.delete_file(folder.id).unwrap();
    // never-synced folders are removed outright
    let err = s.create_file(folder.id, "x", FileKind::Document).unwrap_err();
    assert_validation(err, ValidationError::NotFound(folder.id));
}

// ── Rename / move ────────────────────────────────────────────────

#[test]
fn rename_updates_and_bumps_version() {
    let s = satchel();
    let root = s.root().unwrap();
    let doc = s.create_file(root.id, "a.txt", FileKind::Document).unwrap();
    s.rename_file(doc.id, "b.txt").unwrap();

    let renamed = s.get_file(doc.id).unwrap();
    assert_eq!(renamed.name, "b.txt");
    assert_eq!(renamed.content_version, doc.content_version + 1);
    assert_eq!(renamed.content_revision, doc.content_revision); // bytes untouched
}

#[test]
fn rename_to_taken_name_is_rejected() {
    let s = satchel();
    let root = s.root().unwrap();
    s.create_file(root.id, "a.txt", FileKind::Document).unwrap();
    let doc = s.create_file(root.id, "b.txt", FileKind::Document).unwrap();
    let err = s.rename_file(doc.id, "a.txt").unwrap_err();
    assert_validation(err, ValidationError::DuplicateSiblingName("a.txt".to_string()));
}

#[test]
fn rename_to_own_name_is_allowed() {
    let s = satchel();
    let root = s.root().unwrap();
    let doc = s.create_file(root.id, "a.txt", FileKind::Document).unwrap();
    s.rename_file(doc.id, "a.txt").unwrap(); // self-collision is fine
}

#[test]
fn move_reparents_the_entry() {
    let s = satchel();
    let root = s.root().unwrap();
    let docs = s.create_file(root.id, "docs", FileKind::Folder).unwrap();
    let doc = s.create_file(root.id, "a.txt", FileKind::Document).unwrap();

    s.move_file(doc.id, docs.id).unwrap();
    assert_eq!(s.get_file(doc.id).unwrap().parent, docs.id);
    assert_eq!(s.path_by_id(doc.id).unwrap(), "/docs/a.txt");
}

#[test]
fn move_into_own_subtree_is_rejected() {
    let s = satchel();
    let root = s.root().unwrap();
    let outer = s.create_file(root.id, "outer", FileKind::Folder).unwrap();
    let inner = s.create_file(outer.id, "inner", FileKind::Folder).unwrap();

    assert_validation(
        s.move_file(outer.id, inner.id).unwrap_err(),
        ValidationError::Cycle(outer.id),
    );
    assert_validation(
        s.move_file(outer.id, outer.id).unwrap_err(),
        ValidationError::Cycle(outer.id),
    );
}

#[test]
fn root_is_immutable() {
    let s = satchel();
    let root = s.root().unwrap();
    assert_validation(s.rename_file(root.id, "other").unwrap_err(), ValidationError::RootImmutable);
    assert_validation(s.delete_file(root.id).unwrap_err(), ValidationError::RootImmutable);
    let folder = s.create_file(root.id, "f", FileKind::Folder).unwrap();
    assert_validation(s.move_file(root.id, folder.id).unwrap_err(), ValidationError::RootImmutable);
}

// ── Documents ────────────────────────────────────────────────────

#[test]
fn documents_round_trip_through_encryption() {
    let s = satchel();
    let root = s.root().unwrap();
    let doc = s.create_file(root.id, "a.txt", FileKind::Document).unwrap();

    assert_eq!(s.read_document(doc.id).unwrap(), b""); // starts empty
    s.write_document(doc.id, b"hello world").unwrap();
    assert_eq!(s.read_document(doc.id).unwrap(), b"hello world");

    let meta = s.get_file(doc.id).unwrap();
    assert_eq!(meta.content_revision, doc.content_revision + 1);
}

#[test]
fn folder_content_operations_are_rejected() {
    let s = satchel();
    let root = s.root().unwrap();
    let folder = s.create_file(root.id, "f", FileKind::Folder).unwrap();
    assert_validation(
        s.read_document(folder.id).unwrap_err(),
        ValidationError::NotADocument(folder.id),
    );
    assert_validation(
        s.write_document(folder.id, b"x").unwrap_err(),
        ValidationError::NotADocument(folder.id),
    );
}

// ── Paths ────────────────────────────────────────────────────────

#[test]
fn paths_resolve_both_ways() {
    let s = satchel();
    let root = s.root().unwrap();
    let docs = s.create_file(root.id, "docs", FileKind::Folder).unwrap();
    let doc = s.create_file(docs.id, "todo.txt", FileKind::Document).unwrap();

    assert_eq!(s.path_by_id(root.id).unwrap(), "/");
    assert_eq!(s.path_by_id(doc.id).unwrap(), "/docs/todo.txt");
    assert_eq!(s.get_by_path("/docs/todo.txt").unwrap().id, doc.id);
    assert_eq!(s.get_by_path("docs/todo.txt").unwrap().id, doc.id);
    assert_eq!(s.get_by_path("/").unwrap().id, root.id);
    assert!(matches!(
        s.get_by_path("/docs/missing.txt"),
        Err(CoreError::Validation(ValidationError::NoSuchPath(_)))
    ));
}

// ── Delete / purge ───────────────────────────────────────────────

#[test]
fn deleting_unsynced_entries_removes_them_outright() {
    let s = satchel();
    let root = s.root().unwrap();
    let folder = s.create_file(root.id, "f", FileKind::Folder).unwrap();
    let doc = s.create_file(folder.id, "a.txt", FileKind::Document).unwrap();

    s.delete_file(folder.id).unwrap();
    assert!(matches!(
        s.get_file(folder.id),
        Err(CoreError::Validation(ValidationError::NotFound(_)))
    ));
    assert!(matches!(
        s.get_file(doc.id),
        Err(CoreError::Validation(ValidationError::NotFound(_)))
    ));
}

#[tokio::test]
async fn deleting_synced_entries_tombstones_and_purge_removes() {
    let gateway = Arc::new(MemoryGateway::new());
    let (s, _) = first_device(gateway);
    let root = s.root().unwrap();
    let folder = s.create_file(root.id, "f", FileKind::Folder).unwrap();
    let doc = s.create_file(folder.id, "a.txt", FileKind::Document).unwrap();
    s.write_document(doc.id, b"bytes").unwrap();
    s.sync(None).await.unwrap();

    s.delete_file(folder.id).unwrap();
    // tombstoned, not gone: the deletion still has to propagate
    assert!(s.get_file(folder.id).unwrap().deleted);
    assert!(s.get_file(doc.id).unwrap().deleted);
    assert!(matches!(
        s.read_document(doc.id),
        Err(CoreError::Validation(ValidationError::Deleted(_)))
    ));

    // purge is explicit and cascades
    s.purge_file(folder.id).unwrap();
    assert!(matches!(
        s.get_file(folder.id),
        Err(CoreError::Validation(ValidationError::NotFound(_)))
    ));
}

#[test]
fn purge_requires_a_tombstone() {
    let s = satchel();
    let root = s.root().unwrap();
    let doc = s.create_file(root.id, "a.txt", FileKind::Document).unwrap();
    assert_validation(s.purge_file(doc.id).unwrap_err(), ValidationError::NotDeleted(doc.id));
}

// ── Accounts ─────────────────────────────────────────────────────

#[test]
fn account_export_import_round_trips() {
    let account = test_account();
    let exported = account.export().unwrap();
    let imported = Account::import(&exported).unwrap();

    assert_eq!(imported.username, account.username);
    assert_eq!(imported.api_url, account.api_url);
    assert_eq!(imported.master_key().as_bytes(), account.master_key().as_bytes());
    assert_eq!(
        imported.keypair().verifying_key.to_bytes(),
        account.keypair().verifying_key.to_bytes()
    );
}

#[test]
fn account_import_rejects_garbage() {
    assert!(matches!(Account::import("not an account"), Err(CoreError::InvalidAccount(_))));
    assert!(matches!(Account::import(""), Err(CoreError::InvalidAccount(_))));
}

#[test]
fn account_debug_redacts_keys() {
    let account = test_account();
    let debug = format!("{account:?}");
    assert!(debug.contains("alice"));
    assert!(debug.contains("REDACTED"));
    assert!(!debug.contains(&account.master_key().to_base64()));
}

#[test]
fn load_reopens_a_created_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = CoreConfig { data_dir: dir.path().to_path_buf() };
    let gateway = Arc::new(MemoryGateway::new());

    let doc_id = {
        let s = Satchel::create(&config, test_account(), gateway.clone()).unwrap();
        let root = s.root().unwrap();
        s.create_file(root.id, "kept.txt", FileKind::Document).unwrap().id
    };

    let s = Satchel::load(&config, gateway).unwrap();
    assert_eq!(s.account().username, "alice");
    assert_eq!(s.get_file(doc_id).unwrap().name, "kept.txt");
}
