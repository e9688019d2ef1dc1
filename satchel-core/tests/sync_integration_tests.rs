mod common;

use common::*;
use satchel_remote::MemoryGateway;
use satchel_sync::{ConflictResolution, Direction, SyncPhase};
use satchel_types::{Cursor, FileKind};
use std::sync::Arc;

// ── The worked examples ──────────────────────────────────────────

#[tokio::test]
async fn offline_folder_and_document_push_in_order() {
    let gateway = Arc::new(MemoryGateway::new());
    let (s, _) = first_device(gateway);
    s.sync(None).await.unwrap(); // root is up

    // offline: create folder "Notes" and "todo.txt" inside it
    let root = s.root().unwrap();
    let notes = s.create_file(root.id, "Notes", FileKind::Folder).unwrap();
    let todo = s.create_file(notes.id, "todo.txt", FileKind::Document).unwrap();

    // back online
    let before = s.last_synced().unwrap();
    let summary = s.sync(None).await.unwrap();

    assert_eq!(summary.applied.len(), 2);
    assert!(summary
        .applied
        .iter()
        .all(|a| a.unit.direction == Direction::PushLocal));
    assert_eq!(summary.applied[0].unit.target, notes.id); // folder first
    assert_eq!(summary.applied[1].unit.target, todo.id);
    assert!(summary.cursor > before);

    let again = s.sync(None).await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn rename_race_keeps_winner_and_preserves_loser() {
    let gateway = Arc::new(MemoryGateway::new());
    let (a, account) = first_device(gateway.clone());
    let root = a.root().unwrap();
    let doc = a.create_file(root.id, "a.txt", FileKind::Document).unwrap();
    a.sync(None).await.unwrap();

    let b = another_device(&account, gateway);
    b.sync(None).await.unwrap();

    // both rename before either syncs; A reaches the server first
    a.rename_file(doc.id, "b.txt").unwrap();
    b.rename_file(doc.id, "c.txt").unwrap();
    a.sync(None).await.unwrap();
    let summary = b.sync(None).await.unwrap();

    assert!(summary.conflicts().any(|r| matches!(
        r,
        ConflictResolution::RemoteMetadataKept { preserved_name: Some(name), .. } if name == "c.txt"
    )));
    assert_eq!(b.get_file(doc.id).unwrap().name, "b.txt");

    // propagate B's preserved sibling back to A
    b.sync(None).await.unwrap();
    a.sync(None).await.unwrap();
    for device in [&a, &b] {
        let names: Vec<String> = device
            .list_children(device.root().unwrap().id)
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["b.txt", "c.txt"]);
    }
}

// ── Restore on a second device ───────────────────────────────────

#[tokio::test]
async fn restored_device_pulls_everything_and_adopts_the_root() {
    let gateway = Arc::new(MemoryGateway::new());
    let (a, account) = first_device(gateway.clone());
    let root = a.root().unwrap();
    let notes = a.create_file(root.id, "Notes", FileKind::Folder).unwrap();
    let todo = a.create_file(notes.id, "todo.txt", FileKind::Document).unwrap();
    a.write_document(todo.id, b"remember the milk").unwrap();
    a.sync(None).await.unwrap();

    let b = another_device(&account, gateway);
    b.sync(None).await.unwrap();

    assert_eq!(b.root().unwrap().id, root.id);
    assert_eq!(b.get_by_path("/Notes/todo.txt").unwrap().id, todo.id);
    assert_eq!(b.read_document(todo.id).unwrap(), b"remember the milk");
}

// ── No data loss on concurrent edits ─────────────────────────────

#[tokio::test]
async fn concurrent_edits_survive_as_two_documents() {
    let gateway = Arc::new(MemoryGateway::new());
    let (a, account) = first_device(gateway.clone());
    let root = a.root().unwrap();
    let doc = a.create_file(root.id, "essay.md", FileKind::Document).unwrap();
    a.write_document(doc.id, b"draft").unwrap();
    a.sync(None).await.unwrap();

    let b = another_device(&account, gateway);
    b.sync(None).await.unwrap();

    a.write_document(doc.id, b"A's ending").unwrap();
    b.write_document(doc.id, b"B's ending").unwrap();
    a.sync(None).await.unwrap();
    b.sync(None).await.unwrap(); // resolves the conflict, stages the duplicate
    b.sync(None).await.unwrap(); // pushes the duplicate
    a.sync(None).await.unwrap(); // pulls it

    for device in [&a, &b] {
        let mut contents: Vec<Vec<u8>> = device
            .list_children(root.id)
            .unwrap()
            .iter()
            .map(|m| device.read_document(m.id).unwrap())
            .collect();
        contents.sort();
        assert_eq!(contents, vec![b"A's ending".to_vec(), b"B's ending".to_vec()]);
    }
    // and the duplicate's name references the original
    assert!(b
        .list_children(root.id)
        .unwrap()
        .iter()
        .any(|m| m.name.contains("(conflict)")));
}

// ── Deletions across devices ─────────────────────────────────────

#[tokio::test]
async fn deletion_propagates_and_purge_is_local_and_explicit() {
    let gateway = Arc::new(MemoryGateway::new());
    let (a, account) = first_device(gateway.clone());
    let root = a.root().unwrap();
    let notes = a.create_file(root.id, "Notes", FileKind::Folder).unwrap();
    let todo = a.create_file(notes.id, "todo.txt", FileKind::Document).unwrap();
    a.sync(None).await.unwrap();

    let b = another_device(&account, gateway);
    b.sync(None).await.unwrap();

    a.delete_file(notes.id).unwrap();
    a.sync(None).await.unwrap();
    b.sync(None).await.unwrap();

    assert!(b.get_file(notes.id).unwrap().deleted);
    assert!(b.get_file(todo.id).unwrap().deleted);
    assert!(b.list_children(root.id).unwrap().is_empty());

    // purge destroys local metadata and bytes; it does not sync anywhere
    b.purge_file(notes.id).unwrap();
    assert!(b.get_file(notes.id).is_err());
    assert!(b.sync(None).await.unwrap().is_empty());
}

// ── Cursor control ───────────────────────────────────────────────

#[tokio::test]
async fn cursor_rewind_refetches_already_reflected_history() {
    let gateway = Arc::new(MemoryGateway::new());
    let (s, _) = first_device(gateway);
    let root = s.root().unwrap();
    s.create_file(root.id, "a.txt", FileKind::Document).unwrap();
    s.sync(None).await.unwrap();
    let settled = s.last_synced().unwrap();
    assert!(settled > Cursor::ZERO);

    s.set_last_synced(Cursor::ZERO).unwrap();
    assert_eq!(s.last_synced().unwrap(), Cursor::ZERO);

    // everything refetched is already reflected; the pass is empty and the
    // cursor returns to the high-water mark
    let summary = s.sync(None).await.unwrap();
    assert!(summary.is_empty());
    assert_eq!(summary.cursor, settled);
}

#[tokio::test]
async fn sync_phase_is_idle_between_passes() {
    let gateway = Arc::new(MemoryGateway::new());
    let (s, _) = first_device(gateway);
    assert_eq!(s.sync_phase(), SyncPhase::Idle);
    s.sync(None).await.unwrap();
    assert_eq!(s.sync_phase(), SyncPhase::Idle);
    s.cancel_sync(); // no pass in flight: harmless
    let summary = s.sync(None).await.unwrap();
    assert!(!summary.cancelled);
}

// ── Progress reporting ───────────────────────────────────────────

#[tokio::test]
async fn progress_reports_each_unit() {
    let gateway = Arc::new(MemoryGateway::new());
    let (s, _) = first_device(gateway);
    let root = s.root().unwrap();
    s.create_file(root.id, "Notes", FileKind::Folder).unwrap();

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    let summary = s
        .sync(Some(Box::new(move |p| {
            sink.lock().unwrap().push((p.done, p.total, p.current.clone()));
        })))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), summary.applied.len());
    assert!(seen.iter().all(|(_, total, _)| *total == summary.applied.len()));
    assert!(seen[0].2.contains("push"));
}
