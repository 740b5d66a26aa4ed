mod common;

use common::{counting_confirm, dir, file, path};
use fsmanage_core::{Item, ItemKind, MetadataValue, props};
use fsmanage_history::EventState;
use std::sync::Arc;

use fsmanage_ops::{
    BatchOptions, ConfirmFn, Confirmation, ConfirmationKind, MemoryFs, Operation, OperationKind,
    OperationManager, Response,
};

fn seeded() -> (MemoryFs, OperationManager) {
    let fs = MemoryFs::new();
    fs.write_file("docs/readme.txt", "hello");
    fs.write_file("docs/notes/todo.txt", "1. write tests");
    fs.create_dir_all("archive");
    let manager = OperationManager::with_defaults(fs.executor());
    (fs, manager)
}

#[tokio::test]
async fn test_supports_every_operation() {
    let (_fs, manager) = seeded();
    assert_eq!(
        manager.supported_operations(),
        vec![
            OperationKind::Copy,
            OperationKind::Move,
            OperationKind::Rename,
            OperationKind::Delete,
            OperationKind::CreateFile,
            OperationKind::CreateDirectory,
        ]
    );
}

#[tokio::test]
async fn test_copy_then_undo_and_redo() {
    let (fs, manager) = seeded();

    let attention = manager
        .execute(
            vec![Operation::copy(file("docs/readme.txt"), file("archive/readme.txt"))],
            BatchOptions::new(),
        )
        .unwrap()
        .await
        .unwrap();

    assert!(attention.contains(&path("archive/readme.txt")));
    assert_eq!(attention.parent(), Some(&Item::dir(path("archive"))));
    assert_eq!(fs.read_file("archive/readme.txt"), Some(b"hello".to_vec()));
    assert!(fs.exists("docs/readme.txt"));

    manager.history().undo().await.unwrap();
    assert!(!fs.exists("archive/readme.txt"));

    manager.history().redo().await.unwrap();
    assert!(fs.exists("archive/readme.txt"));
}

#[tokio::test]
async fn test_move_directory_with_contents() {
    let (fs, manager) = seeded();

    manager
        .execute(
            vec![Operation::move_to(dir("docs/notes"), dir("archive/notes"))],
            BatchOptions::new(),
        )
        .unwrap()
        .await
        .unwrap();

    assert!(!fs.exists("docs/notes"));
    assert_eq!(
        fs.read_file("archive/notes/todo.txt"),
        Some(b"1. write tests".to_vec())
    );

    manager.history().undo().await.unwrap();
    assert!(fs.exists("docs/notes/todo.txt"));
    assert!(!fs.exists("archive/notes"));
}

#[tokio::test]
async fn test_rename_and_undo() {
    let (fs, manager) = seeded();

    let rename = Operation::rename(file("docs/readme.txt"), "README.md").unwrap();
    let attention = manager
        .execute(vec![rename], BatchOptions::new())
        .unwrap()
        .await
        .unwrap();

    assert!(attention.contains(&path("docs/README.md")));
    assert!(fs.exists("docs/README.md"));
    assert!(!fs.exists("docs/readme.txt"));

    manager.history().undo().await.unwrap();
    assert!(fs.exists("docs/readme.txt"));
    assert!(!fs.exists("docs/README.md"));
}

#[tokio::test]
async fn test_create_and_delete_attention() {
    let (fs, manager) = seeded();

    let created = manager
        .execute(
            vec![
                Operation::create_directory(dir("docs/drafts")),
                Operation::create_file(file("docs/drafts/one.txt")),
            ],
            BatchOptions::new().sequential(),
        )
        .unwrap()
        .await
        .unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(fs.kind_of("docs/drafts"), Some(ItemKind::Dir));
    assert_eq!(fs.read_file("docs/drafts/one.txt"), Some(Vec::new()));

    let deleted = manager
        .execute(
            vec![Operation::delete(file("docs/drafts/one.txt"))],
            BatchOptions::new(),
        )
        .unwrap()
        .await
        .unwrap();
    assert_eq!(deleted.len(), 0);
    assert_eq!(deleted.parent(), Some(&Item::dir(path("docs/drafts"))));
}

#[tokio::test]
async fn test_overwrite_rejected_leaves_destination() {
    let (fs, manager) = seeded();
    fs.write_file("archive/readme.txt", "old");
    let (confirm, calls) = counting_confirm(Response::Reject);

    let err = manager
        .execute(
            vec![Operation::copy(file("docs/readme.txt"), file("archive/readme.txt"))],
            BatchOptions::new().confirm(confirm),
        )
        .unwrap()
        .await
        .unwrap_err();

    assert!(err.reverted());
    assert_eq!(*calls.lock().unwrap(), vec![ConfirmationKind::Overwrite]);
    assert_eq!(fs.read_file("archive/readme.txt"), Some(b"old".to_vec()));
}

#[tokio::test]
async fn test_overwrite_confirmed_is_undoable() {
    let (fs, manager) = seeded();
    fs.write_file("archive/readme.txt", "old");
    let (confirm, _calls) = counting_confirm(Response::Confirm);

    manager
        .execute(
            vec![Operation::copy(file("docs/readme.txt"), file("archive/readme.txt"))],
            BatchOptions::new().confirm(confirm),
        )
        .unwrap()
        .await
        .unwrap();
    assert_eq!(fs.read_file("archive/readme.txt"), Some(b"hello".to_vec()));

    manager.history().undo().await.unwrap();
    assert_eq!(fs.read_file("archive/readme.txt"), Some(b"old".to_vec()));
}

#[tokio::test]
async fn test_overwrite_rechecks_tree_after_confirmation() {
    let (fs, manager) = seeded();
    fs.write_file("archive/readme.txt", "old");
    let confirm: ConfirmFn = {
        let fs = fs.clone();
        Arc::new(move |confirmation: Confirmation| {
            fs.deny("archive");
            confirmation.respond(Response::Confirm).unwrap();
        })
    };

    let err = manager
        .execute(
            vec![Operation::move_to(file("docs/readme.txt"), file("archive/readme.txt"))],
            BatchOptions::new().confirm(confirm),
        )
        .unwrap()
        .await
        .unwrap_err();

    assert!(err.reverted());
    assert_eq!(err.detail(), Some("permission denied"));
    assert_eq!(fs.read_file("archive/readme.txt"), Some(b"old".to_vec()));
    assert_eq!(fs.read_file("docs/readme.txt"), Some(b"hello".to_vec()));
    assert!(manager.history().is_empty().await);
}

#[tokio::test]
async fn test_delete_non_empty_directory_asks_and_undo_restores() {
    let (fs, manager) = seeded();
    let (confirm, calls) = counting_confirm(Response::Confirm);

    manager
        .execute(
            vec![Operation::delete(dir("docs"))],
            BatchOptions::new().confirm(confirm),
        )
        .unwrap()
        .await
        .unwrap();
    assert_eq!(*calls.lock().unwrap(), vec![ConfirmationKind::Delete]);
    assert!(!fs.exists("docs/notes/todo.txt"));

    manager.history().undo().await.unwrap();
    assert_eq!(fs.read_file("docs/readme.txt"), Some(b"hello".to_vec()));
    assert!(fs.exists("docs/notes/todo.txt"));
}

#[tokio::test]
async fn test_copy_into_itself_fails() {
    let (fs, manager) = seeded();

    let err = manager
        .execute(
            vec![Operation::copy(dir("docs"), dir("docs/notes/docs"))],
            BatchOptions::new(),
        )
        .unwrap()
        .await
        .unwrap_err();

    assert!(err.reverted());
    assert!(err.detail().unwrap().contains("into itself"));
    assert!(!fs.exists("docs/notes/docs"));
}

#[tokio::test]
async fn test_denied_path_rolls_back_batch() {
    let (fs, manager) = seeded();
    fs.deny("locked");

    let err = manager
        .execute(
            vec![
                Operation::copy(file("docs/readme.txt"), file("archive/readme.txt")),
                Operation::create_directory(dir("locked")),
            ],
            BatchOptions::new().sequential(),
        )
        .unwrap()
        .await
        .unwrap_err();

    assert!(err.reverted());
    assert_eq!(err.detail(), Some("permission denied"));
    assert!(!fs.exists("archive/readme.txt"));
    assert!(manager.history().is_empty().await);
}

#[tokio::test]
async fn test_denied_undo_reverts_and_redo_is_noop() {
    let (fs, manager) = seeded();

    manager
        .execute(
            vec![Operation::create_file(file("archive/a.txt"))],
            BatchOptions::new(),
        )
        .unwrap()
        .await
        .unwrap();

    fs.deny("archive");
    let result = manager.history().undo().await.unwrap();
    assert_eq!(result.state(), EventState::Reverted);
    assert_eq!(manager.history().position().await, 0);
    assert!(fs.exists("archive/a.txt"));

    // The file was never removed, so redo has nothing left to apply.
    fs.allow("archive");
    let redone = manager.history().redo().await.unwrap();
    assert!(redone.outcome().unwrap().is_empty());
    assert_eq!(manager.history().position().await, 1);
    assert!(fs.exists("archive/a.txt"));
}

#[tokio::test]
async fn test_metadata_properties() {
    let (fs, manager) = seeded();

    let docs = fs.item("docs").unwrap();
    let all = manager.get_metadata(&docs, &[]).await;
    assert_eq!(all.get(props::KIND), Some(&MetadataValue::Kind(ItemKind::Dir)));
    let children = all.get(props::ITEMS).and_then(MetadataValue::as_items).unwrap();
    assert_eq!(children.len(), 2);
    assert!(all.get(props::SIZE).is_none());

    let readme = fs.item("docs/readme.txt").unwrap();
    let some = manager
        .get_metadata(&readme, &[props::SIZE, "owner", props::ITEMS])
        .await;
    assert_eq!(some.len(), 1);
    assert_eq!(some.get(props::SIZE), Some(&MetadataValue::Size(5)));

    let missing = Item::new(path("nowhere"));
    assert!(manager.get_metadata(&missing, &[props::KIND]).await.is_empty());
}
