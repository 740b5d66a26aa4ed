#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fsmanage_core::{AttentionItems, Item, ItemKind, ItemPath, OperableItem};
use fsmanage_ops::{
    Confirmation, ConfirmationKind, FileOperation, OperationException, OperationExecutor,
    OperationKind, execute_fn, undo_fn,
};

pub fn file(path: &str) -> OperableItem {
    OperableItem::parse(path, ItemKind::File).unwrap()
}

pub fn dir(path: &str) -> OperableItem {
    OperableItem::parse(path, ItemKind::Dir).unwrap()
}

pub fn path(path: &str) -> ItemPath {
    ItemPath::parse(path, '/')
}

/// Shared state for a scripted backend.
///
/// Every call is appended to `log` as `"execute:<name>"` or `"undo:<name>"`.
/// Names listed in `fail_execute` / `fail_undo` fail; execute failures report
/// `reverted = true`, undo failures `reverted = false`. Creating a name listed
/// in `slow` sleeps briefly before it is logged.
#[derive(Clone, Default)]
pub struct Script {
    pub log: Arc<Mutex<Vec<String>>>,
    pub fail_execute: Arc<Mutex<HashSet<String>>>,
    pub fail_undo: Arc<Mutex<HashSet<String>>>,
    pub slow: Arc<Mutex<HashSet<String>>>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_execute(&self, name: &str) {
        self.fail_execute.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_undo(&self, name: &str) {
        self.fail_undo.lock().unwrap().insert(name.to_string());
    }

    pub fn slow(&self, name: &str) {
        self.slow.lock().unwrap().insert(name.to_string());
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Executor supporting `create_file` (with undo), `copy` (asks an
    /// Overwrite confirmation per operation, with undo) and `delete` (no undo).
    pub fn executor(&self) -> OperationExecutor {
        let mut executor = OperationExecutor::new();

        let script = self.clone();
        executor.support_operation(
            OperationKind::CreateFile,
            execute_fn(move |operation, _confirmer| {
                let script = script.clone();
                async move {
                    let FileOperation::CreateFile { item } = operation.op().clone() else {
                        unreachable!()
                    };
                    let name = item.name().to_string();
                    let slow = script.slow.lock().unwrap().contains(&name);
                    if slow {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                    script.log.lock().unwrap().push(format!("execute:{name}"));
                    if script.fail_execute.lock().unwrap().contains(&name) {
                        return Err(OperationException::new(operation, true));
                    }
                    Ok(AttentionItems::new(
                        Some(item.parent_dir()),
                        [Item::from(item)],
                    ))
                }
            }),
            Some(self.undo()),
        );

        let script = self.clone();
        executor.support_operation(
            OperationKind::Copy,
            execute_fn(move |operation, confirmer| {
                let script = script.clone();
                async move {
                    let FileOperation::Copy { destination, .. } = operation.op().clone() else {
                        unreachable!()
                    };
                    let response = confirmer
                        .ask(ConfirmationKind::Overwrite, format!("{destination} exists"))
                        .await;
                    let name = destination.name().to_string();
                    script.log.lock().unwrap().push(format!("execute:{name}"));
                    if !response.is_confirmed() {
                        return Err(OperationException::new(operation, true));
                    }
                    Ok(AttentionItems::new(None, [Item::from(destination)]))
                }
            }),
            Some(self.undo()),
        );

        let script = self.clone();
        executor.support_operation(
            OperationKind::Delete,
            execute_fn(move |operation, _confirmer| {
                let script = script.clone();
                async move {
                    script
                        .log
                        .lock()
                        .unwrap()
                        .push(format!("execute:{}", operation.name()));
                    Ok(AttentionItems::empty())
                }
            }),
            None,
        );

        executor
    }

    fn undo(&self) -> fsmanage_ops::UndoFn {
        let script = self.clone();
        undo_fn(move |operation| {
            let script = script.clone();
            async move {
                let name = match operation.op() {
                    FileOperation::CreateFile { item } => item.name().to_string(),
                    FileOperation::Copy { destination, .. } => destination.name().to_string(),
                    _ => operation.name().to_string(),
                };
                script.log.lock().unwrap().push(format!("undo:{name}"));
                if script.fail_undo.lock().unwrap().contains(&name) {
                    return Err(OperationException::new(operation, false));
                }
                Ok(AttentionItems::new(None, [Item::new(path(&name))]))
            }
        })
    }
}

/// A confirm callback that answers with `answer` and counts its calls.
pub fn counting_confirm(
    answer: fsmanage_ops::Response,
) -> (fsmanage_ops::ConfirmFn, Arc<Mutex<Vec<ConfirmationKind>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::clone(&seen);
    let confirm: fsmanage_ops::ConfirmFn = Arc::new(move |confirmation: Confirmation| {
        calls.lock().unwrap().push(confirmation.kind());
        confirmation.respond(answer).unwrap();
    });
    (confirm, seen)
}
