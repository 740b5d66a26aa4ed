//! Current-directory history with back and forward.

use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};

use fsmanage_core::ItemPath;
use fsmanage_history::{BoxFuture, History, HistoryConfig, HistoryError, HistoryEvent, HistoryEventResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

type Cwd = Arc<Mutex<Option<ItemPath>>>;

/// What the top-level directory shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationRoot {
    /// The contents of the directory at this path.
    Path(ItemPath),
    /// The items at these paths.
    Paths(Vec<ItemPath>),
}

impl Default for NavigationRoot {
    fn default() -> Self {
        Self::Path(ItemPath::root())
    }
}

/// A change of current directory. `None` is the top level.
#[derive(Debug)]
pub struct NavigationEvent {
    cwd: Cwd,
    before: Option<ItemPath>,
    after: Option<ItemPath>,
}

impl NavigationEvent {
    pub fn before(&self) -> Option<&ItemPath> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&ItemPath> {
        self.after.as_ref()
    }

    fn set(&self, path: Option<ItemPath>) -> HistoryEventResult<Option<ItemPath>, Infallible> {
        *self.cwd.lock().unwrap_or_else(PoisonError::into_inner) = path.clone();
        HistoryEventResult::success(path)
    }
}

impl HistoryEvent for NavigationEvent {
    type Output = Option<ItemPath>;
    type Error = Infallible;

    fn execute(self: Arc<Self>) -> BoxFuture<'static, HistoryEventResult<Self::Output, Infallible>> {
        Box::pin(async move { self.set(self.after.clone()) })
    }

    fn undo(self: Arc<Self>) -> BoxFuture<'static, HistoryEventResult<Self::Output, Infallible>> {
        Box::pin(async move { self.set(self.before.clone()) })
    }
}

/// History of navigation within a tree.
pub struct NavigationHistory {
    root: NavigationRoot,
    cwd: Cwd,
    history: History<NavigationEvent>,
}

impl NavigationHistory {
    /// Start at the top level.
    pub fn new(root: NavigationRoot, config: HistoryConfig) -> Self {
        Self {
            root,
            cwd: Arc::new(Mutex::new(None)),
            history: History::new(config),
        }
    }

    pub fn root(&self) -> &NavigationRoot {
        &self.root
    }

    /// Paths whose items make up the top level.
    pub fn top_level_paths(&self) -> Vec<ItemPath> {
        match &self.root {
            NavigationRoot::Path(path) => vec![path.clone()],
            NavigationRoot::Paths(paths) => paths.clone(),
        }
    }

    /// The current directory; `None` is the top level.
    pub fn cwd(&self) -> Option<ItemPath> {
        self.cwd.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The underlying history.
    pub fn history(&self) -> &History<NavigationEvent> {
        &self.history
    }

    /// Change the current directory.
    ///
    /// Navigating to the current directory records nothing.
    pub async fn navigate(&self, path: Option<ItemPath>) -> Result<Option<ItemPath>, HistoryError> {
        let before = self.cwd();
        if before == path {
            return Ok(before);
        }
        debug!(?before, after = ?path, "navigating");
        let event = NavigationEvent {
            cwd: Arc::clone(&self.cwd),
            before,
            after: path,
        };
        self.history.add(event).await?;
        Ok(self.cwd())
    }

    /// Return to the previous directory.
    pub async fn back(&self) -> Result<Option<ItemPath>, HistoryError> {
        self.history.undo().await?;
        Ok(self.cwd())
    }

    /// Go forward again after [`back`](Self::back).
    pub async fn forward(&self) -> Result<Option<ItemPath>, HistoryError> {
        self.history.redo().await?;
        Ok(self.cwd())
    }

    pub async fn can_go_back(&self) -> bool {
        self.history.can_undo().await
    }

    pub async fn can_go_forward(&self) -> bool {
        self.history.can_redo().await
    }
}
