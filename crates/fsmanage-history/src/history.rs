//! Undo/redo log with capacity and age expiry.

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::HistoryConfig;
use crate::error::HistoryError;
use crate::event::{EventState, HistoryEvent, HistoryEventResult};

/// Callback invoked after a transition, with the event and its result.
pub type Listener<E> = Arc<
    dyn Fn(&E, &HistoryEventResult<<E as HistoryEvent>::Output, <E as HistoryEvent>::Error>)
        + Send
        + Sync,
>;

type EventResult<E> = HistoryEventResult<<E as HistoryEvent>::Output, <E as HistoryEvent>::Error>;

struct Entry<E> {
    event: Arc<E>,
    /// Time of the last transition (add, undo or redo).
    touched: DateTime<Utc>,
}

struct State<E> {
    entries: VecDeque<Entry<E>>,
    /// Entries before this index are applied; entries from it on are undone.
    position: usize,
}

impl<E> State<E> {
    fn truncate_future(&mut self) -> usize {
        let dropped = self.entries.len() - self.position;
        self.entries.truncate(self.position);
        dropped
    }
}

/// An ordered log of events with an undo/redo position.
///
/// Transitions (add, undo, redo, expiry, clear) are serialised by one async
/// lock held for their whole duration, including the time spent running the
/// event. The entries and position sit behind a separate short-lived lock
/// that is only written at the end of a transition, so readers see the last
/// committed state and never wait on a running event.
pub struct History<E: HistoryEvent> {
    config: HistoryConfig,
    clock: Arc<dyn Clock>,
    transition: Mutex<()>,
    state: RwLock<State<E>>,
    listeners: RwLock<Vec<Listener<E>>>,
}

impl<E: HistoryEvent> History<E> {
    /// Create a history using wall-clock time.
    pub fn new(config: HistoryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a history with a custom time source.
    pub fn with_clock(config: HistoryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            transition: Mutex::new(()),
            state: RwLock::new(State {
                entries: VecDeque::new(),
                position: 0,
            }),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    fn read_state(&self) -> RwLockReadGuard<'_, State<E>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State<E>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check whether `event` would be accepted by [`add`](Self::add).
    pub fn accepts(&self, event: &E) -> Result<(), HistoryError> {
        if self.config.require_reversible && !self.config.permanent && !event.can_undo() {
            return Err(HistoryError::NotReversible);
        }
        Ok(())
    }

    /// Execute an event and record it if it succeeds.
    ///
    /// Any redo stack is discarded before the event is recorded. A failed
    /// event is never recorded; its result is still returned.
    pub async fn add(&self, event: E) -> Result<EventResult<E>, HistoryError> {
        self.add_shared(Arc::new(event), None).await
    }

    /// Like [`add`](Self::add), stamping the event with `time` for expiry.
    pub async fn add_at(&self, event: E, time: DateTime<Utc>) -> Result<EventResult<E>, HistoryError> {
        self.add_shared(Arc::new(event), Some(time)).await
    }

    async fn add_shared(
        &self,
        event: Arc<E>,
        time: Option<DateTime<Utc>>,
    ) -> Result<EventResult<E>, HistoryError> {
        self.accepts(&event)?;

        let _transition = self.transition.lock().await;
        let result = Arc::clone(&event).execute().await;
        let now = self.clock.now();

        {
            let mut state = self.write_state();
            if result.is_success() {
                let dropped = state.truncate_future();
                state.entries.push_back(Entry {
                    event: Arc::clone(&event),
                    touched: time.unwrap_or(now),
                });
                state.position += 1;
                debug!(
                    position = state.position,
                    dropped_future = dropped,
                    "recorded history event"
                );
            } else {
                warn!(state = %result.state(), "history event failed, not recorded");
            }
            self.expire_locked(&mut state, now);
        }

        if result.is_success() || result.state() == EventState::Failed {
            self.notify(&event, &result);
        }
        Ok(result)
    }

    /// Check if there is a past event to undo.
    ///
    /// Reflects the last committed transition; a transition still running
    /// is not visible yet.
    pub async fn can_undo(&self) -> bool {
        !self.config.permanent && self.read_state().position > 0
    }

    /// Check if there is a future event to redo.
    pub async fn can_redo(&self) -> bool {
        if self.config.permanent {
            return false;
        }
        let state = self.read_state();
        state.position < state.entries.len()
    }

    /// Undo the most recent past event.
    ///
    /// The event moves to the future when its undo succeeds or is reported
    /// as reverted.
    pub async fn undo(&self) -> Result<EventResult<E>, HistoryError> {
        if self.config.permanent {
            return Err(HistoryError::Permanent);
        }

        let _transition = self.transition.lock().await;
        let (index, event) = {
            let state = self.read_state();
            let Some(index) = state.position.checked_sub(1) else {
                return Err(HistoryError::NothingToUndo);
            };
            (index, Arc::clone(&state.entries[index].event))
        };
        if !event.can_undo() {
            return Err(HistoryError::NotUndoable);
        }

        let result = Arc::clone(&event).undo().await;
        let now = self.clock.now();
        let moved = matches!(result.state(), EventState::Success | EventState::Reverted);

        {
            let mut state = self.write_state();
            if moved {
                state.position = index;
                state.entries[index].touched = now;
                debug!(position = state.position, state = %result.state(), "undid history event");
            } else {
                warn!(position = state.position, "undo failed, history unchanged");
            }
            self.expire_locked(&mut state, now);
        }

        if moved || result.state() == EventState::Failed {
            self.notify(&event, &result);
        }
        Ok(result)
    }

    /// Re-execute the next future event.
    pub async fn redo(&self) -> Result<EventResult<E>, HistoryError> {
        if self.config.permanent {
            return Err(HistoryError::Permanent);
        }

        let _transition = self.transition.lock().await;
        let (index, event) = {
            let state = self.read_state();
            let index = state.position;
            let Some(entry) = state.entries.get(index) else {
                return Err(HistoryError::NothingToRedo);
            };
            (index, Arc::clone(&entry.event))
        };

        let result = Arc::clone(&event).execute().await;
        let now = self.clock.now();

        {
            let mut state = self.write_state();
            if result.is_success() {
                state.position = index + 1;
                state.entries[index].touched = now;
                debug!(position = state.position, "redid history event");
            } else {
                warn!(position = state.position, state = %result.state(), "redo failed, history unchanged");
            }
            self.expire_locked(&mut state, now);
        }

        if result.is_success() || result.state() == EventState::Failed {
            self.notify(&event, &result);
        }
        Ok(result)
    }

    /// Index separating past from future events.
    pub async fn position(&self) -> usize {
        self.read_state().position
    }

    /// Number of recorded events.
    pub async fn len(&self) -> usize {
        self.read_state().entries.len()
    }

    /// Check if no events are recorded.
    pub async fn is_empty(&self) -> bool {
        self.read_state().entries.is_empty()
    }

    /// Applied events, oldest first.
    pub async fn past(&self) -> Vec<Arc<E>> {
        let state = self.read_state();
        state
            .entries
            .iter()
            .take(state.position)
            .map(|entry| Arc::clone(&entry.event))
            .collect()
    }

    /// Undone events available for redo, next first.
    pub async fn future(&self) -> Vec<Arc<E>> {
        let state = self.read_state();
        state
            .entries
            .iter()
            .skip(state.position)
            .map(|entry| Arc::clone(&entry.event))
            .collect()
    }

    /// All recorded events in execution order.
    pub async fn events(&self) -> Vec<Arc<E>> {
        self.read_state()
            .entries
            .iter()
            .map(|entry| Arc::clone(&entry.event))
            .collect()
    }

    /// Forget every event without running anything.
    pub async fn clear(&self) {
        let _transition = self.transition.lock().await;
        let mut state = self.write_state();
        state.entries.clear();
        state.position = 0;
        debug!("cleared history");
    }

    /// Run count and age expiry now.
    pub async fn expire_events(&self) {
        let _transition = self.transition.lock().await;
        let now = self.clock.now();
        let mut state = self.write_state();
        self.expire_locked(&mut state, now);
    }

    /// Register a callback for transitions.
    ///
    /// Callbacks run after every add, undo or redo that moved the position,
    /// and after any pass that failed without reverting its changes.
    pub fn on_change<F>(&self, listener: F)
    where
        F: Fn(&E, &EventResult<E>) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    fn notify(&self, event: &E, result: &EventResult<E>) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &listeners {
            listener(event, result);
        }
    }

    fn expire_locked(&self, state: &mut State<E>, now: DateTime<Utc>) {
        let before = state.entries.len();

        if let Some(max_age) = self.config.max_event_age() {
            let cutoff = now - max_age;
            let old_position = state.position;
            let mut position = old_position;
            let mut kept = VecDeque::with_capacity(state.entries.len());
            for (index, entry) in state.entries.drain(..).enumerate() {
                if entry.touched < cutoff {
                    if index < old_position {
                        position -= 1;
                    }
                } else {
                    kept.push_back(entry);
                }
            }
            state.entries = kept;
            state.position = position;
        }

        if let Some(max_events) = self.config.max_events {
            while state.entries.len() > max_events {
                let has_future = state.position < state.entries.len();
                if has_future && (self.config.expire_future_first || state.position == 0) {
                    state.entries.pop_back();
                } else {
                    state.entries.pop_front();
                    state.position -= 1;
                }
            }
        }

        let expired = before - state.entries.len();
        if expired > 0 {
            debug!(
                expired,
                remaining = state.entries.len(),
                position = state.position,
                "expired history events"
            );
        } else {
            trace!("no history events expired");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::BoxFuture;

    struct Noop;

    impl HistoryEvent for Noop {
        type Output = ();
        type Error = ();

        fn execute(self: Arc<Self>) -> BoxFuture<'static, HistoryEventResult<(), ()>> {
            Box::pin(async { HistoryEventResult::success(()) })
        }

        fn undo(self: Arc<Self>) -> BoxFuture<'static, HistoryEventResult<(), ()>> {
            Box::pin(async { HistoryEventResult::success(()) })
        }
    }

    #[tokio::test]
    async fn test_add_then_undo_then_add_truncates_future() {
        let history = History::new(HistoryConfig::default());
        history.add(Noop).await.unwrap();
        history.add(Noop).await.unwrap();
        history.undo().await.unwrap();
        assert_eq!(history.future().await.len(), 1);

        history.add(Noop).await.unwrap();
        assert_eq!(history.len().await, 2);
        assert_eq!(history.position().await, 2);
        assert!(!history.can_redo().await);
    }

    #[tokio::test]
    async fn test_clear_forgets_everything() {
        let history = History::new(HistoryConfig::default());
        history.add(Noop).await.unwrap();
        history.clear().await;
        assert!(history.is_empty().await);
        assert_eq!(history.position().await, 0);
    }

    #[test]
    fn test_count_expiry_prefers_future_when_configured() {
        let config = HistoryConfig::builder()
            .max_events(2usize)
            .expire_future_first(true)
            .build()
            .unwrap();
        let history: History<Noop> = History::new(config);
        let now = Utc::now();
        let entry = || Entry {
            event: Arc::new(Noop),
            touched: now,
        };
        let mut state = State {
            entries: VecDeque::from([entry(), entry(), entry()]),
            position: 2,
        };

        history.expire_locked(&mut state, now);
        assert_eq!(state.entries.len(), 2);
        assert_eq!(state.position, 2);
    }

    #[test]
    fn test_count_expiry_drops_oldest_past_by_default() {
        let config = HistoryConfig::builder().max_events(2usize).build().unwrap();
        let history: History<Noop> = History::new(config);
        let now = Utc::now();
        let entry = || Entry {
            event: Arc::new(Noop),
            touched: now,
        };
        let mut state = State {
            entries: VecDeque::from([entry(), entry(), entry()]),
            position: 2,
        };

        history.expire_locked(&mut state, now);
        assert_eq!(state.entries.len(), 2);
        assert_eq!(state.position, 1);
    }
}
