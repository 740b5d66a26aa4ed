//! Generic undo/redo history for fsmanage.
//!
//! A [`History`] is an ordered log of [`HistoryEvent`]s with a position
//! separating the applied past from the reverted future. Adding an event runs
//! it and, on success, discards any redo stack before recording it. Events
//! expire by count and by age without ever being executed or reverted by the
//! expiry itself.
//!
//! # Example
//!
//! ```ignore
//! use fsmanage_history::{History, HistoryConfig};
//!
//! let history = History::new(HistoryConfig::builder().max_events(50usize).build()?);
//! history.add(my_event).await?;
//! if history.can_undo().await {
//!     history.undo().await?;
//! }
//! ```

mod clock;
mod config;
mod error;
mod event;
mod history;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{HistoryConfig, HistoryConfigBuilder};
pub use error::HistoryError;
pub use event::{BoxFuture, EventState, HistoryEvent, HistoryEventResult};
pub use history::{History, Listener};
