//! History configuration.

use chrono::TimeDelta;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for a [`History`](crate::History).
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct HistoryConfig {
    /// Never offer undo or redo; events are only logged.
    #[builder(default = "false")]
    #[serde(default)]
    pub permanent: bool,

    /// Maximum number of recorded events (None = unlimited).
    #[builder(default)]
    #[serde(default)]
    pub max_events: Option<usize>,

    /// When over capacity, drop future (redo) events before past ones.
    #[builder(default = "false")]
    #[serde(default)]
    pub expire_future_first: bool,

    /// Forget events whose last transition is older than this many seconds.
    #[builder(default)]
    #[serde(default)]
    pub max_event_age_secs: Option<u64>,

    /// Reject events that do not support undo.
    #[builder(default = "false")]
    #[serde(default)]
    pub require_reversible: bool,
}

impl HistoryConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(Some(0)) = self.max_events {
            return Err("max_events must be at least 1".to_string());
        }
        Ok(())
    }
}

impl HistoryConfig {
    /// Create a new history config builder.
    pub fn builder() -> HistoryConfigBuilder {
        HistoryConfigBuilder::default()
    }

    /// Config for a permanent (log-only) history.
    pub fn permanent() -> Self {
        Self {
            permanent: true,
            ..Self::default()
        }
    }

    /// The age limit as a duration.
    pub fn max_event_age(&self) -> Option<TimeDelta> {
        self.max_event_age_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(TimeDelta::try_seconds)
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            permanent: false,
            max_events: None,
            expire_future_first: false,
            max_event_age_secs: None,
            require_reversible: false,
        }
    }
}
