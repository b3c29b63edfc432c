//! Event records: raw NDJSON rows, cleaned records and the per-user/per-session grouping.

mod clean;
mod loader;
mod session;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use clean::CleaningStats;
pub use loader::load_event_log;
pub use session::SessionAggregator;
pub(crate) use session::span_ms;

/// Page that marks a definitive cancellation.
pub const CHURN_EVENT: &str = "Cancellation Confirmation";

/// One row of the raw activity log, as found in the NDJSON source. Fields whose
/// type varies between sources are kept as JSON values and coerced by cleaning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(default)]
    pub ts: Option<serde_json::Value>,
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
    #[serde(default)]
    pub session_id: Option<serde_json::Value>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub item_in_session: Option<serde_json::Value>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub length: Option<serde_json::Value>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub song: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub registration: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// A cleaned activity event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub ts: DateTime<Utc>,
    pub user_id: String,
    /// -1 when the source value was not numeric
    pub session_id: i64,
    pub page: String,
    pub item_in_session: u32,
    pub level: Option<String>,
    /// Seconds; 0.0 for non-song events
    pub length: f64,
    pub artist: Option<String>,
    pub song: Option<String>,
    pub gender: Option<String>,
    pub location: Option<String>,
    pub registration: Option<DateTime<Utc>>,
}

impl EventRecord {
    pub fn new(
        ts: DateTime<Utc>,
        user_id: impl Into<String>,
        session_id: i64,
        page: impl Into<String>,
    ) -> Self {
        Self {
            ts,
            user_id: user_id.into(),
            session_id,
            page: page.into(),
            item_in_session: 0,
            level: None,
            length: 0.0,
            artist: None,
            song: None,
            gender: None,
            location: None,
            registration: None,
        }
    }

    pub fn is_churn(&self) -> bool {
        self.page == CHURN_EVENT
    }
}

/// Cleaned, read-only event log. Every record has a usable user id.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    /// Build from already-typed records, dropping those without a usable user id.
    pub fn from_records(records: Vec<EventRecord>) -> Self {
        let records = records
            .into_iter()
            .filter(|r| clean::valid_user_id(&r.user_id))
            .collect();
        Self { records }
    }

    /// Validate and coerce raw rows.
    pub fn clean(raw: Vec<RawEvent>) -> (Self, CleaningStats) {
        clean::clean_event_log(raw)
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct user ids, sorted.
    pub fn user_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.records.iter().map(|r| r.user_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
