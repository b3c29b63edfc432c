//! Grouping by user and by session, with the per-session timing helpers.

use super::{EventLog, EventRecord};
use std::collections::BTreeMap;

const MS_PER_MINUTE: f64 = 60_000.0;
const MS_PER_HOUR: f64 = 3_600_000.0;

pub struct SessionAggregator;

impl SessionAggregator {
    /// Records per user id, in log order. Keys iterate in sorted order.
    pub fn by_user(log: &EventLog) -> BTreeMap<&str, Vec<&EventRecord>> {
        let mut groups: BTreeMap<&str, Vec<&EventRecord>> = BTreeMap::new();
        for r in log.records() {
            groups.entry(r.user_id.as_str()).or_default().push(r);
        }
        groups
    }

    /// Records per session id.
    pub fn by_session<'a>(events: &[&'a EventRecord]) -> BTreeMap<i64, Vec<&'a EventRecord>> {
        let mut groups: BTreeMap<i64, Vec<&'a EventRecord>> = BTreeMap::new();
        for r in events {
            groups.entry(r.session_id).or_default().push(r);
        }
        groups
    }

    /// max(ts) - min(ts) in minutes; 0.0 for an empty group.
    pub fn session_duration_minutes(events: &[&EventRecord]) -> f64 {
        span_ms(events) as f64 / MS_PER_MINUTE
    }

    /// Events per hour over the group's timespan. A zero timespan yields the raw count.
    pub fn event_rate_per_hour(events: &[&EventRecord]) -> f64 {
        if events.is_empty() {
            return 0.0;
        }
        let hours = span_ms(events) as f64 / MS_PER_HOUR;
        if hours <= 0.0 {
            return events.len() as f64;
        }
        events.len() as f64 / hours
    }
}

/// Milliseconds between the earliest and latest record.
pub(crate) fn span_ms(events: &[&EventRecord]) -> i64 {
    let mut it = events.iter().map(|r| r.ts.timestamp_millis());
    let Some(first) = it.next() else {
        return 0;
    };
    let (min, max) = it.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
    max - min
}
