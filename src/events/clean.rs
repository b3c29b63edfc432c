//! Raw row validation and numeric coercion.

use super::{EventLog, EventRecord, RawEvent};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

/// Counts of rows removed by cleaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleaningStats {
    pub input_rows: usize,
    pub missing_user: usize,
    pub invalid_timestamp: usize,
    pub kept_rows: usize,
}

pub(crate) fn valid_user_id(id: &str) -> bool {
    !id.is_empty() && id != "None"
}

fn user_id_of(v: &Value) -> Option<String> {
    let id = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    valid_user_id(&id).then_some(id)
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite())
}

fn as_instant(v: &Value) -> Option<DateTime<Utc>> {
    as_i64(v).and_then(DateTime::<Utc>::from_timestamp_millis)
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

pub(crate) fn clean_event_log(raw: Vec<RawEvent>) -> (EventLog, CleaningStats) {
    let mut stats = CleaningStats {
        input_rows: raw.len(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(raw.len());

    for row in raw {
        let Some(user_id) = row.user_id.as_ref().and_then(user_id_of) else {
            stats.missing_user += 1;
            continue;
        };
        let Some(ts) = row.ts.as_ref().and_then(as_instant) else {
            stats.invalid_timestamp += 1;
            debug!(user_id = %user_id, "dropping event with unparseable timestamp");
            continue;
        };

        records.push(EventRecord {
            ts,
            user_id,
            session_id: row.session_id.as_ref().and_then(as_i64).unwrap_or(-1),
            page: row.page.unwrap_or_default(),
            item_in_session: row
                .item_in_session
                .as_ref()
                .and_then(as_i64)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0),
            level: non_empty(row.level),
            length: row
                .length
                .as_ref()
                .and_then(as_f64)
                .filter(|l| *l >= 0.0)
                .unwrap_or(0.0),
            artist: non_empty(row.artist),
            song: non_empty(row.song),
            gender: non_empty(row.gender),
            location: non_empty(row.location),
            registration: row.registration.as_ref().and_then(as_instant),
        });
    }

    stats.kept_rows = records.len();
    info!(
        input = stats.input_rows,
        kept = stats.kept_rows,
        missing_user = stats.missing_user,
        invalid_ts = stats.invalid_timestamp,
        "event log cleaned"
    );
    (EventLog { records }, stats)
}
