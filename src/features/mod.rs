//! Per-user feature snapshots built from cleaned event logs.

mod behavioral;
mod builder;

pub use behavioral::{safe_ratio, BehavioralStats};
pub use builder::{build_user_features, FeatureBuilder, UserWindow};

use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Label column.
pub const TARGET_COLUMN: &str = "churned";

/// Numeric columns present in every table, in output order.
pub const BASE_COLUMNS: &[&str] = &[
    "churned",
    "num_events",
    "num_sessions",
    "num_songs",
    "num_errors",
    "num_add_friend",
    "num_add_playlist",
    "num_roll_advert",
    "num_thumb_up",
    "num_thumb_down",
    "avg_items_per_session",
    "std_items_per_session",
    "total_listening_minutes",
    "event_rate_per_hour",
    "distinct_artists",
    "distinct_songs",
    "avg_session_minutes",
    "median_session_minutes",
    "std_session_minutes",
    "paid_event_ratio",
    "active_days",
];

/// Columns that exist only when the config enables them or the data supports them.
pub const OPTIONAL_COLUMNS: &[&str] = &[
    "gender_M",
    "gender_F",
    "current_level_paid",
    "num_locations",
    "account_age_days",
];

/// One row of the feature table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFeatureSnapshot {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub label_ts: DateTime<Utc>,
    pub churned: u8,
    pub num_events: u64,
    pub num_sessions: u64,
    pub num_songs: u64,
    pub num_errors: u64,
    pub num_add_friend: u64,
    pub num_add_playlist: u64,
    pub num_roll_advert: u64,
    pub num_thumb_up: u64,
    pub num_thumb_down: u64,
    pub avg_items_per_session: f64,
    pub std_items_per_session: f64,
    pub total_listening_minutes: f64,
    pub event_rate_per_hour: f64,
    pub distinct_artists: u64,
    pub distinct_songs: u64,
    pub avg_session_minutes: f64,
    pub median_session_minutes: f64,
    pub std_session_minutes: f64,
    pub paid_event_ratio: f64,
    pub active_days: f64,
    #[serde(rename = "gender_M", default, skip_serializing_if = "Option::is_none")]
    pub gender_m: Option<u8>,
    #[serde(rename = "gender_F", default, skip_serializing_if = "Option::is_none")]
    pub gender_f: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_level_paid: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_locations: Option<u64>,
    /// Absent when no registration time was observed; never defaulted to zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_age_days: Option<f64>,
}

impl UserFeatureSnapshot {
    pub(crate) fn from_stats(
        user_id: String,
        label_ts: DateTime<Utc>,
        churned: u8,
        s: BehavioralStats,
    ) -> Self {
        Self {
            user_id,
            label_ts,
            churned,
            num_events: s.num_events,
            num_sessions: s.num_sessions,
            num_songs: s.num_songs,
            num_errors: s.num_errors,
            num_add_friend: s.num_add_friend,
            num_add_playlist: s.num_add_playlist,
            num_roll_advert: s.num_roll_advert,
            num_thumb_up: s.num_thumb_up,
            num_thumb_down: s.num_thumb_down,
            avg_items_per_session: s.avg_items_per_session,
            std_items_per_session: s.std_items_per_session,
            total_listening_minutes: s.total_listening_minutes,
            event_rate_per_hour: s.event_rate_per_hour,
            distinct_artists: s.distinct_artists,
            distinct_songs: s.distinct_songs,
            avg_session_minutes: s.avg_session_minutes,
            median_session_minutes: s.median_session_minutes,
            std_session_minutes: s.std_session_minutes,
            paid_event_ratio: s.paid_event_ratio,
            active_days: s.active_days,
            gender_m: None,
            gender_f: None,
            current_level_paid: None,
            num_locations: None,
            account_age_days: None,
        }
    }

    /// Numeric value of a named column; `None` for unknown names or absent optional fields.
    pub fn value(&self, column: &str) -> Option<f64> {
        let v = match column {
            "churned" => f64::from(self.churned),
            "num_events" => self.num_events as f64,
            "num_sessions" => self.num_sessions as f64,
            "num_songs" => self.num_songs as f64,
            "num_errors" => self.num_errors as f64,
            "num_add_friend" => self.num_add_friend as f64,
            "num_add_playlist" => self.num_add_playlist as f64,
            "num_roll_advert" => self.num_roll_advert as f64,
            "num_thumb_up" => self.num_thumb_up as f64,
            "num_thumb_down" => self.num_thumb_down as f64,
            "avg_items_per_session" => self.avg_items_per_session,
            "std_items_per_session" => self.std_items_per_session,
            "total_listening_minutes" => self.total_listening_minutes,
            "event_rate_per_hour" => self.event_rate_per_hour,
            "distinct_artists" => self.distinct_artists as f64,
            "distinct_songs" => self.distinct_songs as f64,
            "avg_session_minutes" => self.avg_session_minutes,
            "median_session_minutes" => self.median_session_minutes,
            "std_session_minutes" => self.std_session_minutes,
            "paid_event_ratio" => self.paid_event_ratio,
            "active_days" => self.active_days,
            "gender_M" => f64::from(self.gender_m?),
            "gender_F" => f64::from(self.gender_f?),
            "current_level_paid" => f64::from(self.current_level_paid?),
            "num_locations" => self.num_locations? as f64,
            "account_age_days" => self.account_age_days?,
            _ => return None,
        };
        Some(v)
    }
}

/// Row-major feature table, one row per user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    rows: Vec<UserFeatureSnapshot>,
}

impl FeatureTable {
    pub fn new(rows: Vec<UserFeatureSnapshot>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[UserFeatureSnapshot] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<UserFeatureSnapshot> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn user_ids(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.user_id.as_str()).collect()
    }

    pub fn labels(&self) -> Vec<u8> {
        self.rows.iter().map(|r| r.churned).collect()
    }

    /// Numeric columns of this table: the base set plus any optional column
    /// populated in at least one row.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut cols: Vec<&'static str> = BASE_COLUMNS.to_vec();
        cols.extend(
            OPTIONAL_COLUMNS
                .iter()
                .copied()
                .filter(|c| self.rows.iter().any(|r| r.value(c).is_some())),
        );
        cols
    }

    pub fn has_column(&self, column: &str) -> bool {
        BASE_COLUMNS.contains(&column)
            || (OPTIONAL_COLUMNS.contains(&column)
                && self.rows.iter().any(|r| r.value(column).is_some()))
    }

    /// Model inputs: every column except the label.
    pub fn feature_columns(&self) -> Vec<String> {
        self.columns()
            .into_iter()
            .filter(|c| *c != TARGET_COLUMN)
            .map(String::from)
            .collect()
    }

    /// Column values with `None` for rows where an optional field is absent.
    pub fn column(&self, column: &str) -> Option<Vec<Option<f64>>> {
        if !self.has_column(column) {
            return None;
        }
        Some(self.rows.iter().map(|r| r.value(column)).collect())
    }

    /// `[rows, columns]` matrix in the given column order; missing cells are NaN.
    pub fn design_matrix(&self, columns: &[String]) -> Array2<f64> {
        Array2::from_shape_fn((self.rows.len(), columns.len()), |(i, j)| {
            self.rows[i].value(&columns[j]).unwrap_or(f64::NAN)
        })
    }

    /// New table with the rows at `indices`, in the given order.
    pub fn select(&self, indices: &[usize]) -> FeatureTable {
        FeatureTable::new(indices.iter().map(|&i| self.rows[i].clone()).collect())
    }
}

#[cfg(test)]
pub(crate) fn sample_row(user_id: &str, label_ms: i64, churned: u8) -> UserFeatureSnapshot {
    UserFeatureSnapshot::from_stats(
        user_id.to_string(),
        DateTime::<Utc>::from_timestamp_millis(label_ms).unwrap_or_default(),
        churned,
        BehavioralStats {
            num_events: 1,
            num_sessions: 1,
            event_rate_per_hour: 1.0,
            ..Default::default()
        },
    )
}
