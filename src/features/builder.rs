//! Feature builder: event log → per-user label cutoff → lookback window → snapshot.
//!
//! Each user is computed independently from a borrowed slice of their own
//! records, so the per-user loop runs on the rayon pool.

use super::{BehavioralStats, FeatureTable, UserFeatureSnapshot};
use crate::config::FeatureConfig;
use crate::error::{ChurnError, Result};
use crate::events::{EventLog, EventRecord, SessionAggregator};
use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{debug, info};

const MS_PER_DAY: i64 = 86_400_000;

/// The events of one user that are allowed to feed features, and the label they
/// are computed against.
#[derive(Debug, Clone)]
pub struct UserWindow<'a> {
    pub user_id: &'a str,
    pub churned: bool,
    /// First cancellation time for churned users, last event time otherwise
    pub label_ts: DateTime<Utc>,
    /// Sorted by timestamp; for churned users every entry is strictly before `label_ts`
    pub events: Vec<&'a EventRecord>,
}

impl<'a> UserWindow<'a> {
    /// Apply the label cutoff and lookback window to one user's records.
    /// Returns `None` only when the user has no records at all.
    pub fn select(
        user_id: &'a str,
        mut events: Vec<&'a EventRecord>,
        config: &FeatureConfig,
    ) -> Option<Self> {
        events.sort_by_key(|e| e.ts);
        let first_churn = events.iter().find(|e| e.is_churn()).map(|e| e.ts);
        let churned = first_churn.is_some();
        let label_ts = match first_churn {
            Some(ts) => {
                events.retain(|e| e.ts < ts);
                ts
            }
            None => events.last()?.ts,
        };

        if config.lookback_days > 0 {
            let lookback = Duration::days(i64::from(config.lookback_days));
            // past the earliest representable instant the window is unbounded
            if let Some(window_start) = label_ts.checked_sub_signed(lookback) {
                events.retain(|e| e.ts >= window_start);
            }
        }

        Some(Self {
            user_id,
            churned,
            label_ts,
            events,
        })
    }

    pub fn num_sessions(&self) -> usize {
        self.events
            .iter()
            .map(|e| e.session_id)
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn passes_thresholds(&self, config: &FeatureConfig) -> bool {
        self.events.len() >= config.min_events_per_user
            && self.num_sessions() >= config.min_sessions_per_user
    }

    /// Compute the snapshot strictly from the windowed events.
    pub fn snapshot(&self, config: &FeatureConfig) -> UserFeatureSnapshot {
        let stats = BehavioralStats::from_events(&self.events);
        let mut snap = UserFeatureSnapshot::from_stats(
            self.user_id.to_string(),
            self.label_ts,
            u8::from(self.churned),
            stats,
        );

        if config.include_gender {
            let gender = last_observed(&self.events, |e| e.gender.as_deref());
            snap.gender_m = Some(u8::from(gender == Some("M")));
            snap.gender_f = Some(u8::from(gender == Some("F")));
        }
        if config.include_level {
            let level = last_observed(&self.events, |e| e.level.as_deref());
            snap.current_level_paid = Some(u8::from(level == Some("paid")));
        }
        if config.include_location {
            let locations: HashSet<&str> = self
                .events
                .iter()
                .filter_map(|e| e.location.as_deref())
                .collect();
            snap.num_locations = Some(locations.len() as u64);
        }
        snap.account_age_days = self
            .events
            .iter()
            .find_map(|e| e.registration)
            .map(|reg| {
                let ms = (self.label_ts - reg).num_milliseconds();
                ms.div_euclid(MS_PER_DAY) as f64
            });
        snap
    }
}

fn last_observed<'a>(
    events: &[&'a EventRecord],
    field: impl Fn(&'a EventRecord) -> Option<&'a str>,
) -> Option<&'a str> {
    events.iter().rev().find_map(|e| field(*e))
}

pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// See [`build_user_features`].
    pub fn build(&self, log: &EventLog) -> Result<FeatureTable> {
        build_user_features(log, &self.config)
    }
}

/// Aggregate the log into one snapshot per retained user, ordered by
/// `(label_ts, user_id)`. An empty result is an [`ChurnError::InsufficientData`].
pub fn build_user_features(log: &EventLog, config: &FeatureConfig) -> Result<FeatureTable> {
    let groups: Vec<(&str, Vec<&EventRecord>)> =
        SessionAggregator::by_user(log).into_iter().collect();
    let total_users = groups.len();

    let mut rows: Vec<UserFeatureSnapshot> = groups
        .into_par_iter()
        .filter_map(|(user_id, events)| {
            let window = UserWindow::select(user_id, events, config)?;
            if !window.passes_thresholds(config) {
                debug!(
                    user_id,
                    events = window.events.len(),
                    sessions = window.num_sessions(),
                    "user below inclusion thresholds"
                );
                return None;
            }
            Some(window.snapshot(config))
        })
        .collect();

    rows.sort_by(|a, b| {
        a.label_ts
            .cmp(&b.label_ts)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });

    info!(
        users = total_users,
        kept = rows.len(),
        dropped = total_users - rows.len(),
        "user features built"
    );

    if rows.is_empty() {
        return Err(ChurnError::InsufficientData(format!(
            "no user features generated from {} users; check feature thresholds",
            total_users
        )));
    }
    Ok(FeatureTable::new(rows))
}
