//! Behavioral statistics over one user's working subset of events.

use crate::events::{EventRecord, SessionAggregator};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const MS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehavioralStats {
    pub num_events: u64,
    pub num_sessions: u64,
    /// Page counters
    pub num_songs: u64,
    pub num_errors: u64,
    pub num_add_friend: u64,
    pub num_add_playlist: u64,
    pub num_roll_advert: u64,
    pub num_thumb_up: u64,
    pub num_thumb_down: u64,
    /// Max itemInSession per session, aggregated across sessions
    pub avg_items_per_session: f64,
    pub std_items_per_session: f64,
    pub total_listening_minutes: f64,
    pub event_rate_per_hour: f64,
    pub distinct_artists: u64,
    pub distinct_songs: u64,
    /// Session durations in minutes
    pub avg_session_minutes: f64,
    pub median_session_minutes: f64,
    pub std_session_minutes: f64,
    pub paid_event_ratio: f64,
    pub active_days: f64,
}

impl BehavioralStats {
    pub fn from_events(events: &[&EventRecord]) -> Self {
        let mut s = BehavioralStats {
            num_events: events.len() as u64,
            ..Default::default()
        };
        let mut artists = HashSet::new();
        let mut songs = HashSet::new();
        let mut paid = 0u64;
        let mut listening_secs = 0.0;

        for e in events {
            match e.page.as_str() {
                "NextSong" => s.num_songs += 1,
                "Error" => s.num_errors += 1,
                "Add Friend" => s.num_add_friend += 1,
                "Add to Playlist" => s.num_add_playlist += 1,
                "Roll Advert" => s.num_roll_advert += 1,
                "Thumbs Up" => s.num_thumb_up += 1,
                "Thumbs Down" => s.num_thumb_down += 1,
                _ => {}
            }
            if let Some(ref a) = e.artist {
                artists.insert(a.as_str());
            }
            if let Some(ref t) = e.song {
                songs.insert(t.as_str());
            }
            if e.level.as_deref() == Some("paid") {
                paid += 1;
            }
            listening_secs += e.length;
        }

        let sessions = SessionAggregator::by_session(events);
        let durations: Vec<f64> = sessions
            .values()
            .map(|group| SessionAggregator::session_duration_minutes(group))
            .collect();
        let items: Vec<f64> = sessions
            .values()
            .map(|group| {
                group.iter().map(|e| e.item_in_session).max().unwrap_or(0) as f64
            })
            .collect();

        s.num_sessions = sessions.len() as u64;
        s.avg_items_per_session = mean(&items);
        s.std_items_per_session = population_std(&items);
        s.avg_session_minutes = mean(&durations);
        s.median_session_minutes = median(&durations);
        s.std_session_minutes = population_std(&durations);
        s.total_listening_minutes = listening_secs / 60.0;
        s.event_rate_per_hour = SessionAggregator::event_rate_per_hour(events);
        s.distinct_artists = artists.len() as u64;
        s.distinct_songs = songs.len() as u64;
        s.paid_event_ratio = safe_ratio(paid as f64, events.len() as f64);
        s.active_days = (crate::events::span_ms(events) / MS_PER_DAY) as f64;
        s
    }
}

/// `numerator / denominator`, or 0.0 when the denominator is zero.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    finite_or_zero(values.iter().sum::<f64>() / values.len() as f64)
}

pub(crate) fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    let m = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };
    finite_or_zero(m)
}

/// Standard deviation with ddof = 0; a single value has no spread.
pub(crate) fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    finite_or_zero(var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn ev(min: i64, session: i64, page: &str) -> EventRecord {
        EventRecord::new(
            DateTime::<Utc>::from_timestamp_millis(min * 60_000).unwrap(),
            "u",
            session,
            page,
        )
    }

    #[test]
    fn session_statistics() {
        // sessions of 10, 20 and 60 minutes
        let events = vec![
            ev(0, 1, "NextSong"),
            ev(10, 1, "NextSong"),
            ev(100, 2, "Home"),
            ev(120, 2, "Thumbs Up"),
            ev(200, 3, "Error"),
            ev(260, 3, "NextSong"),
        ];
        let refs: Vec<&EventRecord> = events.iter().collect();
        let s = BehavioralStats::from_events(&refs);
        assert_eq!(s.num_sessions, 3);
        assert_eq!(s.num_songs, 3);
        assert_eq!(s.num_errors, 1);
        assert_eq!(s.num_thumb_up, 1);
        assert!((s.avg_session_minutes - 30.0).abs() < 1e-9);
        assert_eq!(s.median_session_minutes, 20.0);
        let expected_std = ((400.0 + 100.0 + 900.0) / 3.0f64).sqrt();
        assert!((s.std_session_minutes - expected_std).abs() < 1e-9);
    }

    #[test]
    fn single_session_has_zero_spread() {
        let events = vec![ev(0, 1, "NextSong"), ev(5, 1, "NextSong")];
        let refs: Vec<&EventRecord> = events.iter().collect();
        let s = BehavioralStats::from_events(&refs);
        assert_eq!(s.std_session_minutes, 0.0);
        assert_eq!(s.std_items_per_session, 0.0);
        assert_eq!(s.avg_session_minutes, 5.0);
    }

    #[test]
    fn empty_subset_yields_zero_defaults() {
        let s = BehavioralStats::from_events(&[]);
        assert_eq!(s, BehavioralStats::default());
        assert_eq!(s.paid_event_ratio, 0.0);
        assert!(s.avg_items_per_session.is_finite());
    }

    #[test]
    fn median_of_even_count() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(safe_ratio(3.0, 0.0), 0.0);
    }

    #[test]
    fn distinct_and_listening() {
        let mut a = ev(0, 1, "NextSong");
        a.artist = Some("A".into());
        a.song = Some("x".into());
        a.length = 120.0;
        a.level = Some("paid".into());
        let mut b = ev(1, 1, "NextSong");
        b.artist = Some("A".into());
        b.song = Some("y".into());
        b.length = 60.0;
        b.level = Some("free".into());
        let refs = vec![&a, &b];
        let s = BehavioralStats::from_events(&refs);
        assert_eq!(s.distinct_artists, 1);
        assert_eq!(s.distinct_songs, 2);
        assert_eq!(s.total_listening_minutes, 3.0);
        assert_eq!(s.paid_event_ratio, 0.5);
    }
}
