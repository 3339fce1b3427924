//! Clock-time helpers
//!
//! All scoring and ordering compares times as minutes since midnight.

use anyhow::{Context, Result};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize};

/// Minutes since midnight
pub fn minutes_of_day(time: NaiveTime) -> i32 {
    (time.num_seconds_from_midnight() / 60) as i32
}

/// Parse `HH:MM` or `HH:MM:SS`
pub fn parse_clock(value: &str) -> Result<NaiveTime> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .with_context(|| format!("invalid clock time '{}'", value))
}

/// Serde helper for clock times sent as `HH:MM` or `HH:MM:SS`
pub fn deserialize_clock<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_clock(&raw).map_err(serde::de::Error::custom)
}

pub fn format_clock(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Closed clock-time interval `[start, end]` within one day.
///
/// Windows that wrap past midnight (`end < start`) are not supported and
/// contain no time at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Earliest and latest of the given times, `None` for an empty set
    pub fn span_of<I>(times: I) -> Option<Self>
    where
        I: IntoIterator<Item = NaiveTime>,
    {
        times.into_iter().fold(None, |acc, t| match acc {
            None => Some(Self::new(t, t)),
            Some(w) => Some(Self::new(w.start.min(t), w.end.max(t))),
        })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && time <= self.end
    }

    pub fn midpoint_minutes(&self) -> f64 {
        f64::from(minutes_of_day(self.start) + minutes_of_day(self.end)) / 2.0
    }

    pub fn half_width_minutes(&self) -> f64 {
        f64::from(minutes_of_day(self.end) - minutes_of_day(self.start)) / 2.0
    }

    pub fn distance_from_midpoint(&self, time: NaiveTime) -> f64 {
        (f64::from(minutes_of_day(time)) - self.midpoint_minutes()).abs()
    }

    pub fn label(&self) -> String {
        format!("{}–{}", format_clock(self.start), format_clock(self.end))
    }
}
