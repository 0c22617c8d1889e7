//! Wall-clock schedule for automatic speech.
//!
//! Three fixed modes. Fire times align to the clock (next minute, next
//! ten-minute mark, next hour) rather than to the moment a mode was picked.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::Deserialize;
use thiserror::Error;

/// Deserializes from either the key or the label, same as `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, clap::ValueEnum)]
#[serde(try_from = "String")]
pub enum ScheduleMode {
    #[value(name = "minute")]
    EveryMinute,
    #[default]
    #[value(name = "ten_minutes")]
    EveryTenMinutes,
    #[value(name = "hourly")]
    Hourly,
}

impl ScheduleMode {
    /// Menu order.
    pub const ALL: [ScheduleMode; 3] = [Self::EveryMinute, Self::EveryTenMinutes, Self::Hourly];

    pub fn key(self) -> &'static str {
        match self {
            Self::EveryMinute => "minute",
            Self::EveryTenMinutes => "ten_minutes",
            Self::Hourly => "hourly",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::EveryMinute => "Every minute",
            Self::EveryTenMinutes => "Every 10 minutes",
            Self::Hourly => "Hourly on the hour",
        }
    }

    /// Next fire time strictly after `now`.
    pub fn next_fire_after(self, now: NaiveDateTime) -> NaiveDateTime {
        let base = truncate_to_minute(now);

        match self {
            Self::EveryMinute => base + Duration::minutes(1),
            Self::Hourly => {
                let hour = base - Duration::minutes(i64::from(base.minute()));
                hour + Duration::hours(1)
            }
            Self::EveryTenMinutes => {
                let bucket = base - Duration::minutes(i64::from(base.minute() % 10));
                let mut candidate = bucket;
                if candidate <= now {
                    candidate += Duration::minutes(10);
                }
                candidate
            }
        }
    }
}

impl fmt::Display for ScheduleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown schedule mode: {0}")]
pub struct UnknownScheduleMode(pub String);

impl FromStr for ScheduleMode {
    type Err = UnknownScheduleMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.key().eq_ignore_ascii_case(s) || m.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownScheduleMode(s.to_string()))
    }
}

impl TryFrom<String> for ScheduleMode {
    type Error = UnknownScheduleMode;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_nanosecond(0)
        .and_then(|t| t.with_second(0))
        .unwrap_or(t)
}

/// Active mode plus the next time it fires.
#[derive(Debug, Clone)]
pub struct Scheduler {
    mode: ScheduleMode,
    next_fire: NaiveDateTime,
}

impl Scheduler {
    pub fn new(mode: ScheduleMode, now: NaiveDateTime) -> Self {
        Self {
            mode,
            next_fire: mode.next_fire_after(now),
        }
    }

    pub fn mode(&self) -> ScheduleMode {
        self.mode
    }

    pub fn next_fire(&self) -> NaiveDateTime {
        self.next_fire
    }

    /// Switch modes and restart the countdown from `now`.
    pub fn set_mode(&mut self, mode: ScheduleMode, now: NaiveDateTime) {
        self.mode = mode;
        self.next_fire = mode.next_fire_after(now);
    }

    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        now >= self.next_fire
    }

    pub fn advance(&mut self, now: NaiveDateTime) {
        self.next_fire = self.mode.next_fire_after(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_milli_opt(h, m, s, 250)
            .unwrap()
    }

    fn exact(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn every_minute_fires_at_next_minute() {
        assert_eq!(ScheduleMode::EveryMinute.next_fire_after(at(9, 41, 7)), exact(9, 42));
        assert_eq!(ScheduleMode::EveryMinute.next_fire_after(exact(9, 41)), exact(9, 42));
    }

    #[test]
    fn ten_minutes_aligns_to_clock() {
        let mode = ScheduleMode::EveryTenMinutes;
        assert_eq!(mode.next_fire_after(at(9, 41, 7)), exact(9, 50));
        assert_eq!(mode.next_fire_after(at(9, 49, 59)), exact(9, 50));
        assert_eq!(mode.next_fire_after(exact(9, 50)), exact(10, 0));
    }

    #[test]
    fn ten_minutes_rolls_over_midnight() {
        let next_day = exact(0, 0) + Duration::days(1);
        assert_eq!(ScheduleMode::EveryTenMinutes.next_fire_after(at(23, 55, 0)), next_day);
        assert_eq!(ScheduleMode::Hourly.next_fire_after(at(23, 1, 0)), next_day);
    }

    #[test]
    fn hourly_fires_on_the_hour() {
        assert_eq!(ScheduleMode::Hourly.next_fire_after(at(9, 41, 7)), exact(10, 0));
        assert_eq!(ScheduleMode::Hourly.next_fire_after(exact(10, 0)), exact(11, 0));
    }

    #[test]
    fn next_fire_is_always_in_the_future() {
        for mode in ScheduleMode::ALL {
            for minute in 0..60 {
                let now = at(13, minute, 0);
                assert!(mode.next_fire_after(now) > now, "{mode} at {now}");
            }
        }
    }

    #[test]
    fn selecting_a_mode_activates_exactly_that_mode() {
        let mut scheduler = Scheduler::new(ScheduleMode::EveryTenMinutes, at(9, 41, 7));
        for mode in ScheduleMode::ALL {
            scheduler.set_mode(mode, at(9, 43, 0));
            assert_eq!(scheduler.mode(), mode);
            assert_eq!(scheduler.next_fire(), mode.next_fire_after(at(9, 43, 0)));
        }
    }

    #[test]
    fn due_then_advance() {
        let mut scheduler = Scheduler::new(ScheduleMode::EveryMinute, at(9, 41, 7));
        assert!(!scheduler.is_due(at(9, 41, 59)));
        assert!(scheduler.is_due(exact(9, 42)));
        scheduler.advance(at(9, 42, 3));
        assert_eq!(scheduler.next_fire(), exact(9, 43));
    }

    #[test]
    fn parses_keys_and_labels() {
        assert_eq!("hourly".parse::<ScheduleMode>(), Ok(ScheduleMode::Hourly));
        assert_eq!("Every 10 minutes".parse::<ScheduleMode>(), Ok(ScheduleMode::EveryTenMinutes));
        assert_eq!(
            "weekly".parse::<ScheduleMode>().unwrap_err().to_string(),
            "unknown schedule mode: weekly"
        );
    }
}
