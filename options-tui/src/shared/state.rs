//! UI-facing refresh state owned by the [`RefreshController`](super::controller::RefreshController)

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use options_data::{OptionSample, OptionType, SystemStatus};
use thiserror::Error;

/// Trailing window of chart data, restricted to the selectable options
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TimeRange {
    OneHour,
    SixHours,
    TwelveHours,
    #[default]
    OneDay,
    TwoDays,
    OneWeek,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unsupported time range: {0}h (expected one of 1, 6, 12, 24, 48, 168)")]
pub struct UnsupportedTimeRange(pub u32);

impl TimeRange {
    pub const ALL: [TimeRange; 6] = [
        TimeRange::OneHour,
        TimeRange::SixHours,
        TimeRange::TwelveHours,
        TimeRange::OneDay,
        TimeRange::TwoDays,
        TimeRange::OneWeek,
    ];

    pub fn hours(&self) -> u32 {
        match self {
            TimeRange::OneHour => 1,
            TimeRange::SixHours => 6,
            TimeRange::TwelveHours => 12,
            TimeRange::OneDay => 24,
            TimeRange::TwoDays => 48,
            TimeRange::OneWeek => 168,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::OneHour => "1H",
            TimeRange::SixHours => "6H",
            TimeRange::TwelveHours => "12H",
            TimeRange::OneDay => "1D",
            TimeRange::TwoDays => "2D",
            TimeRange::OneWeek => "1W",
        }
    }

    pub fn from_hours(hours: u32) -> Result<Self, UnsupportedTimeRange> {
        Self::ALL
            .into_iter()
            .find(|range| range.hours() == hours)
            .ok_or(UnsupportedTimeRange(hours))
    }

    /// Next wider range, saturating at one week
    pub fn wider(&self) -> Self {
        let index = self.index();
        Self::ALL[(index + 1).min(Self::ALL.len() - 1)]
    }

    /// Next narrower range, saturating at one hour
    pub fn narrower(&self) -> Self {
        Self::ALL[self.index().saturating_sub(1)]
    }

    fn index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|range| range == self)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Initializing,
    Ready,
}

/// User-visible error, one per failing operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorNotice {
    ChartData,
    LatestData,
    TriggerCollection,
}

impl ErrorNotice {
    /// Fixed, user-facing message (never the raw transport error)
    pub fn message(&self) -> &'static str {
        match self {
            ErrorNotice::ChartData => "Failed to fetch chart data",
            ErrorNotice::LatestData => "Failed to fetch latest data",
            ErrorNotice::TriggerCollection => "Failed to trigger data collection",
        }
    }
}

/// Everything the presentation surface renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshState {
    pub phase: Phase,
    /// Samples of the last applied chart fetch, in arrival order
    pub raw_samples: Vec<OptionSample>,
    /// One sample per option type
    pub latest_snapshot: BTreeMap<OptionType, OptionSample>,
    pub status: Option<SystemStatus>,
    pub error: Option<ErrorNotice>,
    /// Gates the first render only
    pub loading: bool,
    pub time_range: TimeRange,
    pub last_update: Option<DateTime<Utc>>,
}

impl RefreshState {
    pub fn new(time_range: TimeRange) -> Self {
        Self {
            phase: Phase::Initializing,
            raw_samples: Vec::new(),
            latest_snapshot: BTreeMap::new(),
            status: None,
            error: None,
            loading: true,
            time_range,
            last_update: None,
        }
    }

    /// Replace the latest snapshot. A repeated option type keeps the last sample.
    pub(crate) fn replace_latest(&mut self, samples: Vec<OptionSample>) {
        self.latest_snapshot = samples
            .into_iter()
            .map(|sample| (sample.option_type, sample))
            .collect();
    }

    /// Sample heading the latest panel (spot price and update time), first in display order
    pub fn headline_sample(&self) -> Option<&OptionSample> {
        self.latest_snapshot.values().next()
    }
}

impl Default for RefreshState {
    fn default() -> Self {
        Self::new(TimeRange::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_from_hours() {
        struct TestCase {
            input: u32,
            expected: Result<TimeRange, UnsupportedTimeRange>,
        }

        let tests = vec![
            TestCase {
                // TC0: smallest option
                input: 1,
                expected: Ok(TimeRange::OneHour),
            },
            TestCase {
                // TC1: default option
                input: 24,
                expected: Ok(TimeRange::OneDay),
            },
            TestCase {
                // TC2: one week
                input: 168,
                expected: Ok(TimeRange::OneWeek),
            },
            TestCase {
                // TC3: not a selectable option
                input: 3,
                expected: Err(UnsupportedTimeRange(3)),
            },
            TestCase {
                // TC4: zero
                input: 0,
                expected: Err(UnsupportedTimeRange(0)),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = TimeRange::from_hours(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_time_range_stepping_saturates() {
        assert_eq!(TimeRange::OneHour.narrower(), TimeRange::OneHour);
        assert_eq!(TimeRange::OneHour.wider(), TimeRange::SixHours);
        assert_eq!(TimeRange::TwoDays.wider(), TimeRange::OneWeek);
        assert_eq!(TimeRange::OneWeek.wider(), TimeRange::OneWeek);
    }

    #[test]
    fn test_time_range_labels() {
        let labels: Vec<_> = TimeRange::ALL.iter().map(TimeRange::label).collect();
        assert_eq!(labels, vec!["1H", "6H", "12H", "1D", "2D", "1W"]);
    }

    #[test]
    fn test_new_state_is_loading_and_empty() {
        let state = RefreshState::default();
        assert!(state.loading);
        assert_eq!(state.phase, Phase::Initializing);
        assert_eq!(state.time_range, TimeRange::OneDay);
        assert!(state.raw_samples.is_empty());
        assert!(state.latest_snapshot.is_empty());
        assert!(state.error.is_none());
    }
}
