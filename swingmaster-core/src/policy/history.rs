//! State-history port for the history-aware policy helpers.
//!
//! Ordering contract: implementations return the most recent days strictly
//! before the as-of date, newest first. Fewer rows than requested means the
//! window is incomplete; helpers treat missing history conservatively.

use chrono::NaiveDate;

use crate::domain::{ReasonCode, State};
use crate::signals::SignalKey;

#[derive(Debug, Clone)]
pub struct StateHistoryDay {
    pub date: NaiveDate,
    pub state: State,
    pub reasons: Vec<ReasonCode>,
    pub signal_keys: Vec<SignalKey>,
}

pub trait StateHistory {
    fn recent_days(&self, ticker: &str, as_of: NaiveDate, limit: usize) -> Vec<StateHistoryDay>;
}

/// History port that knows nothing. Policies fall back to their
/// history-free behavior.
pub struct NoHistory;

impl StateHistory for NoHistory {
    fn recent_days(&self, _ticker: &str, _as_of: NaiveDate, _limit: usize) -> Vec<StateHistoryDay> {
        Vec::new()
    }
}

/// In-memory history for tests and single-process backfills.
#[derive(Default)]
pub struct MemoryHistory {
    days: Vec<(String, StateHistoryDay)>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ticker: &str, day: StateHistoryDay) {
        self.days.push((ticker.to_string(), day));
    }
}

impl StateHistory for MemoryHistory {
    fn recent_days(&self, ticker: &str, as_of: NaiveDate, limit: usize) -> Vec<StateHistoryDay> {
        let mut rows: Vec<StateHistoryDay> = self
            .days
            .iter()
            .filter(|(t, d)| t == ticker && d.date < as_of)
            .map(|(_, d)| d.clone())
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        rows.truncate(limit);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn day(d: u32, state: State) -> StateHistoryDay {
        StateHistoryDay {
            date: NaiveDate::from_ymd_opt(2025, 6, d).unwrap(),
            state,
            reasons: vec![],
            signal_keys: vec![],
        }
    }

    #[test]
    fn memory_history_is_newest_first_and_bounded() {
        let mut history = MemoryHistory::new();
        history.push("AAPL", day(2, State::NoTrade));
        history.push("AAPL", day(3, State::DowntrendEarly));
        history.push("AAPL", day(4, State::DowntrendEarly));
        history.push("MSFT", day(4, State::Pass));

        let rows = history.recent_days("AAPL", NaiveDate::from_ymd_opt(2025, 6, 5).unwrap(), 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date.day(), 4);
        assert_eq!(rows[1].date.day(), 3);
    }

    #[test]
    fn as_of_day_itself_is_excluded() {
        let mut history = MemoryHistory::new();
        history.push("AAPL", day(4, State::Pass));
        let rows = history.recent_days("AAPL", NaiveDate::from_ymd_opt(2025, 6, 4).unwrap(), 5);
        assert!(rows.is_empty());
    }
}
