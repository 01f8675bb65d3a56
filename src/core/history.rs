//! Committed transition history.
//!
//! Every transition that commits its path is recorded here. History is
//! immutable: `record` returns a new history with the entry appended.

use super::state::Params;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Record of one committed transition.
///
/// # Example
///
/// ```rust
/// use waypoint::core::TransitionRecord;
/// use chrono::Utc;
/// use uuid::Uuid;
///
/// let record = TransitionRecord {
///     id: Uuid::new_v4(),
///     from: "".to_string(),
///     to: "home".to_string(),
///     params: Default::default(),
///     timestamp: Utc::now(),
/// };
/// assert_eq!(record.to, "home");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Id of the transition that committed
    pub id: Uuid,
    /// State the transition left (empty for the root)
    pub from: String,
    /// State the transition entered
    pub to: String,
    /// Parameters committed with the target
    pub params: Params,
    /// When the transition committed
    pub timestamp: DateTime<Utc>,
}

/// Ordered history of committed transitions.
///
/// # Example
///
/// ```rust
/// use waypoint::core::{TransitionHistory, TransitionRecord};
/// use chrono::Utc;
/// use uuid::Uuid;
///
/// let record = |from: &str, to: &str| TransitionRecord {
///     id: Uuid::new_v4(),
///     from: from.to_string(),
///     to: to.to_string(),
///     params: Default::default(),
///     timestamp: Utc::now(),
/// };
///
/// let history = TransitionHistory::new()
///     .record(record("", "home"))
///     .record(record("home", "about"));
///
/// assert_eq!(history.get_path(), vec!["", "home", "about"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionHistory {
    records: Vec<TransitionRecord>,
}

impl TransitionHistory {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Record a transition, returning a new history.
    ///
    /// The existing history is left untouched.
    pub fn record(&self, record: TransitionRecord) -> Self {
        let mut records = self.records.clone();
        records.push(record);
        Self { records }
    }

    /// Append in place, then drop the oldest records beyond `limit`.
    pub(crate) fn push(&mut self, record: TransitionRecord, limit: Option<usize>) {
        self.records.push(record);
        if let Some(limit) = limit {
            let excess = self.records.len().saturating_sub(limit);
            if excess > 0 {
                self.records.drain(..excess);
            }
        }
    }

    /// Names of the states traversed: the first source, then every target.
    pub fn get_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        if let Some(first) = self.records.first() {
            path.push(first.from.as_str());
        }
        for record in &self.records {
            path.push(record.to.as_str());
        }
        path
    }

    /// Time between the first and last committed transition.
    ///
    /// Returns `None` if nothing has been recorded.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.records.first(), self.records.last()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    pub fn last(&self) -> Option<&TransitionRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TransitionRecord] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(from: &str, to: &str) -> TransitionRecord {
        TransitionRecord {
            id: Uuid::new_v4(),
            from: from.to_string(),
            to: to.to_string(),
            params: Params::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn new_history_is_empty() {
        let history = TransitionHistory::new();
        assert!(history.is_empty());
        assert!(history.get_path().is_empty());
        assert!(history.last().is_none());
    }

    #[test]
    fn record_is_immutable() {
        let history = TransitionHistory::new();
        let recorded = history.record(record("", "a"));

        assert_eq!(history.len(), 0);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded.last().unwrap().to, "a");
    }

    #[test]
    fn get_path_returns_state_sequence() {
        let history = TransitionHistory::new()
            .record(record("", "a"))
            .record(record("a", "a.b"))
            .record(record("a.b", "c"));

        assert_eq!(history.get_path(), vec!["", "a", "a.b", "c"]);
    }

    #[test]
    fn push_keeps_only_the_newest() {
        let mut history = TransitionHistory::new();
        history.push(record("", "a"), Some(2));
        history.push(record("a", "b"), Some(2));
        history.push(record("b", "c"), Some(2));
        assert_eq!(history.get_path(), vec!["a", "b", "c"]);

        history.push(record("c", "d"), None);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn duration_spans_first_to_last() {
        let start = Utc::now();
        let mut first = record("", "a");
        first.timestamp = start;
        let mut second = record("a", "b");
        second.timestamp = start + chrono::Duration::seconds(5);

        let history = TransitionHistory::new().record(first).record(second);
        assert_eq!(history.duration(), Some(Duration::from_secs(5)));
        assert!(TransitionHistory::new().duration().is_none());
    }

    #[test]
    fn history_serializes_correctly() {
        let mut entry = record("", "a");
        entry.params.insert("id".into(), json!(7));
        let history = TransitionHistory::new().record(entry);

        let json = serde_json::to_string(&history).unwrap();
        let back: TransitionHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, history);
    }
}
