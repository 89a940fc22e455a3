use std::cmp::Ordering;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortKey {
    Name,
    Email,
    Status,
    LastLogin,
    Deals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortAction {
    Toggle(SortKey),
    Clear,
}

/// Active sort. `key == None` keeps the loaded order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortState {
    pub key: Option<SortKey>,
    pub reverse: bool,
}

impl SortState {
    /// Toggling the active key flips the direction, any other key starts
    /// ascending. Returns true if the state changed.
    pub fn apply(&mut self, action: SortAction) -> bool {
        let before = *self;
        *self = match action {
            SortAction::Toggle(key) if self.key == Some(key) => SortState {
                key: Some(key),
                reverse: !self.reverse,
            },
            SortAction::Toggle(key) => SortState {
                key: Some(key),
                reverse: false,
            },
            SortAction::Clear => SortState::default(),
        };
        if before != *self {
            on_sort_change(action, self);
            true
        } else {
            false
        }
    }

    pub fn icon(&self, key: SortKey) -> &'static str {
        match (self.key, self.reverse) {
            (Some(active), false) if active == key => "↑",
            (Some(active), true) if active == key => "↓",
            _ => "⇅",
        }
    }
}

fn on_sort_change(action: SortAction, state: &SortState) {
    info!("Sort changed: {action:?} => {state:?}");
}

// Case-insensitive first, lowercase before uppercase on ties
fn locale_compare(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

pub fn compare(key: SortKey, a: &Record, b: &Record) -> Ordering {
    match key {
        SortKey::Name => locale_compare(&a.name, &b.name),
        SortKey::Email => locale_compare(&a.email, &b.email),
        SortKey::Status => locale_compare(a.status.as_str(), b.status.as_str()),
        // Newest first, never logged in counts as the epoch
        SortKey::LastLogin => {
            let ts = |r: &Record| r.last_login.map(|t| t.timestamp_millis()).unwrap_or(0);
            ts(b).cmp(&ts(a))
        }
        SortKey::Deals => a.deals.cmp(&b.deals),
    }
}

/// Display order of `rows`, as indices into `rows`.
///
/// Only reorders what is passed in; the result is always a permutation of
/// `0..rows.len()`.
pub fn sort_window(rows: &[Record], state: &SortState) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    if let Some(key) = state.key {
        // Equal rows keep their loaded order in both directions
        order.par_sort_by(|&a, &b| {
            let ord = compare(key, &rows[a], &rows[b]);
            if state.reverse { ord.reverse() } else { ord }
        });
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{RecordStatus, builtin};
    use chrono::{TimeZone, Utc};

    fn record(name: &str, status: &str, login: Option<i64>, deals: i64) -> Record {
        Record {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            status: RecordStatus::from(status),
            last_login: login.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
            deals,
        }
    }

    fn names(rows: &[Record], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| rows[i].name.clone()).collect()
    }

    fn rows() -> Vec<Record> {
        vec![
            record("carol", "Inactive", Some(2_000), 5),
            record("Bob", "Active", None, 12),
            record("alice", "Pending", Some(9_000), 1),
            record("bob", "Active", Some(5_000), 7),
        ]
    }

    #[test]
    fn unsorted_keeps_loaded_order() {
        let rows = rows();
        assert_eq!(sort_window(&rows, &SortState::default()), vec![0, 1, 2, 3]);
    }

    #[test]
    fn names_sort_like_locale_compare() {
        let rows = rows();
        let state = SortState { key: Some(SortKey::Name), reverse: false };
        assert_eq!(names(&rows, &sort_window(&rows, &state)), ["alice", "bob", "Bob", "carol"]);
    }

    #[test]
    fn last_login_sorts_newest_first_and_never_last() {
        let rows = rows();
        let state = SortState { key: Some(SortKey::LastLogin), reverse: false };
        assert_eq!(names(&rows, &sort_window(&rows, &state)), ["alice", "bob", "carol", "Bob"]);
    }

    #[test]
    fn equal_rows_keep_loaded_order_when_reversed() {
        let rows = vec![
            record("a", "Active", None, 3),
            record("b", "Active", None, 1),
            record("c", "Active", None, 3),
        ];
        let mut state = SortState { key: Some(SortKey::Deals), reverse: false };
        assert_eq!(sort_window(&rows, &state), vec![1, 0, 2]);
        state.reverse = true;
        assert_eq!(sort_window(&rows, &state), vec![0, 2, 1]);
    }

    #[test]
    fn deals_sort_numerically_and_reverse() {
        let rows = rows();
        let mut state = SortState { key: Some(SortKey::Deals), reverse: false };
        assert_eq!(sort_window(&rows, &state), vec![2, 0, 3, 1]);
        state.reverse = true;
        assert_eq!(sort_window(&rows, &state), vec![1, 3, 0, 2]);
    }

    #[test]
    fn status_sorts_by_text() {
        let rows = rows();
        let state = SortState { key: Some(SortKey::Status), reverse: false };
        let order = sort_window(&rows, &state);
        let statuses: Vec<&str> = order.iter().map(|&i| rows[i].status.as_str()).collect();
        assert_eq!(statuses, ["Active", "Active", "Inactive", "Pending"]);
    }

    #[test]
    fn sorting_is_a_permutation_of_the_window() {
        let all = builtin();
        let window = &all[..17];
        for key in [SortKey::Name, SortKey::Email, SortKey::Status, SortKey::LastLogin, SortKey::Deals] {
            let mut order = sort_window(window, &SortState { key: Some(key), reverse: false });
            assert_eq!(order.len(), window.len());
            order.sort_unstable();
            assert_eq!(order, (0..window.len()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn toggling_flips_direction_and_switching_resets_it() {
        let mut state = SortState::default();
        assert!(state.apply(SortAction::Toggle(SortKey::Name)));
        assert_eq!(state, SortState { key: Some(SortKey::Name), reverse: false });
        assert!(state.apply(SortAction::Toggle(SortKey::Name)));
        assert!(state.reverse);
        assert_eq!(state.icon(SortKey::Name), "↓");
        assert_eq!(state.icon(SortKey::Deals), "⇅");

        assert!(state.apply(SortAction::Toggle(SortKey::Deals)));
        assert_eq!(state, SortState { key: Some(SortKey::Deals), reverse: false });
        assert_eq!(state.icon(SortKey::Deals), "↑");

        assert!(state.apply(SortAction::Clear));
        assert!(!state.apply(SortAction::Clear));
        assert_eq!(state, SortState::default());
    }
}
