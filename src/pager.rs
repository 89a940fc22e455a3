//! Simulated infinite scroll over a fixed dataset.
//!
//! The loaded rows are always the prefix `dataset[..loaded]`. A load request
//! only schedules a deadline; the slice is appended by the first `poll` at or
//! after that deadline.

use std::ops::Range;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingLoad {
    due: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Rows `range` of the dataset are now loaded.
    Appended(Range<usize>),
    /// Nothing was left to load.
    Exhausted,
}

#[derive(Debug)]
pub struct Pager {
    total: usize,
    page_size: usize,
    delay: Duration,
    page: usize,
    loaded: usize,
    has_more: bool,
    pending: Option<PendingLoad>,
}

impl Pager {
    /// Starts with the first page loaded.
    pub fn new(total: usize, page_size: usize, delay: Duration) -> Self {
        let page_size = page_size.max(1);
        let loaded = total.min(page_size);
        Self {
            total,
            page_size,
            delay,
            page: 1,
            loaded,
            has_more: loaded < total,
            pending: None,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn loaded(&self) -> usize {
        self.loaded
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Schedule loading the next page. A no-op while a load is pending or
    /// once the dataset is exhausted; returns whether a load was scheduled.
    pub fn request_more(&mut self, now: Instant) -> bool {
        if self.is_loading() || !self.has_more {
            trace!(
                "Ignoring load request (loading: {}, has_more: {})",
                self.is_loading(),
                self.has_more
            );
            return false;
        }
        self.pending = Some(PendingLoad {
            due: now + self.delay,
        });
        debug!("Scheduled loading page {}", self.page + 1);
        true
    }

    /// Complete a pending load whose deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<LoadOutcome> {
        let pending = self.pending?;
        if now < pending.due {
            return None;
        }
        self.pending = None;

        let start = (self.page * self.page_size).min(self.total);
        let end = ((self.page + 1) * self.page_size).min(self.total);
        let outcome = if start == end {
            self.has_more = false;
            LoadOutcome::Exhausted
        } else {
            self.loaded = end;
            self.page += 1;
            self.has_more = self.loaded < self.total;
            LoadOutcome::Appended(start..end)
        };
        debug!(
            "Load finished: {:?}, page {}, loaded {}/{}",
            outcome, self.page, self.loaded, self.total
        );
        Some(outcome)
    }

    /// Drop a pending load without applying it.
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.pending.take().is_some();
        if cancelled {
            debug!("Cancelled pending load of page {}", self.page + 1);
        }
        cancelled
    }
}
