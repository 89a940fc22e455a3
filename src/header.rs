//! Draggable column headers.
//!
//! A header is both a drag source (identified by its current index) and a
//! drop target. Hovering a different header emits a move request right
//! away and the tracked index follows the dragged column, so dragging across
//! several headers moves the column one cell at a time.

use tracing::trace;

use crate::columns::ColumnDescriptor;
use crate::sort::SortState;

pub const GRIP: &str = "⋮⋮";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragEnd {
    /// The column was moved and now sits at `index`.
    Dropped(usize),
    /// Pressed and released on the same header without moving it.
    Clicked(usize),
    /// No drag was in progress.
    Idle,
}

#[derive(Debug, Default)]
pub struct DragTracker {
    dragged: Option<usize>,
    moved: bool,
}

impl DragTracker {
    pub fn start(&mut self, index: usize) {
        trace!("Drag started at header {index}");
        self.dragged = Some(index);
        self.moved = false;
    }

    /// Move request `(from, to)` for hovering header `target`.
    pub fn hover(&mut self, target: usize) -> Option<(usize, usize)> {
        let from = self.dragged?;
        if from == target {
            return None;
        }
        self.dragged = Some(target);
        self.moved = true;
        Some((from, target))
    }

    pub fn finish(&mut self) -> DragEnd {
        let end = match self.dragged.take() {
            Some(index) if self.moved => DragEnd::Dropped(index),
            Some(index) => DragEnd::Clicked(index),
            None => DragEnd::Idle,
        };
        self.moved = false;
        trace!("Drag finished: {end:?}");
        end
    }

    pub fn dragged(&self) -> Option<usize> {
        self.dragged
    }

    pub fn is_dragging(&self) -> bool {
        self.dragged.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCell {
    pub text: String,
    pub dimmed: bool,
    pub selected: bool,
}

pub fn header_cells(
    columns: &[ColumnDescriptor],
    sort: &SortState,
    drag: &DragTracker,
    selected_column: usize,
) -> Vec<HeaderCell> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, column)| HeaderCell {
            text: format!("{GRIP} {} {}", column.label, sort.icon(column.sort_key)),
            dimmed: drag.dragged() == Some(idx),
            selected: idx == selected_column,
        })
        .collect()
}
