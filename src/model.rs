use arboard::Clipboard;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, error, info, trace};

use crate::cells::{CellContent, render_cell};
use crate::columns::{self, ColumnDescriptor, ColumnId, load_column_order, persist_column_order};
use crate::dataset::Record;
use crate::domain::{AppConfig, CrmError, HELP_TEXT, Message};
use crate::header::{DragEnd, DragTracker, GRIP, HeaderCell, header_cells};
use crate::pager::{LoadOutcome, Pager};
use crate::sort::{SortAction, SortState, sort_window};
use crate::storage::KeyValueStore;
use crate::ui::{
    BANNER_HEIGHT, COLUMN_WIDTH_MARGIN, MAX_COLUMN_WIDTH, STATUSLINE_HEIGHT, TABLE_BORDER_HEIGHT,
    TABLE_HEADER_HEIGHT,
};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    GRAB, // Keyboard drag of the selected column
    POPUP,
}

/// What the line right below the last loaded row shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Footer {
    Idle,
    Loading,
    Exhausted,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_height: usize, // Number of body rows that fit
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let table_height = ui_height.saturating_sub(
            BANNER_HEIGHT + TABLE_BORDER_HEIGHT + TABLE_HEADER_HEIGHT + STATUSLINE_HEIGHT,
        );
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_height,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct UIData {
    pub headers: Vec<HeaderCell>,
    pub widths: Vec<usize>,
    pub rows: Vec<Vec<CellContent>>,
    pub selected_row: Option<usize>, // Index into `rows`
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub offset_row: usize,
    pub nrows: usize, // Loaded rows
    pub total: usize,
    pub footer: Option<Footer>, // Set if the sentinel line is inside the viewport
    pub loading: bool,
    pub grabbing: bool,
    pub show_popup: bool,
    pub popup_message: String,
    pub status_message: String,
    pub layout: UILayout,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            headers: Vec::new(),
            widths: Vec::new(),
            rows: Vec::new(),
            selected_row: None,
            selected_column: 0,
            abs_selected_row: 0,
            offset_row: 0,
            nrows: 0,
            total: 0,
            footer: None,
            loading: false,
            grabbing: false,
            show_popup: false,
            popup_message: String::new(),
            status_message: String::new(),
            layout: UILayout::default(),
        }
    }
}

pub struct Model {
    config: AppConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    dataset: Vec<Record>,
    pager: Pager,
    columns: Vec<ColumnDescriptor>,
    column_widths: HashMap<ColumnId, usize>,
    sort: SortState,
    order: Vec<usize>, // Display order of the loaded rows
    drag: DragTracker,
    store: Box<dyn KeyValueStore>,
    selected_row: usize,
    offset_row: usize,
    selected_column: usize,
    clock: Instant,
    uilayout: UILayout,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    status_message: String,
}

impl Model {
    pub fn init(
        config: &AppConfig,
        dataset: Vec<Record>,
        store: Box<dyn KeyValueStore>,
        ui_width: usize,
        ui_height: usize,
    ) -> Self {
        let columns = load_column_order(store.as_ref(), &config.storage_key);
        let pager = Pager::new(dataset.len(), config.page_size, config.load_delay);
        info!(
            "Table with {} records, showing {} initially, columns {:?}",
            dataset.len(),
            pager.loaded(),
            columns::ids(&columns)
        );

        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            dataset,
            pager,
            columns,
            column_widths: HashMap::new(),
            sort: SortState::default(),
            order: Vec::new(),
            drag: DragTracker::default(),
            store,
            selected_row: 0,
            offset_row: 0,
            selected_column: 0,
            clock: Instant::now(),
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            clipboard: None,
            status_message: "Press ? for help".to_string(),
        };
        model.rebuild_order();
        model.maybe_load_more();
        model.update_uidata();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn is_grabbing(&self) -> bool {
        self.modus == Modus::GRAB
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    pub fn is_popup(&self) -> bool {
        self.modus == Modus::POPUP
    }

    pub fn selected_column(&self) -> usize {
        self.selected_column
    }

    pub fn quit(&mut self) {
        self.shutdown();
        self.status = Status::QUITTING;
    }

    /// Cancel work that must not outlive the table.
    pub fn shutdown(&mut self) {
        self.pager.cancel();
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), CrmError> {
        let ticked = matches!(message, Some(Message::Tick(_)));
        if let Some(msg) = message {
            match (self.modus, msg) {
                (_, Message::Tick(now)) => self.tick(now),
                (_, Message::Quit) => self.quit(),
                (_, Message::Resize(width, height)) => self.ui_resize(width, height),
                (Modus::TABLE, msg) => match msg {
                    Message::MoveUp => self.move_selection_up(1),
                    Message::MoveDown => self.move_selection_down(1),
                    Message::MovePageUp => self.move_selection_up(self.page_height()),
                    Message::MovePageDown => self.move_selection_down(self.page_height()),
                    Message::MoveBeginning => self.select_row(0),
                    Message::MoveEnd => self.select_row(self.pager.loaded().saturating_sub(1)),
                    Message::MoveLeft => {
                        self.selected_column = self.selected_column.saturating_sub(1)
                    }
                    Message::MoveRight => {
                        self.selected_column =
                            (self.selected_column + 1).min(self.columns.len() - 1)
                    }
                    Message::ScrollUp(n) => self.scroll_up(n),
                    Message::ScrollDown(n) => self.scroll_down(n),
                    Message::SortBy(idx) => self.sort_by_column(idx),
                    Message::ClearSort => self.apply_sort(SortAction::Clear),
                    Message::DragStart(idx) => self.drag_start(idx),
                    Message::DragHover(idx) => self.drag_hover(idx),
                    Message::DragEnd => self.drag_end(),
                    Message::ToggleGrab => self.grab(),
                    Message::CopyCell => self.copy_cell(),
                    Message::CopyRow => self.copy_row(),
                    Message::Help => self.show_help(),
                    _ => (),
                },
                (Modus::GRAB, msg) => match msg {
                    Message::MoveLeft => {
                        if self.selected_column > 0 {
                            self.drag_hover(self.selected_column - 1)
                        }
                    }
                    Message::MoveRight => self.drag_hover(self.selected_column + 1),
                    Message::DragHover(idx) => self.drag_hover(idx),
                    Message::ToggleGrab | Message::DragEnd | Message::Exit => self.release(),
                    _ => (),
                },
                (Modus::POPUP, msg) => match msg {
                    Message::Exit | Message::Help => self.close_popup(),
                    _ => (),
                },
            }
        }

        // Steady input keeps the event poll from timing out
        if !ticked {
            self.tick(self.now());
        }
        self.maybe_load_more();
        self.update_uidata();
        Ok(())
    }

    // Injected ticks may run ahead of the wall clock
    fn now(&self) -> Instant {
        self.clock.max(Instant::now())
    }

    // -------------------------- Loading ------------------------------- //

    fn tick(&mut self, now: Instant) {
        self.clock = now;
        match self.pager.poll(now) {
            Some(LoadOutcome::Appended(range)) => {
                self.rebuild_order();
                self.set_status_message(format!(
                    "Loaded records {}-{}",
                    range.start + 1,
                    range.end
                ));
            }
            Some(LoadOutcome::Exhausted) => self.set_status_message("No more records found"),
            None => {}
        }
    }

    /// The sentinel sits right below the last loaded row.
    fn sentinel_visible(&self) -> bool {
        let loaded = self.pager.loaded();
        let height = self.uilayout.table_height;
        height > 0 && loaded >= self.offset_row && loaded - self.offset_row < height
    }

    fn maybe_load_more(&mut self) {
        if self.status == Status::QUITTING
            || self.pager.is_loading()
            || !self.pager.has_more()
            || !self.sentinel_visible()
        {
            return;
        }
        let now = self.now();
        self.clock = now;
        if self.pager.request_more(now) {
            self.set_status_message("Loading more records...");
        }
    }

    fn footer(&self) -> Footer {
        if self.pager.is_loading() {
            Footer::Loading
        } else if !self.pager.has_more() {
            Footer::Exhausted
        } else {
            Footer::Idle
        }
    }

    // Sorting happens on the loaded window only
    fn rebuild_order(&mut self) {
        let window = &self.dataset[..self.pager.loaded()];
        self.order = sort_window(window, &self.sort);

        self.column_widths = ColumnId::ALL
            .iter()
            .map(|&id| {
                let widest = window
                    .iter()
                    .map(|r| render_cell(id, r).text.chars().count())
                    .max()
                    .unwrap_or(0);
                (id, widest)
            })
            .collect();
    }

    // -------------------------- Sorting ------------------------------- //

    fn sort_by_column(&mut self, idx: usize) {
        if let Some(column) = self.columns.get(idx) {
            self.selected_column = idx;
            self.apply_sort(SortAction::Toggle(column.sort_key));
        }
    }

    fn apply_sort(&mut self, action: SortAction) {
        if self.sort.apply(action) {
            self.rebuild_order();
            let message = match self.sort.key {
                Some(key) => format!(
                    "Sorted by {:?}{}",
                    key,
                    if self.sort.reverse { " (reversed)" } else { "" }
                ),
                None => "Sorting cleared".to_string(),
            };
            self.set_status_message(message);
        }
    }

    // ------------------------ Column order ----------------------------- //

    /// Move the column at `from` to `to` and persist the new order.
    pub fn move_column(&mut self, from: usize, to: usize) {
        if !columns::move_column(&mut self.columns, from, to) {
            return;
        }

        // Keep the selection on the same column
        let sel = self.selected_column;
        self.selected_column = if sel == from {
            to
        } else if from < sel && sel <= to {
            sel - 1
        } else if to <= sel && sel < from {
            sel + 1
        } else {
            sel
        };

        match persist_column_order(self.store.as_mut(), &self.config.storage_key, &self.columns) {
            Ok(()) => {
                debug!("Persisted column order {:?}", columns::ids(&self.columns));
                self.set_status_message(format!(
                    "Moved \"{}\" to position {}",
                    self.columns[to].label,
                    to + 1
                ));
            }
            Err(e) => {
                error!("Failed to persist column order: {e}");
                self.set_status_message(format!("Could not save column order: {e}"));
            }
        }
    }

    fn drag_start(&mut self, idx: usize) {
        if idx < self.columns.len() {
            self.drag.start(idx);
        }
    }

    fn drag_hover(&mut self, target: usize) {
        if target >= self.columns.len() {
            return;
        }
        if let Some((from, to)) = self.drag.hover(target) {
            self.move_column(from, to);
        }
    }

    fn drag_end(&mut self) {
        match self.drag.finish() {
            DragEnd::Clicked(idx) => self.sort_by_column(idx),
            DragEnd::Dropped(idx) => self.selected_column = idx,
            DragEnd::Idle => {}
        }
    }

    fn grab(&mut self) {
        self.drag.start(self.selected_column);
        self.previous_modus = self.modus;
        self.modus = Modus::GRAB;
        let label = self.columns[self.selected_column].label.clone();
        self.set_status_message(format!("Moving \"{label}\", ← → to move, Enter to drop"));
    }

    fn release(&mut self) {
        // A keyboard drop never sorts
        self.drag.finish();
        self.modus = Modus::TABLE;
        self.previous_modus = Modus::GRAB;
    }

    // ------------------------- Navigation ------------------------------ //

    fn page_height(&self) -> usize {
        self.uilayout.table_height.max(1)
    }

    fn select_row(&mut self, row: usize) {
        let nrows = self.pager.loaded();
        if nrows == 0 {
            return;
        }
        self.selected_row = row.min(nrows - 1);
        self.ensure_visible();
    }

    // Scroll so the selection is visible. Selecting the last row also brings
    // the sentinel line into view.
    fn ensure_visible(&mut self) {
        let height = self.uilayout.table_height;
        if height == 0 {
            return;
        }
        let nrows = self.pager.loaded();
        if self.selected_row < self.offset_row {
            self.offset_row = self.selected_row;
        }
        let bottom = if self.selected_row + 1 == nrows && height > 1 {
            nrows
        } else {
            self.selected_row
        };
        if bottom >= self.offset_row + height {
            self.offset_row = bottom + 1 - height;
        }
    }

    fn move_selection_up(&mut self, size: usize) {
        self.select_row(self.selected_row.saturating_sub(size));
    }

    fn move_selection_down(&mut self, size: usize) {
        self.select_row(self.selected_row + size);
    }

    fn max_offset(&self) -> usize {
        (self.pager.loaded() + 1).saturating_sub(self.uilayout.table_height)
    }

    fn scroll_down(&mut self, size: usize) {
        self.offset_row = (self.offset_row + size).min(self.max_offset());
        let last = self.pager.loaded().saturating_sub(1);
        self.selected_row = self.selected_row.max(self.offset_row).min(last);
    }

    fn scroll_up(&mut self, size: usize) {
        self.offset_row = self.offset_row.saturating_sub(size);
        let bottom = self.offset_row + self.page_height() - 1;
        self.selected_row = self.selected_row.min(bottom);
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.offset_row = self.offset_row.min(self.max_offset());
        self.ensure_visible();
    }

    // ---------------------------- Popup -------------------------------- //

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
    }

    // -------------------------- Clipboard ------------------------------ //

    fn selected_record(&self) -> Option<&Record> {
        let idx = *self.order.get(self.selected_row)?;
        self.dataset.get(idx)
    }

    fn copy_cell(&mut self) {
        let Some(record) = self.selected_record() else {
            return;
        };
        let cell = render_cell(self.columns[self.selected_column].id, record).text;
        trace!("Cell content: {}", cell);
        self.copy_to_clipboard(cell, "cell");
    }

    fn copy_row(&mut self) {
        let Some(record) = self.selected_record() else {
            return;
        };
        let row_content = self
            .columns
            .iter()
            .map(|c| wrap_cell_content(&render_cell(c.id, record).text))
            .collect::<Vec<String>>()
            .join(",");
        self.copy_to_clipboard(row_content, "row");
    }

    fn copy_to_clipboard(&mut self, content: String, what: &str) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    error!("Clipboard unavailable: {:?}", e);
                    self.set_status_message(format!("Clipboard unavailable: {e}"));
                    return;
                }
            }
        }
        let result = match self.clipboard.as_mut() {
            Some(clipboard) => clipboard.set_text(content),
            None => return,
        };
        match result {
            Ok(_) => {
                trace!("Copied {what} content to clipboard.");
                self.set_status_message(format!("Copied {what}"));
            }
            Err(e) => {
                error!("Error copying to clipboard: {:?}", e);
                self.set_status_message(format!("Copy failed: {e}"));
            }
        }
    }

    // --------------------------- UI data ------------------------------- //

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    fn update_uidata(&mut self) {
        let height = self.uilayout.table_height;
        let nrows = self.pager.loaded();
        let rbegin = self.offset_row.min(nrows);
        let rend = std::cmp::min(rbegin + height, nrows);

        let rows = self.order[rbegin..rend]
            .iter()
            .map(|&idx| {
                let record = &self.dataset[idx];
                self.columns
                    .iter()
                    .map(|c| render_cell(c.id, record))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let headers = header_cells(&self.columns, &self.sort, &self.drag, self.selected_column);
        let widths = self
            .columns
            .iter()
            .map(|c| {
                // grip, label, sort icon and the spaces between them
                let header = GRIP.chars().count() + c.label.chars().count() + 3;
                let cells = self.column_widths.get(&c.id).copied().unwrap_or(0);
                (header.max(cells) + COLUMN_WIDTH_MARGIN).min(MAX_COLUMN_WIDTH)
            })
            .collect();

        let selected_row = (self.selected_row >= rbegin && self.selected_row < rend)
            .then(|| self.selected_row - rbegin);

        self.uidata = UIData {
            headers,
            widths,
            rows,
            selected_row,
            selected_column: self.selected_column,
            abs_selected_row: self.selected_row,
            offset_row: self.offset_row,
            nrows,
            total: self.pager.total(),
            footer: self.sentinel_visible().then(|| self.footer()),
            loading: self.pager.is_loading(),
            grabbing: self.modus == Modus::GRAB,
            show_popup: self.modus == Modus::POPUP,
            popup_message: HELP_TEXT.to_string(),
            status_message: self.status_message.clone(),
            layout: self.uilayout.clone(),
        };
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn wrap_cell_content(c: &str) -> String {
    let needs_escaping = c.contains('"');
    let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',' || c == '"');
    let mut out = String::from(c);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping {
        out = format!("\"{out}\"");
    }
    out
}
