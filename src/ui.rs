use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Cell, Clear, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
        Table, TableState,
    },
};
use tracing::trace;

use crate::cells::{BadgeColor, CellContent};
use crate::header::HeaderCell;
use crate::model::{Footer, Model, UIData};

pub const BANNER_HEIGHT: usize = 3;
pub const TABLE_BORDER_HEIGHT: usize = 2;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const STATUSLINE_HEIGHT: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 2;
pub const MAX_COLUMN_WIDTH: usize = 40;
const COLUMN_SPACING: u16 = 1;

const TITLE: &str = "CRM/ERP Table";
const DOCS_LABEL: &str = " Github and Docs! ";
const DOCS_URL: &str = "https://github.com/MeetD99/CRM-Table";
const LOADING_TEXT: &str = "Loading more records...";
const EXHAUSTED_TEXT: &str = "No more records found";

const HEADER_STYLE: Style = Style::new().fg(Color::White).bg(Color::Blue);
const DOCS_STYLE: Style = Style::new().fg(Color::White).bg(Color::Rgb(86, 27, 162));

/// Renders the root view and remembers where the column headers ended up, so
/// mouse events can be mapped back to columns.
#[derive(Debug, Default)]
pub struct TableUI {
    header_row: u16,
    header_hits: Vec<(u16, u16)>, // [start, end) x range per column
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [banner, table, statusline] = Layout::vertical([
            Constraint::Length(BANNER_HEIGHT as u16),
            Constraint::Min(0),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        Self::draw_banner(frame, banner);
        self.draw_table(uidata, frame, table);
        Self::draw_statusline(uidata, frame, statusline);

        if uidata.show_popup {
            Self::draw_popup(&uidata.popup_message, frame);
        }
    }

    /// Index of the header at terminal position (x, y).
    pub fn header_at(&self, x: u16, y: u16) -> Option<usize> {
        if y != self.header_row {
            return None;
        }
        self.header_column_at(x)
    }

    /// Index of the column below x, whatever row the pointer is on.
    pub fn header_column_at(&self, x: u16) -> Option<usize> {
        self.header_hits
            .iter()
            .position(|&(start, end)| x >= start && x < end)
    }

    fn draw_banner(frame: &mut Frame, area: Rect) {
        let text = Text::from(vec![
            Line::from(TITLE.bold()),
            Line::from(vec![
                Span::styled(DOCS_LABEL, DOCS_STYLE),
                " ".into(),
                DOCS_URL.underlined().fg(Color::Cyan),
            ]),
        ]);
        frame.render_widget(Paragraph::new(text), area);
    }

    fn draw_table(&mut self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let mode = if uidata.grabbing { " moving column " } else { " contacts " };
        let block = Block::bordered().title(Line::from(mode.bold()).centered());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let constraints = uidata
            .widths
            .iter()
            .map(|&w| Constraint::Length(w as u16))
            .collect::<Vec<_>>();

        // Same split the table does internally
        let header_area = Rect::new(inner.x, inner.y, inner.width, TABLE_HEADER_HEIGHT as u16);
        self.header_row = inner.y;
        self.header_hits = Layout::horizontal(constraints.clone())
            .flex(Flex::Start)
            .spacing(COLUMN_SPACING)
            .split(header_area)
            .iter()
            .map(|r| (r.x, r.x + r.width))
            .collect();
        trace!("Header hit ranges {:?}", self.header_hits);

        let header = Row::new(uidata.headers.iter().map(header_cell)).style(HEADER_STYLE);
        let rows = uidata.rows.iter().enumerate().map(|(idx, row)| {
            let style = if (uidata.offset_row + idx) % 2 == 1 {
                Style::new().bg(Color::Indexed(236))
            } else {
                Style::new()
            };
            Row::new(row.iter().map(body_cell)).style(style)
        });

        let table = Table::new(rows, constraints)
            .header(header)
            .column_spacing(COLUMN_SPACING)
            .flex(Flex::Start)
            .row_highlight_style(Style::new().bg(Color::DarkGray).add_modifier(Modifier::BOLD));
        let mut state = TableState::default().with_selected(uidata.selected_row);
        frame.render_stateful_widget(table, inner, &mut state);

        // The sentinel line sits right below the last loaded row
        if let Some(footer) = uidata.footer {
            let y = inner.y + (TABLE_HEADER_HEIGHT + uidata.rows.len()) as u16;
            if y < inner.y + inner.height {
                let text = match footer {
                    Footer::Loading => LOADING_TEXT.italic().fg(Color::Yellow),
                    Footer::Exhausted => EXHAUSTED_TEXT.italic().fg(Color::Gray),
                    Footer::Idle => "".into(),
                };
                let line_area = Rect::new(inner.x, y, inner.width, 1);
                frame.render_widget(Paragraph::new(Line::from(text).centered()), line_area);
            }
        }

        let mut scrollbar_state =
            ScrollbarState::new(uidata.nrows).position(uidata.abs_selected_row);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area.inner(ratatui::layout::Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }

    fn draw_statusline(uidata: &UIData, frame: &mut Frame, area: Rect) {
        let mut counts = format!(
            " row {}/{} | loaded {}/{} ",
            (uidata.abs_selected_row + 1).min(uidata.nrows),
            uidata.nrows,
            uidata.nrows,
            uidata.total
        );
        if uidata.loading {
            counts.push_str("| loading ");
        }
        let [left, right] = Layout::horizontal([
            Constraint::Min(0),
            Constraint::Length(counts.chars().count() as u16),
        ])
        .areas(area);

        frame.render_widget(Paragraph::new(format!(" {}", uidata.status_message)), left);
        frame.render_widget(Paragraph::new(Span::from(counts).reversed()), right);
    }

    fn draw_popup(message: &str, frame: &mut Frame) {
        let width = message.lines().map(|l| l.chars().count()).max().unwrap_or(0) + 4;
        let height = message.lines().count() + 2;
        let area = centered_rect(frame.area(), width as u16, height as u16);
        let block = Block::bordered().title(Line::from(" Help ".bold()).centered());
        frame.render_widget(Clear, area);
        frame.render_widget(Paragraph::new(message).block(block), area);
    }
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let [area] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    area
}

fn header_cell(cell: &HeaderCell) -> Cell<'static> {
    let mut style = Style::new().add_modifier(Modifier::BOLD);
    if cell.selected {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if cell.dimmed {
        style = style.add_modifier(Modifier::DIM | Modifier::REVERSED);
    }
    Cell::from(cell.text.clone()).style(style)
}

fn badge_color(color: BadgeColor) -> Color {
    match color {
        BadgeColor::Green => Color::Green,
        BadgeColor::Red => Color::Red,
        BadgeColor::Yellow => Color::Yellow,
    }
}

fn body_cell(content: &CellContent) -> Cell<'static> {
    match content.badge {
        Some(color) => Cell::from(Line::from(Span::styled(
            format!(" {} ", content.text),
            Style::new().fg(Color::Black).bg(badge_color(color)),
        ))),
        None => Cell::from(content.text.clone()),
    }
}
