use chrono::{DateTime, Utc};

use crate::columns::ColumnId;
use crate::dataset::{Record, RecordStatus};

pub const NEVER: &str = "Never";
const LAST_LOGIN_FORMAT: &str = "%b %d, %Y, %I:%M %p";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeColor {
    Green,
    Red,
    Yellow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellContent {
    pub text: String,
    pub badge: Option<BadgeColor>,
}

impl CellContent {
    fn plain(text: String) -> Self {
        Self { text, badge: None }
    }
}

pub fn status_color(status: &RecordStatus) -> BadgeColor {
    match status {
        RecordStatus::Active => BadgeColor::Green,
        RecordStatus::Inactive => BadgeColor::Red,
        RecordStatus::Other(_) => BadgeColor::Yellow,
    }
}

pub fn format_last_login(last_login: Option<&DateTime<Utc>>) -> String {
    match last_login {
        Some(ts) => ts.format(LAST_LOGIN_FORMAT).to_string(),
        None => NEVER.to_string(),
    }
}

pub fn render_cell(id: ColumnId, record: &Record) -> CellContent {
    match id {
        ColumnId::Status => CellContent {
            text: record.status.to_string(),
            badge: Some(status_color(&record.status)),
        },
        ColumnId::LastLogin => CellContent::plain(format_last_login(record.last_login.as_ref())),
        ColumnId::Name => CellContent::plain(record.name.clone()),
        ColumnId::Email => CellContent::plain(record.email.clone()),
        ColumnId::Deals => CellContent::plain(record.deals.to_string()),
    }
}
