use std::fmt;
use std::io::Error;
use std::time::{Duration, Instant};

use derive_setters::Setters;
use polars::error::PolarsError;

pub const COLUMN_ORDER_KEY: &str = "columnOrder";
pub const ITEMS_PER_PAGE: usize = 10;
pub const LOAD_DELAY_MS: u64 = 1000;
pub const EVENT_POLL_TIME_MS: u64 = 100;

pub const HELP_TEXT: &str = "\
Navigation
  ↑ ↓ PgUp PgDn Home End   move the row selection
  ← →                      move the column selection
  mouse wheel              scroll

Columns
  m                        grab / release the selected column
  ← → (while grabbed)      move the grabbed column
  Enter / Esc              drop the grabbed column
  drag a header            move a column with the mouse

Sorting
  s / click a header       sort by column, again to reverse
  S                        clear sorting

Other
  c                        copy cell
  C                        copy row as csv
  ?                        this help
  Esc                      close popup
  q                        quit";

#[derive(Debug)]
pub enum CrmError {
    IoError(Error),
    PolarsError(PolarsError),
    JsonError(serde_json::Error),
    LoadingFailed(String),
    InvalidRecord(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
}

impl fmt::Display for CrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrmError::IoError(e) => write!(f, "io error: {e}"),
            CrmError::PolarsError(e) => write!(f, "failed reading data: {e}"),
            CrmError::JsonError(e) => write!(f, "invalid json: {e}"),
            CrmError::LoadingFailed(msg) => write!(f, "loading failed: {msg}"),
            CrmError::InvalidRecord(msg) => write!(f, "invalid record: {msg}"),
            CrmError::FileNotFound => write!(f, "file not found"),
            CrmError::PermissionDenied => write!(f, "permission denied"),
            CrmError::UnknownFileType => write!(f, "unknown file type"),
        }
    }
}

impl std::error::Error for CrmError {}

impl From<Error> for CrmError {
    fn from(err: Error) -> Self {
        CrmError::IoError(err)
    }
}

impl From<PolarsError> for CrmError {
    fn from(err: PolarsError) -> Self {
        CrmError::PolarsError(err)
    }
}

impl From<serde_json::Error> for CrmError {
    fn from(err: serde_json::Error) -> Self {
        CrmError::JsonError(err)
    }
}

#[derive(Debug, Clone, Setters)]
pub struct AppConfig {
    pub page_size: usize,
    pub load_delay: Duration,
    pub event_poll_time: u64,
    #[setters(into)]
    pub storage_key: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            page_size: ITEMS_PER_PAGE,
            load_delay: Duration::from_millis(LOAD_DELAY_MS),
            event_poll_time: EVENT_POLL_TIME_MS,
            storage_key: COLUMN_ORDER_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    Tick(Instant),
    Resize(usize, usize),
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    MoveLeft,
    MoveRight,
    ScrollUp(usize),
    ScrollDown(usize),
    SortBy(usize),
    ClearSort,
    DragStart(usize),
    DragHover(usize),
    DragEnd,
    ToggleGrab,
    CopyCell,
    CopyRow,
    Help,
    Exit,
}
