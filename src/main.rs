use std::fs;
use std::io::stdout;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use ratatui::DefaultTerminal;
use ratatui::crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use ratatui::crossterm::execute;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cells;
mod columns;
mod controller;
mod dataset;
mod domain;
mod header;
mod model;
mod pager;
mod sort;
mod storage;
mod ui;

use controller::Controller;
use domain::{AppConfig, CrmError, EVENT_POLL_TIME_MS, ITEMS_PER_PAGE, LOAD_DELAY_MS};
use model::{Model, Status};
use storage::{JsonFileStore, default_log_path, default_storage_path, expand_path};
use ui::TableUI;

/// Paginated contact table with sortable, draggable columns.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// csv, parquet or arrow file with the columns name, email, status, lastLogin, deals.
    /// The built-in contacts are shown if omitted.
    #[arg(short, long)]
    data: Option<String>,

    /// Json file keeping the column order [default: <config dir>/crm-table/storage.json]
    #[arg(short, long)]
    storage: Option<String>,

    /// Records loaded per page
    #[arg(long, default_value_t = ITEMS_PER_PAGE)]
    page_size: usize,

    /// Simulated delay for loading a page, in ms
    #[arg(long, default_value_t = LOAD_DELAY_MS)]
    load_delay: u64,

    /// Event poll timeout, in ms
    #[arg(long, default_value_t = EVENT_POLL_TIME_MS)]
    poll: u64,

    /// Forget the stored column order
    #[arg(long)]
    reset_columns: bool,

    /// Log file [default: <cache dir>/crm-table/latest.log]
    #[arg(long)]
    log_file: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(path: Option<PathBuf>) -> Result<(), CrmError> {
    // The terminal belongs to the ui, so logs only go to a file
    let Some(path) = path else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(&path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(args: Args) -> Result<(), CrmError> {
    let log_path = match &args.log_file {
        Some(p) => Some(expand_path(p)?),
        None => default_log_path(),
    };
    init_logging(log_path)?;
    info!("Starting crm-table with {:?}", args);

    let cfg = AppConfig::default()
        .page_size(args.page_size)
        .load_delay(Duration::from_millis(args.load_delay))
        .event_poll_time(args.poll);

    let dataset = match &args.data {
        Some(p) => dataset::load_file(expand_path(p)?)?,
        None => dataset::builtin(),
    };

    let storage_path = match &args.storage {
        Some(p) => expand_path(p)?,
        None => default_storage_path()
            .ok_or_else(|| CrmError::LoadingFailed("no home directory for the storage".into()))?,
    };
    let mut store = JsonFileStore::open(storage_path)?;
    if args.reset_columns {
        info!("Resetting column order in {:?}", store.path());
        columns::persist_column_order(&mut store, &cfg.storage_key, &columns::default_columns())?;
    }

    let mut terminal = ratatui::init();
    let result = execute!(stdout(), EnableMouseCapture)
        .map_err(CrmError::from)
        .and_then(|_| run_table(&mut terminal, &cfg, dataset, store));

    let _ = execute!(stdout(), DisableMouseCapture);
    ratatui::restore();
    result
}

fn run_table(
    terminal: &mut DefaultTerminal,
    cfg: &AppConfig,
    dataset: Vec<dataset::Record>,
    store: JsonFileStore,
) -> Result<(), CrmError> {
    let size = terminal.size()?;
    let mut model = Model::init(
        cfg,
        dataset,
        Box::new(store),
        size.width as usize,
        size.height as usize,
    );
    let mut ui = TableUI::new();
    let controller = Controller::new(cfg);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model, &ui)?;
        model.update(message)?;
    }
    info!("Quitting");
    Ok(())
}
