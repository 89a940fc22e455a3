use chrono::{DateTime, NaiveDateTime, Utc};
use polars::prelude::*;
use rayon::prelude::*;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};

use crate::domain::CrmError;

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStatus {
    Active,
    Inactive,
    Other(String),
}

impl RecordStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RecordStatus::Active => "Active",
            RecordStatus::Inactive => "Inactive",
            RecordStatus::Other(s) => s,
        }
    }
}

impl From<&str> for RecordStatus {
    fn from(s: &str) -> Self {
        match s {
            "Active" => RecordStatus::Active,
            "Inactive" => RecordStatus::Inactive,
            other => RecordStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One contact row. Never mutated once it is part of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub email: String,
    pub status: RecordStatus,
    pub last_login: Option<DateTime<Utc>>,
    pub deals: i64,
}

// Columns every data file has to provide
const REQUIRED_COLUMNS: [&str; 5] = ["name", "email", "status", "lastLogin", "deals"];

#[rustfmt::skip]
const BUILTIN: &[(&str, &str, &str, Option<&str>, i64)] = &[
    ("Olivia Martinez", "olivia.martinez@northwind.io", "Active", Some("2024-11-02T09:15:00Z"), 14),
    ("Liam Johnson", "liam.johnson@acme-corp.com", "Inactive", Some("2024-06-18T16:40:00Z"), 3),
    ("Emma Williams", "emma.w@globex.net", "Active", Some("2024-11-10T11:05:00Z"), 22),
    ("Noah Brown", "noah.brown@initech.com", "Pending", None, 0),
    ("Ava Jones", "ava.jones@umbrella.org", "Active", Some("2024-10-28T08:30:00Z"), 9),
    ("Elijah Garcia", "elijah.garcia@hooli.com", "Inactive", Some("2023-12-01T13:20:00Z"), 5),
    ("Sophia Miller", "sophia.miller@stark.io", "Active", Some("2024-11-11T17:45:00Z"), 31),
    ("James Davis", "james.davis@wayne-ent.com", "Active", Some("2024-09-14T10:00:00Z"), 12),
    ("Isabella Rodriguez", "isabella.r@cyberdyne.ai", "Pending", None, 1),
    ("Benjamin Wilson", "ben.wilson@soylent.co", "Inactive", Some("2024-02-22T07:55:00Z"), 7),
    ("Mia Anderson", "mia.anderson@tyrell.com", "Active", Some("2024-11-09T19:10:00Z"), 18),
    ("Lucas Thomas", "lucas.thomas@oscorp.net", "Active", Some("2024-08-03T12:25:00Z"), 4),
    ("Charlotte Taylor", "charlotte.t@vandelay.com", "Inactive", None, 0),
    ("Henry Moore", "henry.moore@gringotts.bank", "Active", Some("2024-10-05T15:35:00Z"), 27),
    ("Amelia Jackson", "amelia.jackson@monarch.io", "Pending", Some("2024-11-01T06:50:00Z"), 2),
    ("Alexander Martin", "alex.martin@massive.dyn", "Active", Some("2024-07-21T14:15:00Z"), 16),
    ("Harper Lee", "harper.lee@aperture.sci", "Active", Some("2024-11-12T09:00:00Z"), 11),
    ("Daniel Perez", "daniel.perez@blackmesa.com", "Inactive", Some("2024-01-30T18:05:00Z"), 6),
    ("Evelyn Thompson", "evelyn.t@weyland.corp", "Active", Some("2024-10-19T10:45:00Z"), 20),
    ("Matthew White", "matthew.white@dunder.com", "Pending", None, 0),
    ("Abigail Harris", "abigail.harris@pied-piper.com", "Active", Some("2024-09-29T13:30:00Z"), 25),
    ("Jackson Sanchez", "jackson.s@bluthcompany.com", "Inactive", Some("2024-04-11T08:10:00Z"), 8),
    ("Emily Clark", "emily.clark@duff.beer", "Active", Some("2024-11-07T20:20:00Z"), 13),
    ("Sebastian Ramirez", "sebastian.r@krusty.co", "Active", Some("2024-06-02T11:55:00Z"), 10),
    ("Elizabeth Lewis", "elizabeth.lewis@nakatomi.jp", "Pending", Some("2024-10-30T07:40:00Z"), 3),
    ("Jack Robinson", "jack.robinson@gekko.fin", "Inactive", None, 1),
    ("Sofia Walker", "sofia.walker@prestige.ww", "Active", Some("2024-11-13T16:00:00Z"), 29),
    ("Owen Young", "owen.young@rekall.com", "Active", Some("2024-05-17T09:25:00Z"), 15),
    ("Avery Allen", "avery.allen@sterling.co", "Inactive", Some("2023-11-08T12:35:00Z"), 2),
    ("Samuel King", "samuel.king@virtucon.com", "Active", Some("2024-10-22T14:50:00Z"), 19),
    ("Ella Wright", "ella.wright@spacely.sp", "Pending", None, 0),
    ("Logan Scott", "logan.scott@cogswell.cog", "Active", Some("2024-08-26T17:05:00Z"), 23),
    ("Scarlett Torres", "scarlett.t@ollivanders.uk", "Active", Some("2024-11-04T08:15:00Z"), 17),
    ("Wyatt Nguyen", "wyatt.nguyen@zorg.ind", "Inactive", Some("2024-03-09T10:30:00Z"), 4),
    ("Grace Hill", "grace.hill@burns-nuclear.com", "Active", Some("2024-09-06T15:45:00Z"), 21),
    ("Carter Flores", "carter.flores@wonka.choc", "Pending", Some("2024-10-14T11:20:00Z"), 1),
    ("Chloe Green", "chloe.green@acme-corp.com", "Active", Some("2024-11-08T13:55:00Z"), 26),
    ("Jayden Adams", "jayden.adams@globex.net", "Inactive", None, 0),
    ("Victoria Nelson", "victoria.nelson@initech.com", "Active", Some("2024-07-04T09:40:00Z"), 8),
    ("Dylan Baker", "dylan.baker@hooli.com", "Active", Some("2024-10-25T18:35:00Z"), 12),
    ("Riley Hall", "riley.hall@stark.io", "Pending", Some("2024-11-03T07:05:00Z"), 2),
    ("Grayson Rivera", "grayson.rivera@tyrell.com", "Inactive", Some("2024-01-12T16:25:00Z"), 5),
];

/// The dataset shipped with the binary.
pub fn builtin() -> Vec<Record> {
    BUILTIN
        .iter()
        .map(|&(name, email, status, last_login, deals)| Record {
            name: name.to_string(),
            email: email.to_string(),
            status: RecordStatus::from(status),
            last_login: last_login.and_then(|ts| parse_timestamp(ts).ok()),
            deals,
        })
        .collect()
}

/// Read all records of a csv, parquet or arrow file.
///
/// Every file has to provide the columns `name`, `email`, `status`,
/// `lastLogin` and `deals`. Empty `lastLogin` cells mean "never logged in".
pub fn load_file(path: PathBuf) -> Result<Vec<Record>, CrmError> {
    let (path, file_type) = get_file_info(path)?;
    let frame = match file_type {
        FileType::CSV => load_csv(&path)?,
        FileType::PARQUET => load_parquet(&path)?,
        FileType::ARROW => load_arrow(&path)?,
    };

    let start_time = Instant::now();
    let df = Arc::new(frame.collect()?);

    // Each column is extracted in its own thread
    let c_: Result<Vec<Vec<Option<String>>>, PolarsError> = REQUIRED_COLUMNS
        .par_iter()
        .map(|name| read_column(&df, name))
        .collect();
    let columns = c_?;

    let records = build_records(&columns)?;
    info!(
        "Loaded {} records from {:?} in {}ms",
        records.len(),
        path,
        start_time.elapsed().as_millis()
    );
    Ok(records)
}

fn read_column(df: &DataFrame, col_name: &str) -> Result<Vec<Option<String>>, PolarsError> {
    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;
    let data = series
        .into_iter()
        .map(|value| value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
        .collect::<Vec<_>>();
    debug!("Column \"{col_name}\": {} values", data.len());
    Ok(data)
}

fn build_records(columns: &[Vec<Option<String>>]) -> Result<Vec<Record>, CrmError> {
    let [names, emails, statuses, logins, deals] = columns else {
        return Err(CrmError::LoadingFailed("unexpected column count".into()));
    };

    let mut records = Vec::with_capacity(names.len());
    for row in 0..names.len() {
        let required = |column: &[Option<String>], field: &str| {
            column[row]
                .clone()
                .ok_or_else(|| CrmError::InvalidRecord(format!("row {}: missing {field}", row + 1)))
        };

        let last_login = match &logins[row] {
            Some(ts) => Some(parse_timestamp(ts).map_err(|_| {
                CrmError::InvalidRecord(format!("row {}: bad lastLogin \"{ts}\"", row + 1))
            })?),
            None => None,
        };
        let deals_raw = required(deals, "deals")?;
        let deal_count = deals_raw.parse::<i64>().map_err(|_| {
            CrmError::InvalidRecord(format!("row {}: bad deals \"{deals_raw}\"", row + 1))
        })?;

        records.push(Record {
            name: required(names, "name")?,
            email: required(emails, "email")?,
            status: RecordStatus::from(statuses[row].as_deref().unwrap_or("")),
            last_login,
            deals: deal_count,
        });
    }
    trace!("Built {} records", records.len());
    Ok(records)
}

/// Accepts RFC 3339 as well as the naive datetime text polars produces when
/// casting a datetime column to string (read as UTC).
fn parse_timestamp(ts: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(ts) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(e) => ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(ts, fmt).ok())
            .map(|naive| naive.and_utc())
            .ok_or(e),
    }
}

fn detect_file_type(path: &Path) -> Result<FileType, CrmError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(CrmError::UnknownFileType),
    }
}

fn get_file_info(path: PathBuf) -> Result<(PathBuf, FileType), CrmError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => CrmError::FileNotFound,
        ErrorKind::PermissionDenied => CrmError::PermissionDenied,
        _ => CrmError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(CrmError::LoadingFailed("Not a file!".into()));
    }
    let file_type = detect_file_type(&path)?;
    Ok((path, file_type))
}

fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_dataset_spans_several_pages() {
        let records = builtin();
        assert_eq!(records.len(), BUILTIN.len());
        assert!(records.len() > 3 * crate::domain::ITEMS_PER_PAGE);
        assert!(records.iter().all(|r| !r.name.is_empty() && r.email.contains('@')));
    }

    #[test]
    fn builtin_keeps_missing_logins_empty() {
        let records = builtin();
        let noah = records.iter().find(|r| r.name == "Noah Brown").unwrap();
        assert_eq!(noah.last_login, None);
        assert_eq!(noah.status, RecordStatus::Other("Pending".into()));
        assert!(records.iter().filter(|r| r.last_login.is_some()).count() > 20);
    }

    #[test]
    fn status_round_trips_through_text() {
        assert_eq!(RecordStatus::from("Active"), RecordStatus::Active);
        assert_eq!(RecordStatus::from("Inactive"), RecordStatus::Inactive);
        assert_eq!(RecordStatus::from("Lead").to_string(), "Lead");
    }

    #[test]
    fn parses_rfc3339_and_naive_timestamps() {
        let a = parse_timestamp("2024-01-05T14:30:00Z").unwrap();
        let b = parse_timestamp("2024-01-05 14:30:00.000").unwrap();
        let c = parse_timestamp("2024-01-05T16:30:00+02:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn detects_file_types() {
        assert!(matches!(detect_file_type(Path::new("a.CSV")), Ok(FileType::CSV)));
        assert!(matches!(detect_file_type(Path::new("a.pq")), Ok(FileType::PARQUET)));
        assert!(matches!(detect_file_type(Path::new("a.feather")), Ok(FileType::ARROW)));
        assert!(matches!(detect_file_type(Path::new("a.txt")), Err(CrmError::UnknownFileType)));
    }

    #[test]
    fn loads_fixture_csv() {
        let records = load_file("tests/fixtures/contacts.csv".into()).unwrap();
        assert_eq!(records.len(), 6);
        assert_eq!(records[0].name, "Ada Lovelace");
        assert_eq!(records[0].status, RecordStatus::Active);
        assert_eq!(records[0].deals, 12);
        assert_eq!(records[2].last_login, None);
        assert_eq!(records[3].status, RecordStatus::Other("Lead".into()));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_file("tests/fixtures/does_not_exist.csv".into()).unwrap_err();
        assert!(matches!(err, CrmError::FileNotFound));
    }

    #[test]
    fn rejects_rows_with_bad_deals() {
        let columns = vec![
            vec![Some("A".to_string())],
            vec![Some("a@x.io".to_string())],
            vec![Some("Active".to_string())],
            vec![None],
            vec![Some("many".to_string())],
        ];
        assert!(matches!(build_records(&columns), Err(CrmError::InvalidRecord(_))));
    }
}
