use crate::dataset::{Dataset, Value};
use crate::notice::Notices;
use calamine::{Data, Reader, Xlsx};
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use log::{error, info, warn};
use std::io::Cursor;
use thiserror::Error;

/// Encoding used when the bytes give no evidence either way
///
/// windows-1252 is the WHATWG decoder behind the `ISO-8859-1` label.
pub const FALLBACK_ENCODING: &Encoding = WINDOWS_1252;

/// Upload formats the loader accepts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Xlsx,
}

impl FileKind {
    /// Classifies a file by its name, ignoring case
    ///
    /// # Examples
    /// ```
    /// use analyst::loader::FileKind;
    ///
    /// assert_eq!(FileKind::from_file_name("Sales.CSV"), Some(FileKind::Csv));
    /// assert_eq!(FileKind::from_file_name("q3.xlsx"), Some(FileKind::Xlsx));
    /// assert_eq!(FileKind::from_file_name("q3.xls"), None);
    /// ```
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let lower = file_name.to_lowercase();
        if lower.ends_with(".csv") {
            Some(FileKind::Csv)
        } else if lower.ends_with(".xlsx") {
            Some(FileKind::Xlsx)
        } else {
            None
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Unsupported file format. Upload a CSV or Excel (.xlsx) file.")]
    Unsupported,

    #[error("Error reading file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Error reading file: {0}")]
    Excel(#[from] calamine::XlsxError),

    #[error("Error reading file: no worksheets found in workbook")]
    NoSheets,

    #[error("Error reading file: no columns to parse from file")]
    NoColumns,

    #[error("Error reading file: expected {expected} fields in line {line}, saw {found}")]
    Ragged {
        line: u64,
        expected: usize,
        found: usize,
    },
}

/// A successfully loaded upload
#[derive(Clone, Debug, Default)]
pub struct Loaded {
    pub dataset: Dataset,
    /// Name of the text encoding used for CSV input
    pub encoding: Option<&'static str>,
}

/// Loads an upload, reporting failures through `notices`
///
/// This is the fail-soft entry point used by the pipeline: it never returns an
/// error. Unsupported names and unreadable content produce an error notice and
/// an empty [`Dataset`].
///
/// # Arguments
/// * `bytes` - Raw file content
/// * `file_name` - Original file name, used only to pick the format
/// * `notices` - Sink for user-visible messages
///
/// # Returns
/// * `Loaded` - The dataset (possibly empty) and the detected encoding
pub fn load(bytes: &[u8], file_name: &str, notices: &mut Notices) -> Loaded {
    match try_load(bytes, file_name) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Failed to load {}: {}", file_name, e);
            notices.error(e.to_string());
            Loaded::default()
        }
    }
}

/// Detect file type and load the appropriate format
///
/// # Arguments
/// * `bytes` - Raw file content
/// * `file_name` - Original file name; `.csv` and `.xlsx` are supported
///
/// # Returns
/// * `Result<Loaded, LoadError>` - The loaded data or the reason it failed
///
/// # Examples
/// ```
/// use analyst::loader::try_load;
///
/// let loaded = try_load(b"Region,Sales\nNorth,10\n", "sales.csv").unwrap();
/// assert_eq!(loaded.dataset.row_count(), 1);
/// assert!(try_load(b"", "notes.txt").is_err());
/// ```
pub fn try_load(bytes: &[u8], file_name: &str) -> Result<Loaded, LoadError> {
    info!("Loading {} ({} bytes)", file_name, bytes.len());

    let loaded = match FileKind::from_file_name(file_name) {
        Some(FileKind::Csv) => from_csv(bytes)?,
        Some(FileKind::Xlsx) => Loaded {
            dataset: from_excel(bytes)?,
            encoding: None,
        },
        None => return Err(LoadError::Unsupported),
    };

    info!(
        "Loaded {}: {} rows x {} columns",
        file_name,
        loaded.dataset.row_count(),
        loaded.dataset.column_count()
    );
    Ok(loaded)
}

/// Guesses the text encoding of raw CSV bytes
///
/// A byte order mark wins outright, then valid UTF-8. Otherwise the statistical
/// detector picks a legacy encoding. Empty input carries no evidence at all and
/// gets [`FALLBACK_ENCODING`].
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if bytes.is_empty() {
        return FALLBACK_ENCODING;
    }
    if let Some((encoding, _bom_len)) = Encoding::for_bom(bytes) {
        return encoding;
    }
    if std::str::from_utf8(bytes).is_ok() {
        return UTF_8;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, false)
}

/// Load a dataset from CSV bytes
///
/// The first record is the header. Records with fewer fields than the header
/// are padded with missing values; records with more are rejected, naming the
/// offending line.
pub fn from_csv(bytes: &[u8]) -> Result<Loaded, LoadError> {
    let encoding = detect_encoding(bytes);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!("Some bytes were not valid {}", encoding.name());
    }
    info!("Decoding CSV as {}", encoding.name());

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(LoadError::NoColumns);
    }

    let mut records: Vec<Vec<Value>> = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.len() > headers.len() {
            return Err(LoadError::Ragged {
                line: record.position().map_or(0, |p| p.line()),
                expected: headers.len(),
                found: record.len(),
            });
        }
        records.push(record.iter().map(Value::infer).collect());
    }

    Ok(Loaded {
        dataset: Dataset::from_records(headers, records),
        encoding: Some(encoding.name()),
    })
}

/// Load a dataset from the first worksheet of an XLSX workbook
///
/// The first row of the used range is the header. Whole-number floats are
/// stored as integers, dates as ISO-like text and error cells as their
/// spreadsheet code (for example `#DIV/0!`).
pub fn from_excel(bytes: &[u8]) -> Result<Dataset, LoadError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(LoadError::NoSheets)?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let header_row = rows.next().ok_or(LoadError::NoColumns)?;
    let headers: Vec<String> = header_row.iter().map(header_text).collect();

    let records: Vec<Vec<Value>> = rows
        .map(|row| row.iter().map(cell_value).collect())
        .collect();

    Ok(Dataset::from_records(headers, records))
}

fn header_text(cell: &Data) -> String {
    match cell_value(cell) {
        Value::Null => String::new(),
        value => value.to_string(),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::Int(*i),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                Value::Int(*f as i64)
            } else {
                Value::Float(*f)
            }
        }
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => Value::Text(s.clone()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => Value::Text(naive.to_string()),
            None => Value::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(e) => Value::Text(e.to_string()),
    }
}
