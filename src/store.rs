//! Append-only customer table persisted as CSV.
//!
//! The table's first column is a row index; the remaining headers must all be
//! known [`Column`]s. Loads are tolerant: a malformed row is skipped with a
//! warning and an unparseable numeric cell becomes a missing value. Appends
//! are serialized through a single writer lock, and a load snapshots the file
//! under the same lock, so it never observes a row appended after it began.

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info, warn};

use crate::catalog::SegmentLabel;
use crate::encoder::ESCAPE;
use crate::error::{AggregationError, LoadError, PersistenceError, RowParseWarning};
use crate::record::{Column, CustomerRecord};

/// One historical row. Any cell may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Row {
    pub index: Option<u64>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub item_purchased: Option<String>,
    pub category: Option<String>,
    pub purchase_amount: Option<f64>,
    pub location: Option<String>,
    pub color: Option<String>,
    pub season: Option<String>,
    pub review_rating: Option<f64>,
    pub previous_purchases: Option<u32>,
    pub preferred_payment_method: Option<String>,
    pub frequency: Option<String>,
    pub label: Option<SegmentLabel>,
}

impl Row {
    /// Value of a numeric column, `None` when missing or not numeric.
    pub fn numeric(&self, column: Column) -> Option<f64> {
        match column {
            Column::Age => self.age.map(f64::from),
            Column::PurchaseAmount => self.purchase_amount,
            Column::ReviewRating => self.review_rating,
            Column::PreviousPurchases => self.previous_purchases.map(f64::from),
            _ => None,
        }
    }

    /// Value of a categorical column, `None` when missing or not categorical.
    pub fn text(&self, column: Column) -> Option<&str> {
        let value = match column {
            Column::Gender => &self.gender,
            Column::ItemPurchased => &self.item_purchased,
            Column::Category => &self.category,
            Column::Location => &self.location,
            Column::Color => &self.color,
            Column::Season => &self.season,
            Column::PreferredPaymentMethod => &self.preferred_payment_method,
            Column::Frequency => &self.frequency,
            _ => return None,
        };
        value.as_deref()
    }

    fn text_mut(&mut self, column: Column) -> Option<&mut Option<String>> {
        match column {
            Column::Gender => Some(&mut self.gender),
            Column::ItemPurchased => Some(&mut self.item_purchased),
            Column::Category => Some(&mut self.category),
            Column::Location => Some(&mut self.location),
            Column::Color => Some(&mut self.color),
            Column::Season => Some(&mut self.season),
            Column::PreferredPaymentMethod => Some(&mut self.preferred_payment_method),
            Column::Frequency => Some(&mut self.frequency),
            _ => None,
        }
    }
}

/// Rows in file order, plus the column set the source table declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: Vec<Row>,
    warnings: Vec<RowParseWarning>,
}

impl Dataset {
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            warnings: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows skipped while loading.
    pub fn warnings(&self) -> &[RowParseWarning] {
        &self.warnings
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn require(&self, column: Column) -> Result<(), AggregationError> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(AggregationError::MissingColumn(column))
        }
    }
}

#[derive(Debug, Clone)]
struct Layout {
    columns: Vec<Column>,
    next_index: u64,
}

/// Single-file append-only store.
#[derive(Debug)]
pub struct DatasetStore {
    path: PathBuf,
    writer: Mutex<Option<Layout>>,
}

impl DatasetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the whole table with row-level tolerance.
    ///
    /// # Errors
    ///
    /// [`LoadError`] when the file is missing, its header is unusable, or
    /// every data row is malformed.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Dataset, LoadError> {
        let bytes = {
            let _snapshot = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            if !self.path.exists() {
                return Err(LoadError::Missing(self.path.clone()));
            }
            std::fs::read(&self.path)?
        };

        let dataset = parse_dataset(&bytes)?;
        info!(
            rows = dataset.len(),
            skipped = dataset.warnings.len(),
            "Dataset loaded"
        );
        Ok(dataset)
    }

    /// Appends one labelled record at the end of the table.
    ///
    /// Creates the file with the canonical header if it does not exist. On
    /// error the file is truncated back to its previous length, and the record
    /// must be treated as not stored.
    #[tracing::instrument(skip_all, fields(path = %self.path.display(), label = label.value()))]
    pub fn append(&self, record: &CustomerRecord, label: SegmentLabel) -> Result<(), PersistenceError> {
        let mut state = self.writer.lock().map_err(|_| PersistenceError::Poisoned)?;

        let layout = match state.take() {
            Some(layout) => layout,
            None => self.prepare_layout()?,
        };

        let mut file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        commit(&mut file, |file| write_row(file, &layout, record, label))?;

        debug!(index = layout.next_index, "Row appended");
        *state = Some(Layout {
            next_index: layout.next_index + 1,
            ..layout
        });
        Ok(())
    }

    fn prepare_layout(&self) -> Result<Layout, PersistenceError> {
        if !self.path.exists() {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.path)?;
            let mut writer = writer_builder().from_writer(file);
            let mut header = vec![""];
            header.extend(Column::SCHEMA.iter().map(|c| c.header()));
            writer.write_record(&header)?;
            writer.flush()?;
            info!(path = %self.path.display(), "Created dataset file");

            return Ok(Layout {
                columns: Column::SCHEMA.to_vec(),
                next_index: 0,
            });
        }

        let bytes = std::fs::read(&self.path)?;
        let mut reader = reader_builder().from_reader(bytes.as_slice());
        let headers = reader.headers()?.clone();
        let columns =
            parse_header(&headers).map_err(|err| PersistenceError::Header(err.to_string()))?;

        let mut count = 0u64;
        let mut max_index = None;
        let mut record = StringRecord::new();
        while reader.read_record(&mut record)? {
            count += 1;
            if let Some(index) = record.get(0).and_then(|v| v.parse::<u64>().ok()) {
                max_index = Some(max_index.map_or(index, |m: u64| m.max(index)));
            }
        }

        Ok(Layout {
            columns,
            next_index: max_index.map_or(count, |m| (m + 1).max(count)),
        })
    }
}

fn reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder
        .has_headers(true)
        .flexible(true)
        .quote(b'"')
        .escape(Some(ESCAPE as u8))
        .trim(Trim::All);
    builder
}

fn writer_builder() -> WriterBuilder {
    let mut builder = WriterBuilder::new();
    builder
        .has_headers(false)
        .quote(b'"')
        .escape(ESCAPE as u8)
        .double_quote(false);
    builder
}

/// Runs `write` against `file`, truncating it back to its previous length if
/// the write fails. The cached layout is dropped by the caller on any error,
/// so the next append re-reads the table.
fn commit<F>(file: &mut File, write: F) -> Result<(), PersistenceError>
where
    F: FnOnce(&mut File) -> Result<(), PersistenceError>,
{
    let original_len = file.metadata()?.len();
    write(file).inspect_err(|err| {
        warn!(error = %err, "Append failed, rolling back");
        if let Err(truncate_err) = file.set_len(original_len) {
            error!(error = %truncate_err, "Rollback truncate failed");
        }
    })
}

fn write_row(
    file: &mut File,
    layout: &Layout,
    record: &CustomerRecord,
    label: SegmentLabel,
) -> Result<(), PersistenceError> {
    if file.metadata()?.len() > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            file.write_all(b"\n")?;
        }
    }

    let mut fields = Vec::with_capacity(layout.columns.len() + 1);
    fields.push(layout.next_index.to_string());
    for &column in &layout.columns {
        let cell = match column {
            Column::Cluster => Some(label.to_string()),
            other => record.cell(other),
        };
        fields.push(cell.unwrap_or_default());
    }

    let mut writer = writer_builder().from_writer(&mut *file);
    writer.write_record(&fields)?;
    writer.flush()?;
    drop(writer);

    file.sync_data()?;
    Ok(())
}

/// Header names accepted for the leading row-index column.
const INDEX_HEADERS: [&str; 3] = ["", "index", "Unnamed: 0"];

/// Maps the header (after the index column) onto known columns.
fn parse_header(headers: &StringRecord) -> Result<Vec<Column>, LoadError> {
    let Some(first) = headers.get(0) else {
        return Err(LoadError::Header("file is empty".to_string()));
    };
    if !INDEX_HEADERS.contains(&first) {
        return Err(LoadError::Header(format!(
            "first column must be the row index, found `{first}`"
        )));
    }

    let mut columns = Vec::with_capacity(headers.len().saturating_sub(1));
    for name in headers.iter().skip(1) {
        let column =
            Column::from_header(name).ok_or_else(|| LoadError::UnknownColumn(name.to_string()))?;
        if columns.contains(&column) {
            return Err(LoadError::DuplicateColumn(name.to_string()));
        }
        columns.push(column);
    }
    Ok(columns)
}

fn parse_dataset(bytes: &[u8]) -> Result<Dataset, LoadError> {
    let mut reader = reader_builder().from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|err| LoadError::Header(err.to_string()))?
        .clone();
    let columns = parse_header(&headers)?;

    let mut rows = Vec::new();
    let mut warnings = Vec::new();
    let mut total = 0usize;
    let mut record = StringRecord::new();

    loop {
        let line = reader.position().line();
        match reader.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {
                total += 1;
                match parse_row(&record, &columns, line) {
                    Ok(row) => rows.push(row),
                    Err(reason) => {
                        warn!(line, reason = %reason, "Skipping malformed row");
                        warnings.push(RowParseWarning { line, reason });
                    }
                }
            }
            Err(err) if err.is_io_error() => return Err(read_error(err)),
            Err(err) => {
                total += 1;
                let reason = err.to_string();
                warn!(line, reason = %reason, "Skipping unreadable row");
                warnings.push(RowParseWarning { line, reason });
            }
        }
    }

    if total > 0 && rows.is_empty() {
        return Err(LoadError::Unparseable(total));
    }

    Ok(Dataset {
        columns,
        rows,
        warnings,
    })
}

fn read_error(err: csv::Error) -> LoadError {
    match err.into_kind() {
        csv::ErrorKind::Io(io) => LoadError::Io(io),
        other => LoadError::Header(format!("{other:?}")),
    }
}

fn parse_row(record: &StringRecord, columns: &[Column], line: u64) -> Result<Row, String> {
    if record.len() != columns.len() + 1 {
        return Err(format!(
            "expected {} fields, found {}",
            columns.len() + 1,
            record.len()
        ));
    }

    let mut row = Row {
        index: record.get(0).and_then(|v| v.parse().ok()),
        ..Row::default()
    };

    for (&column, cell) in columns.iter().zip(record.iter().skip(1)) {
        if cell.is_empty() {
            continue;
        }
        match column {
            Column::Age => row.age = coerce(cell, line, column).and_then(whole),
            Column::PreviousPurchases => {
                row.previous_purchases = coerce(cell, line, column).and_then(whole)
            }
            Column::PurchaseAmount => row.purchase_amount = coerce(cell, line, column),
            Column::ReviewRating => row.review_rating = coerce(cell, line, column),
            Column::Cluster => {
                row.label = coerce(cell, line, column)
                    .filter(|v| v.fract() == 0.0 && (0.0..=f64::from(u8::MAX)).contains(v))
                    .map(|v| SegmentLabel::new(v as u8));
            }
            text => {
                let value = text
                    .canonicalize(cell)
                    .map(str::to_string)
                    .unwrap_or_else(|| cell.to_string());
                if let Some(slot) = row.text_mut(text) {
                    *slot = Some(value);
                }
            }
        }
    }

    Ok(row)
}

/// Parses a numeric cell; anything non-finite or unparseable becomes missing.
fn coerce(cell: &str, line: u64, column: Column) -> Option<f64> {
    match cell.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            debug!(line, column = %column, value = cell, "Coerced numeric cell to missing");
            None
        }
    }
}

fn whole(value: f64) -> Option<u32> {
    (value.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&value)).then_some(value as u32)
}
