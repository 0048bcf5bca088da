//! Flat-file record store.
//!
//! The only write primitive is "read the whole file, compute the new
//! content, replace the whole file". There is no locking: two writers
//! racing each other can lose one another's update. The replacement goes
//! through a temporary file and a rename, so a failed write leaves the old
//! file byte-identical.

use crate::error::{ReportError, Result};
use crate::loader::{load_dataset, read_raw, RawTable};
use crate::types::{ColumnRole, ColumnRoles, IncidentDataset, NewEntry, DEFAULT_COLUMNS};
use crate::util::{format_decimal, parse_entry_date};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

/// Storage collaborator behind every query, report and edit.
///
/// Implementations offer no isolation: concurrent `append_one` and
/// `delete_by_positions` calls may interleave and lose updates.
pub trait RecordStore {
    fn load_all(&self) -> Result<IncidentDataset>;
    fn append_one(&self, entry: &NewEntry) -> Result<()>;
    /// Remove rows by zero-based data-row position. Returns how many rows
    /// were removed.
    fn delete_by_positions(&self, positions: &[i64]) -> Result<usize>;
}

pub struct CsvFileStore {
    path: PathBuf,
}

/// A validated entry, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEntry {
    pub date: NaiveDate,
    pub class: String,
    pub area: String,
    pub description: String,
    pub shift: String,
    pub operator: String,
    pub originator: String,
    pub wait_time: f64,
    pub resolution_time: f64,
    pub it_downtime: Option<f64>,
}

impl ValidatedEntry {
    pub fn downtime(&self) -> f64 {
        self.wait_time + self.resolution_time
    }

    pub fn iso_week(&self) -> u32 {
        self.date.iso_week().week()
    }
}

/// Check a payload and convert its fields.
pub fn validate_entry(entry: &NewEntry) -> Result<ValidatedEntry> {
    let required = [
        (&entry.fecha, "date"),
        (&entry.class, "class"),
        (&entry.area, "area"),
        (&entry.t_espera, "wait time"),
        (&entry.t_solucion, "resolution time"),
        (&entry.descripcion, "event description"),
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|(value, _)| value.trim().is_empty())
        .map(|(_, label)| *label)
        .collect();
    if !missing.is_empty() {
        return Err(ReportError::Validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )));
    }

    let date = parse_entry_date(&entry.fecha).ok_or_else(|| {
        ReportError::Validation("invalid date format, use YYYY-MM-DD".to_string())
    })?;
    let wait_time = parse_duration(&entry.t_espera, "wait time")?;
    let resolution_time = parse_duration(&entry.t_solucion, "resolution time")?;
    if wait_time < 0.0 || resolution_time < 0.0 {
        return Err(ReportError::Validation(
            "wait and resolution times must be positive".to_string(),
        ));
    }
    let it_downtime = match entry.t_muerto_ti.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_duration(raw, "IT downtime")?),
    };

    Ok(ValidatedEntry {
        date,
        class: entry.class.trim().to_string(),
        area: entry.area.trim().to_string(),
        description: entry.descripcion.trim().to_string(),
        shift: entry.shift.trim().to_string(),
        operator: entry.operador.trim().to_string(),
        originator: entry.originador.trim().to_string(),
        wait_time,
        resolution_time,
        it_downtime,
    })
}

/// Durations accept a comma as decimal separator.
fn parse_duration(raw: &str, label: &str) -> Result<f64> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ReportError::Validation(format!("{} must be numeric", label)))
}

/// Append `entry` to `table`, adding any core column the header lacks.
pub fn append_row(table: &mut RawTable, entry: &ValidatedEntry) {
    if table.headers.is_empty() {
        table.headers = DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect();
    }
    let mut roles = ColumnRoles::resolve(&table.headers);
    for role in [
        ColumnRole::Date,
        ColumnRole::Class,
        ColumnRole::Area,
        ColumnRole::Week,
        ColumnRole::Downtime,
    ] {
        if roles.index_of(role).is_none() {
            table.headers.push(role.canonical_header().to_string());
            for row in &mut table.rows {
                row.push(String::new());
            }
            roles = ColumnRoles::resolve(&table.headers);
        }
    }

    let mut row = vec![String::new(); table.headers.len()];
    let mut set = |role: ColumnRole, value: String| {
        if let Some(i) = roles.index_of(role) {
            row[i] = value;
        }
    };
    set(ColumnRole::Date, entry.date.format("%m/%d/%Y").to_string());
    set(ColumnRole::Shift, entry.shift.clone());
    set(ColumnRole::Description, entry.description.clone());
    set(ColumnRole::Operator, entry.operator.clone());
    set(ColumnRole::Class, entry.class.clone());
    set(ColumnRole::Area, entry.area.clone());
    set(ColumnRole::Week, entry.iso_week().to_string());
    set(ColumnRole::WaitTime, format_decimal(entry.wait_time));
    set(ColumnRole::ResolutionTime, format_decimal(entry.resolution_time));
    set(ColumnRole::Downtime, format_decimal(entry.downtime()));
    set(ColumnRole::ItDowntime, entry.it_downtime.map(format_decimal).unwrap_or_default());
    set(ColumnRole::Originator, entry.originator.clone());
    table.rows.push(row);
}

/// Remove rows by position. All positions are checked before anything is
/// removed.
pub fn remove_rows(table: &mut RawTable, positions: &[i64]) -> Result<usize> {
    if positions.is_empty() {
        return Err(ReportError::Validation(
            "a list of row positions to delete is required".to_string(),
        ));
    }
    let row_count = table.rows.len() as i64;
    let invalid: Vec<i64> = positions
        .iter()
        .copied()
        .filter(|&p| p < 0 || p >= row_count)
        .collect();
    if !invalid.is_empty() {
        return Err(ReportError::IndexOutOfRange { indices: invalid });
    }
    let doomed: BTreeSet<usize> = positions.iter().map(|&p| p as usize).collect();
    let rows = std::mem::take(&mut table.rows);
    table.rows = rows
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !doomed.contains(i))
        .map(|(_, row)| row)
        .collect();
    Ok(doomed.len())
}

impl CsvFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(&self) -> Result<RawTable> {
        if !self.path.exists() {
            return Err(ReportError::MissingDataFile { path: self.path.clone() });
        }
        let bytes = std::fs::read(&self.path)?;
        read_raw(&bytes)
    }

    /// Replace the file with `table`, UTF-8 encoded.
    fn write_table(&self, table: &RawTable) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut wtr = csv::Writer::from_writer(&mut tmp);
            wtr.write_record(&table.headers)?;
            for row in &table.rows {
                wtr.write_record(row)?;
            }
            wtr.flush()?;
        }
        tmp.as_file_mut().flush()?;
        tmp.persist(&self.path).map_err(|e| ReportError::Io(e.error))?;
        Ok(())
    }
}

impl RecordStore for CsvFileStore {
    fn load_all(&self) -> Result<IncidentDataset> {
        load_dataset(&self.path)
    }

    fn append_one(&self, entry: &NewEntry) -> Result<()> {
        let entry = validate_entry(entry)?;
        let mut table = self.read_table()?;
        append_row(&mut table, &entry);
        self.write_table(&table)?;
        info!(
            "Appended entry for {} (week {}, {} min downtime) to {}",
            entry.date,
            entry.iso_week(),
            format_decimal(entry.downtime()),
            self.path.display()
        );
        Ok(())
    }

    fn delete_by_positions(&self, positions: &[i64]) -> Result<usize> {
        let mut table = self.read_table()?;
        let removed = remove_rows(&mut table, positions)?;
        self.write_table(&table)?;
        info!("Deleted {} rows from {}", removed, self.path.display());
        Ok(removed)
    }
}
