use crate::error::{ReportError, Result};
use crate::types::{Cell, ColumnRole, ColumnRoles, IncidentDataset, IncidentRecord};
use crate::util::{parse_date_safe, parse_f64_safe, parse_week_safe};
use csv::ReaderBuilder;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{debug, info};

/// Header cells produced by trailing delimiters.
static UNNAMED_COLUMN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(Unnamed.*)?$").expect("valid regex"));

/// Header plus raw string rows, before any typing. Placeholder columns are
/// already gone and every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub total_rows: usize,
    pub dropped_columns: Vec<String>,
    pub null_dates: usize,
    pub null_weeks: usize,
    pub null_durations: usize,
}

/// Decode file bytes: UTF-8 first, Latin-1 otherwise.
pub fn decode(bytes: &[u8]) -> Result<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.to_string()),
        Err(_) => {
            debug!("Input is not valid UTF-8, falling back to Latin-1");
            // Every byte maps to the code point of the same value.
            Ok(bytes.iter().map(|&b| b as char).collect())
        }
    }
}

/// Parse delimited text into a raw table: trimmed header names, placeholder
/// columns removed, rows padded to the header width. Cells are untouched.
pub fn read_raw(bytes: &[u8]) -> Result<RawTable> {
    let text = decode(bytes)?;
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let header_record = rdr.headers()?.clone();
    let mut keep: Vec<usize> = Vec::new();
    let mut headers: Vec<String> = Vec::new();
    for (idx, name) in header_record.iter().enumerate() {
        let name = name.trim();
        if UNNAMED_COLUMN.is_match(name) {
            continue;
        }
        keep.push(idx);
        headers.push(name.to_string());
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let row: Vec<String> = keep
            .iter()
            .map(|&i| record.get(i).unwrap_or("").to_string())
            .collect();
        rows.push(row);
    }
    Ok(RawTable { headers, rows })
}

/// Normalize raw file bytes into a typed dataset.
pub fn normalize(bytes: &[u8]) -> Result<IncidentDataset> {
    let raw = read_raw(bytes)?;
    let (dataset, report) = normalize_table(&raw);
    debug!(
        total_rows = report.total_rows,
        null_dates = report.null_dates,
        null_weeks = report.null_weeks,
        null_durations = report.null_durations,
        dropped = ?report.dropped_columns,
        "Normalized incident log"
    );
    Ok(dataset)
}

/// Type every cell of a raw table and drop columns that end up empty.
pub fn normalize_table(raw: &RawTable) -> (IncidentDataset, LoadReport) {
    let roles = ColumnRoles::resolve(&raw.headers);
    let mut report = LoadReport { total_rows: raw.rows.len(), ..LoadReport::default() };

    let mut records: Vec<IncidentRecord> = Vec::with_capacity(raw.rows.len());
    for (source_index, row) in raw.rows.iter().enumerate() {
        let cells = row
            .iter()
            .enumerate()
            .map(|(col, value)| {
                let value = value.trim();
                let role = roles.role_at(col);
                let cell = type_cell(role, value);
                if cell.is_null() && !value.is_empty() {
                    match role {
                        Some(ColumnRole::Date) => report.null_dates += 1,
                        Some(ColumnRole::Week) => report.null_weeks += 1,
                        Some(r) if r.is_duration() => report.null_durations += 1,
                        _ => {}
                    }
                }
                cell
            })
            .collect();
        records.push(IncidentRecord { source_index, cells });
    }

    let kept: Vec<usize> = (0..raw.headers.len())
        .filter(|&col| records.iter().any(|r| !r.cells[col].is_null()))
        .collect();
    report.dropped_columns = (0..raw.headers.len())
        .filter(|col| !kept.contains(col))
        .map(|col| raw.headers[col].clone())
        .collect();

    if kept.len() < raw.headers.len() {
        for record in &mut records {
            let cells = std::mem::take(&mut record.cells);
            record.cells = cells
                .into_iter()
                .enumerate()
                .filter(|(col, _)| kept.contains(col))
                .map(|(_, cell)| cell)
                .collect();
        }
    }

    let columns: Vec<String> = kept.iter().map(|&c| raw.headers[c].clone()).collect();
    // A dropped keyword column hands the description role to the next one.
    let mut roles = roles.retain(&kept);
    roles.claim_description(&columns);
    let dataset = IncidentDataset { columns, roles, records };
    (dataset, report)
}

fn type_cell(role: Option<ColumnRole>, value: &str) -> Cell {
    match role {
        Some(ColumnRole::Date) => parse_date_safe(Some(value)).map_or(Cell::Null, Cell::Date),
        Some(ColumnRole::Week) => parse_week_safe(Some(value)).map_or(Cell::Null, Cell::Week),
        Some(r) if r.is_duration() => parse_f64_safe(Some(value)).map_or(Cell::Null, Cell::Minutes),
        _ if value.is_empty() => Cell::Null,
        _ => Cell::Text(value.to_string()),
    }
}

/// Read and normalize the backing file.
pub fn load_dataset(path: &Path) -> Result<IncidentDataset> {
    if !path.exists() {
        return Err(ReportError::MissingDataFile { path: path.to_path_buf() });
    }
    let bytes = std::fs::read(path)?;
    let dataset = normalize(&bytes)?;
    info!(
        "Loaded {} records with {} columns from {}",
        dataset.len(),
        dataset.columns.len(),
        path.display()
    );
    Ok(dataset)
}
