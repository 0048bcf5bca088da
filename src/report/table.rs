//! Table geometry for ranked series.
//!
//! Heights and widths are fractions of the panel the table is drawn in.

use crate::config::TableLayoutConfig;
use crate::types::RankedSeries;
use crate::util::{format_minutes, wrap_label};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Header,
    Body,
    Total,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub kind: RowKind,
    /// One entry per column, each already split into display lines.
    pub cells: Vec<Vec<String>>,
    pub height: f64,
}

impl TableRow {
    pub fn line_count(&self) -> usize {
        self.cells.iter().map(|c| c.len().max(1)).max().unwrap_or(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub title: String,
    pub column_widths: Vec<f64>,
    pub rows: Vec<TableRow>,
}

impl TableLayout {
    pub fn body_rows(&self) -> impl Iterator<Item = &TableRow> {
        self.rows.iter().filter(|r| r.kind == RowKind::Body)
    }

    pub fn total_row(&self) -> Option<&TableRow> {
        self.rows.iter().find(|r| r.kind == RowKind::Total)
    }

    pub fn total_height(&self) -> f64 {
        self.rows.iter().map(|r| r.height).sum()
    }
}

/// Lay out the first `max_rows` entries of `series` under `headers`,
/// followed by a `Total` row summing just those entries.
pub fn layout(
    title: &str,
    series: &RankedSeries,
    headers: [&str; 2],
    max_rows: usize,
    wrap_width: usize,
    config: &TableLayoutConfig,
) -> TableLayout {
    let top = series.head(max_rows);
    let mut rows = Vec::with_capacity(top.len() + 2);
    rows.push(TableRow {
        kind: RowKind::Header,
        cells: headers.iter().map(|h| vec![h.to_string()]).collect(),
        height: config.base_height,
    });

    for (idx, entry) in top.entries.iter().enumerate() {
        let mut label = wrap_label(&entry.label, wrap_width);
        match label.first_mut() {
            Some(first) => *first = format!("{}. {}", idx + 1, first),
            None => label.push(format!("{}. ", idx + 1)),
        }
        let cells = vec![label, vec![format_minutes(Some(entry.value))]];
        rows.push(body_row(RowKind::Body, cells, config));
    }

    let total = vec![vec!["Total".to_string()], vec![format_minutes(Some(top.total()))]];
    rows.push(body_row(RowKind::Total, total, config));

    TableLayout {
        title: title.to_string(),
        column_widths: config.column_widths.clone(),
        rows,
    }
}

fn body_row(kind: RowKind, cells: Vec<Vec<String>>, config: &TableLayoutConfig) -> TableRow {
    let mut row = TableRow { kind, cells, height: 0.0 };
    row.height = config.base_height + (row.line_count() - 1) as f64 * config.line_height;
    row
}
