use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tabled::Tabled;

/// What a header column means to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnRole {
    Date,
    Week,
    Shift,
    Area,
    Class,
    Description,
    Operator,
    Originator,
    WaitTime,
    ResolutionTime,
    Downtime,
    ItDowntime,
}

impl ColumnRole {
    /// Roles matched by exact (case-insensitive) header name.
    pub const FIXED: [ColumnRole; 11] = [
        ColumnRole::Date,
        ColumnRole::Week,
        ColumnRole::Shift,
        ColumnRole::Area,
        ColumnRole::Class,
        ColumnRole::Operator,
        ColumnRole::Originator,
        ColumnRole::WaitTime,
        ColumnRole::ResolutionTime,
        ColumnRole::Downtime,
        ColumnRole::ItDowntime,
    ];

    /// Accepted header spellings, upper case.
    pub fn header_names(self) -> &'static [&'static str] {
        match self {
            ColumnRole::Date => &["FECHA", "DATE"],
            ColumnRole::Week => &["WEEK#", "WEEK"],
            ColumnRole::Shift => &["SHIFT"],
            ColumnRole::Area => &["AREA"],
            ColumnRole::Class => &["CLASS"],
            ColumnRole::Operator => &["NOMBRE OPERADOR / USUARIOS"],
            ColumnRole::Originator => &["ORIGINADOR"],
            ColumnRole::WaitTime => &["T. ESPERA"],
            ColumnRole::ResolutionTime => &["T. SOLUCION"],
            ColumnRole::Downtime => &["T. MUERTO"],
            ColumnRole::ItDowntime => &["T. MUERTO TI"],
            ColumnRole::Description => &[],
        }
    }

    /// Canonical header written when a column has to be created.
    pub fn canonical_header(self) -> &'static str {
        match self {
            ColumnRole::Description => "PROBLEM DESCRIPTION/SOLUTION",
            other => other.header_names()[0],
        }
    }

    pub fn is_duration(self) -> bool {
        matches!(
            self,
            ColumnRole::WaitTime
                | ColumnRole::ResolutionTime
                | ColumnRole::Downtime
                | ColumnRole::ItDowntime
        )
    }
}

/// Substrings that identify the free-text description column.
pub const DESCRIPTION_KEYWORDS: [&str; 4] = ["EVENT", "PROBLEM", "DESCRIPCION", "DESCRIPCIÓN"];

/// Column vocabulary used when the store has no header yet.
pub const DEFAULT_COLUMNS: [&str; 12] = [
    "FECHA",
    "SHIFT",
    "PROBLEM DESCRIPTION/SOLUTION",
    "NOMBRE OPERADOR / USUARIOS",
    "CLASS",
    "AREA",
    "WEEK#",
    "T. ESPERA",
    "T. SOLUCION",
    "T. MUERTO",
    "T. MUERTO TI",
    "ORIGINADOR",
];

/// Role -> column index, resolved once per header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnRoles {
    slots: Vec<(ColumnRole, usize)>,
}

impl ColumnRoles {
    /// Resolve roles against trimmed header names.
    ///
    /// Fixed roles are claimed first; the description role then goes to the
    /// first unclaimed column, in header order, containing a keyword.
    pub fn resolve<S: AsRef<str>>(headers: &[S]) -> Self {
        let upper: Vec<String> = headers.iter().map(|h| h.as_ref().trim().to_uppercase()).collect();
        let mut slots: Vec<(ColumnRole, usize)> = Vec::new();
        for role in ColumnRole::FIXED {
            let found = upper.iter().enumerate().find(|(idx, name)| {
                role.header_names().contains(&name.as_str()) && !slots.iter().any(|(_, i)| i == idx)
            });
            if let Some((idx, _)) = found {
                slots.push((role, idx));
            }
        }
        let mut roles = ColumnRoles { slots };
        roles.claim_description(headers);
        roles
    }

    /// Give the description role to the first unclaimed column whose name
    /// contains a keyword. No-op when the role is already assigned.
    pub fn claim_description<S: AsRef<str>>(&mut self, headers: &[S]) {
        if self.index_of(ColumnRole::Description).is_some() {
            return;
        }
        let found = (0..headers.len()).find(|&idx| {
            let name = headers[idx].as_ref().trim().to_uppercase();
            self.role_at(idx).is_none() && DESCRIPTION_KEYWORDS.iter().any(|k| name.contains(k))
        });
        if let Some(idx) = found {
            self.slots.push((ColumnRole::Description, idx));
        }
        self.slots.sort();
    }

    pub fn index_of(&self, role: ColumnRole) -> Option<usize> {
        self.slots.iter().find(|(r, _)| *r == role).map(|(_, i)| *i)
    }

    pub fn role_at(&self, index: usize) -> Option<ColumnRole> {
        self.slots.iter().find(|(_, i)| *i == index).map(|(r, _)| *r)
    }

    /// Re-map indices after columns were dropped. `kept` lists surviving
    /// old indices in order.
    pub fn retain(&self, kept: &[usize]) -> Self {
        let slots = self
            .slots
            .iter()
            .filter_map(|(role, old)| kept.iter().position(|k| k == old).map(|new| (*role, new)))
            .collect();
        ColumnRoles { slots }
    }
}

/// One typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Week(u32),
    Minutes(f64),
    Date(NaiveDate),
    Null,
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Text(s) => serde_json::Value::from(s.as_str()),
            Cell::Week(w) => serde_json::Value::from(*w),
            Cell::Minutes(m) => serde_json::Value::from(*m),
            Cell::Date(d) => serde_json::Value::from(d.format("%Y-%m-%d").to_string()),
            Cell::Null => serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncidentRecord {
    /// Zero-based data-row position in the backing file.
    pub source_index: usize,
    pub cells: Vec<Cell>,
}

/// Normalized log: declared columns, their roles, typed records.
///
/// Every record holds exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentDataset {
    pub columns: Vec<String>,
    pub roles: ColumnRoles,
    pub records: Vec<IncidentRecord>,
}

impl IncidentDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_role(&self, role: ColumnRole) -> bool {
        self.roles.index_of(role).is_some()
    }

    pub fn column_name(&self, role: ColumnRole) -> Option<&str> {
        self.roles.index_of(role).map(|i| self.columns[i].as_str())
    }

    /// Same columns, subset of records.
    pub fn with_records(&self, records: Vec<IncidentRecord>) -> Self {
        IncidentDataset {
            columns: self.columns.clone(),
            roles: self.roles.clone(),
            records,
        }
    }
}

impl IncidentRecord {
    fn cell(&self, roles: &ColumnRoles, role: ColumnRole) -> Option<&Cell> {
        roles.index_of(role).and_then(|i| self.cells.get(i))
    }

    pub fn date(&self, roles: &ColumnRoles) -> Option<NaiveDate> {
        match self.cell(roles, ColumnRole::Date) {
            Some(Cell::Date(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn week(&self, roles: &ColumnRoles) -> Option<u32> {
        match self.cell(roles, ColumnRole::Week) {
            Some(Cell::Week(w)) => Some(*w),
            _ => None,
        }
    }

    pub fn text(&self, roles: &ColumnRoles, role: ColumnRole) -> Option<&str> {
        match self.cell(roles, role) {
            Some(Cell::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn minutes(&self, roles: &ColumnRoles, role: ColumnRole) -> Option<f64> {
        match self.cell(roles, role) {
            Some(Cell::Minutes(m)) => Some(*m),
            _ => None,
        }
    }

    pub fn month(&self, roles: &ColumnRoles) -> Option<YearMonth> {
        self.date(roles).map(YearMonth::from_date)
    }
}

/// Calendar month bucket, printed as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn from_date(d: NaiveDate) -> Self {
        YearMonth { year: d.year(), month: d.month() }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let (y, m) = s.trim().split_once('-')?;
        let year = y.parse::<i32>().ok()?;
        let month = m.parse::<u32>().ok()?;
        (1..=12).contains(&month).then_some(YearMonth { year, month })
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Conjunctive row filter; empty sets impose nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub weeks: BTreeSet<u32>,
    pub years: BTreeSet<i32>,
    pub months: BTreeSet<String>,
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty() && self.years.is_empty() && self.months.is_empty()
    }
}

/// Text column to group rows by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Area,
    Class,
    Shift,
    Description,
}

impl GroupKey {
    pub fn role(self) -> ColumnRole {
        match self {
            GroupKey::Area => ColumnRole::Area,
            GroupKey::Class => ColumnRole::Class,
            GroupKey::Shift => ColumnRole::Shift,
            GroupKey::Description => ColumnRole::Description,
        }
    }
}

/// Duration column to aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKey {
    Downtime,
    ItDowntime,
    WaitTime,
    ResolutionTime,
}

impl ValueKey {
    pub fn role(self) -> ColumnRole {
        match self {
            ValueKey::Downtime => ColumnRole::Downtime,
            ValueKey::ItDowntime => ColumnRole::ItDowntime,
            ValueKey::WaitTime => ColumnRole::WaitTime,
            ValueKey::ResolutionTime => ColumnRole::ResolutionTime,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Sum,
    Max,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketKey {
    Week,
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    Week(u32),
    Month(YearMonth),
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Week(w) => write!(f, "{}", w),
            Bucket::Month(m) => write!(f, "{}", m),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct RankedEntry {
    #[tabled(rename = "Label")]
    pub label: String,
    #[tabled(rename = "Value")]
    pub value: f64,
}

/// Descending (label, value) pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedSeries {
    pub entries: Vec<RankedEntry>,
}

impl RankedSeries {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn head(&self, n: usize) -> RankedSeries {
        RankedSeries { entries: self.entries.iter().take(n).cloned().collect() }
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.label.clone()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.value).collect()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.value).sum()
    }
}

/// Ascending (bucket, value) pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeBucketSeries {
    pub points: Vec<(Bucket, f64)>,
}

impl TimeBucketSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn keys(&self) -> Vec<Bucket> {
        self.points.iter().map(|(b, _)| *b).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }
}

/// Payload for a new log entry. Fields are kept as text; JSON numbers are
/// accepted and stringified so validation sees one shape.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NewEntry {
    #[serde(default, deserialize_with = "lenient_text")]
    pub fecha: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub class: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub area: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub t_espera: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub t_solucion: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub descripcion: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub shift: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub operador: String,
    #[serde(default, deserialize_with = "lenient_optional_text")]
    pub t_muerto_ti: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub originador: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Int(i64),
    Float(f64),
}

impl TextOrNumber {
    fn into_text(self) -> String {
        match self {
            TextOrNumber::Text(s) => s,
            TextOrNumber::Int(i) => i.to_string(),
            TextOrNumber::Float(f) => f.to_string(),
        }
    }
}

fn lenient_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<TextOrNumber>::deserialize(deserializer)?.map(TextOrNumber::into_text))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_optional_text(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_roles_fixed_and_description() {
        let headers = [
            "FECHA",
            "SHIFT",
            "PROBLEM DESCRIPTION/SOLUTION",
            "CLASS",
            "AREA",
            "WEEK#",
            "T. MUERTO",
            "T. MUERTO TI",
        ];
        let roles = ColumnRoles::resolve(&headers);
        assert_eq!(roles.index_of(ColumnRole::Date), Some(0));
        assert_eq!(roles.index_of(ColumnRole::Description), Some(2));
        assert_eq!(roles.index_of(ColumnRole::Week), Some(5));
        assert_eq!(roles.index_of(ColumnRole::Downtime), Some(6));
        assert_eq!(roles.index_of(ColumnRole::ItDowntime), Some(7));
        assert_eq!(roles.index_of(ColumnRole::WaitTime), None);
    }

    #[test]
    fn test_description_first_match_in_header_order() {
        let headers = ["Event Type", "Problem Description", "area"];
        let roles = ColumnRoles::resolve(&headers);
        assert_eq!(roles.index_of(ColumnRole::Description), Some(0));
        assert_eq!(roles.index_of(ColumnRole::Area), Some(2));
    }

    #[test]
    fn test_retain_remaps_indices() {
        let roles = ColumnRoles::resolve(&["FECHA", "NOTES", "AREA"]);
        let kept = roles.retain(&[0, 2]);
        assert_eq!(kept.index_of(ColumnRole::Date), Some(0));
        assert_eq!(kept.index_of(ColumnRole::Area), Some(1));
        assert_eq!(kept.role_at(1), Some(ColumnRole::Area));
    }

    #[test]
    fn test_year_month_parse_and_display() {
        let ym = YearMonth::parse("2024-07").unwrap();
        assert_eq!(ym, YearMonth { year: 2024, month: 7 });
        assert_eq!(ym.to_string(), "2024-07");
        assert!(YearMonth::parse("2024-13").is_none());
        assert!(YearMonth::parse("July").is_none());
    }

    #[test]
    fn test_bucket_ordering() {
        let mut buckets = vec![
            Bucket::Month(YearMonth { year: 2024, month: 2 }),
            Bucket::Month(YearMonth { year: 2023, month: 12 }),
        ];
        buckets.sort();
        assert_eq!(buckets[0].to_string(), "2023-12");
    }
}
