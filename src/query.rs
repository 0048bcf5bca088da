//! Statistics served to the dashboard: ranked top-N lists, time buckets,
//! the metadata listing and the raw row listing.

use crate::aggregate::{bucket, distinct_months, distinct_text, distinct_weeks, distinct_years, rank};
use crate::types::{
    Aggregation, Bucket, BucketKey, ColumnRole, FilterSpec, GroupKey, IncidentDataset,
    RankedEntry, ValueKey,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tabled::Tabled;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Statistic {
    TopByEvent,
    TopByClass,
    TopByArea,
    DowntimePerWeek,
    FrequencyPerMonth,
    DowntimePerMonth,
}

#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pub filter: FilterSpec,
    pub top: Option<i64>,
    pub agg: Aggregation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedOutput {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketOutput {
    /// Week numbers or `YYYY-MM` strings.
    pub keys: Vec<Value>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    Ranked(RankedOutput),
    Buckets(BucketOutput),
}

#[derive(Debug, Clone, Tabled)]
pub struct BucketRow {
    #[tabled(rename = "Bucket")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: f64,
}

impl QueryOutput {
    pub fn is_empty(&self) -> bool {
        match self {
            QueryOutput::Ranked(r) => r.labels.is_empty(),
            QueryOutput::Buckets(b) => b.keys.is_empty(),
        }
    }

    pub fn ranked_rows(&self) -> Vec<RankedEntry> {
        match self {
            QueryOutput::Ranked(r) => r
                .labels
                .iter()
                .zip(&r.values)
                .map(|(label, value)| RankedEntry { label: label.clone(), value: *value })
                .collect(),
            QueryOutput::Buckets(_) => Vec::new(),
        }
    }

    pub fn bucket_rows(&self) -> Vec<BucketRow> {
        match self {
            QueryOutput::Buckets(b) => b
                .keys
                .iter()
                .zip(&b.values)
                .map(|(key, value)| BucketRow {
                    key: match key {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    },
                    value: *value,
                })
                .collect(),
            QueryOutput::Ranked(_) => Vec::new(),
        }
    }
}

/// Ranked statistics default to the top 3.
const DEFAULT_TOP: i64 = 3;

pub fn run(data: &IncidentDataset, statistic: Statistic, params: &QueryParams) -> QueryOutput {
    let top = Some(params.top.unwrap_or(DEFAULT_TOP));
    let ranked = |group: GroupKey| {
        let series = rank(data, group, ValueKey::Downtime, &params.filter, params.agg, top);
        QueryOutput::Ranked(RankedOutput { labels: series.labels(), values: series.values() })
    };
    let bucketed = |key: BucketKey, value: Option<ValueKey>| {
        let series = bucket(data, key, value, &params.filter);
        QueryOutput::Buckets(BucketOutput {
            keys: series
                .keys()
                .into_iter()
                .map(|b| match b {
                    Bucket::Week(w) => Value::from(w),
                    Bucket::Month(m) => Value::from(m.to_string()),
                })
                .collect(),
            values: series.values(),
        })
    };
    match statistic {
        Statistic::TopByEvent => ranked(GroupKey::Description),
        Statistic::TopByClass => ranked(GroupKey::Class),
        Statistic::TopByArea => ranked(GroupKey::Area),
        Statistic::DowntimePerWeek => bucketed(BucketKey::Week, Some(ValueKey::Downtime)),
        Statistic::FrequencyPerMonth => bucketed(BucketKey::Month, None),
        Statistic::DowntimePerMonth => bucketed(BucketKey::Month, Some(ValueKey::ItDowntime)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Meta {
    pub weeks: Vec<u32>,
    pub areas: Vec<String>,
    pub months: Vec<String>,
    pub years: Vec<i32>,
    pub classes: Vec<String>,
}

pub fn meta(data: &IncidentDataset) -> Meta {
    Meta {
        weeks: distinct_weeks(data),
        areas: distinct_text(data, ColumnRole::Area),
        months: distinct_months(data).iter().map(|m| m.to_string()).collect(),
        years: distinct_years(data),
        classes: distinct_text(data, ColumnRole::Class),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataListing {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

/// Every row as a JSON object, tagged with its `_csvIndex` file position.
pub fn listing(data: &IncidentDataset, limit: Option<usize>) -> DataListing {
    let rows = data
        .records
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|r| {
            let mut row: Map<String, Value> = data
                .columns
                .iter()
                .zip(&r.cells)
                .map(|(name, cell)| (name.clone(), cell.to_json()))
                .collect();
            row.insert("_csvIndex".to_string(), Value::from(r.source_index));
            row
        })
        .collect();
    DataListing { columns: data.columns.clone(), rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::normalize;

    const LOG: &str = "\
FECHA,EVENT/PROBLEM,CLASS,AREA,WEEK#,T. MUERTO,T. MUERTO TI
07/15/2024,Printer jam,Hardware,Office,29,15,5
07/16/2024,Switch reboot,Network,Plant,29,30,
08/01/2024,Printer jam,Hardware,Office,31,5,7
";

    fn data() -> IncidentDataset {
        normalize(LOG.as_bytes()).unwrap()
    }

    #[test]
    fn test_top_by_event_defaults_to_three() {
        let out = run(&data(), Statistic::TopByEvent, &QueryParams::default());
        assert_eq!(
            out,
            QueryOutput::Ranked(RankedOutput {
                labels: vec!["Switch reboot".into(), "Printer jam".into()],
                values: vec![30.0, 20.0],
            })
        );
    }

    #[test]
    fn test_week_filter_and_max_aggregation() {
        let mut params = QueryParams { agg: Aggregation::Max, top: Some(1), ..QueryParams::default() };
        params.filter.weeks.insert(29);
        let out = run(&data(), Statistic::TopByArea, &params);
        assert_eq!(out.ranked_rows()[0].label, "Plant");
        assert_eq!(out.ranked_rows().len(), 1);
    }

    #[test]
    fn test_bucket_statistics() {
        let weekly = run(&data(), Statistic::DowntimePerWeek, &QueryParams::default());
        let json = serde_json::to_value(&weekly).unwrap();
        assert_eq!(json["keys"], serde_json::json!([29, 31]));
        assert_eq!(json["values"], serde_json::json!([45.0, 5.0]));

        let it = run(&data(), Statistic::DowntimePerMonth, &QueryParams::default());
        let rows = it.bucket_rows();
        assert_eq!(rows[0].key, "2024-07");
        assert_eq!(rows[0].value, 5.0);

        let freq = run(&data(), Statistic::FrequencyPerMonth, &QueryParams::default());
        let QueryOutput::Buckets(b) = freq else { panic!("expected buckets") };
        assert_eq!(b.values, vec![2.0, 1.0]);
    }

    #[test]
    fn test_missing_column_is_empty_not_error() {
        let sparse = normalize(b"AREA,T. MUERTO\nOffice,3\n").unwrap();
        assert!(run(&sparse, Statistic::TopByClass, &QueryParams::default()).is_empty());
        assert!(run(&sparse, Statistic::DowntimePerWeek, &QueryParams::default()).is_empty());
    }

    #[test]
    fn test_meta_lists_sorted_values() {
        let m = meta(&data());
        assert_eq!(m.weeks, vec![29, 31]);
        assert_eq!(m.areas, vec!["Office", "Plant"]);
        assert_eq!(m.months, vec!["2024-07", "2024-08"]);
        assert_eq!(m.years, vec![2024]);
        assert_eq!(m.classes, vec!["Hardware", "Network"]);
    }

    #[test]
    fn test_listing_tags_rows_with_position() {
        let l = listing(&data(), Some(2));
        assert_eq!(l.rows.len(), 2);
        assert_eq!(l.rows[1]["_csvIndex"], Value::from(1));
        assert_eq!(l.rows[0]["FECHA"], Value::from("2024-07-15"));
        assert_eq!(l.rows[1]["T. MUERTO TI"], Value::Null);
        assert_eq!(l.rows[0]["WEEK#"], Value::from(29));
    }
}
