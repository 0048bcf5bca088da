//! Grouped statistics over a normalized dataset.
//!
//! Every function here is total: a missing column yields an empty series,
//! never an error.

use crate::types::{
    Aggregation, Bucket, BucketKey, ColumnRole, FilterSpec, GroupKey, IncidentDataset,
    RankedEntry, RankedSeries, TimeBucketSeries, ValueKey, YearMonth,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Keep the rows that pass every supplied predicate. Predicates over
/// columns the dataset does not have are skipped.
pub fn apply_filter(data: &IncidentDataset, filter: &FilterSpec) -> IncidentDataset {
    let roles = &data.roles;
    let check_weeks = !filter.weeks.is_empty() && data.has_role(ColumnRole::Week);
    let check_years = !filter.years.is_empty() && data.has_role(ColumnRole::Date);
    let check_months = !filter.months.is_empty() && data.has_role(ColumnRole::Date);

    let records = data
        .records
        .iter()
        .filter(|r| {
            if check_weeks && !r.week(roles).is_some_and(|w| filter.weeks.contains(&w)) {
                return false;
            }
            if check_years && !r.date(roles).is_some_and(|d| filter.years.contains(&chrono::Datelike::year(&d))) {
                return false;
            }
            if check_months && !r.month(roles).is_some_and(|m| filter.months.contains(&m.to_string())) {
                return false;
            }
            true
        })
        .cloned()
        .collect();
    data.with_records(records)
}

/// Keep rows whose text in `role` equals `value`.
pub fn restrict(data: &IncidentDataset, role: ColumnRole, value: &str) -> IncidentDataset {
    let records = data
        .records
        .iter()
        .filter(|r| r.text(&data.roles, role) == Some(value))
        .cloned()
        .collect();
    data.with_records(records)
}

/// Top-`n` groups by aggregated value, descending.
///
/// Ties keep the order in which each group was first seen. `n = None`
/// keeps every group; `n <= 0` returns an empty series.
pub fn rank(
    data: &IncidentDataset,
    group: GroupKey,
    value: ValueKey,
    filter: &FilterSpec,
    agg: Aggregation,
    n: Option<i64>,
) -> RankedSeries {
    let limit = match n {
        Some(k) if k <= 0 => return RankedSeries::default(),
        Some(k) => k as usize,
        None => usize::MAX,
    };
    let group_role = group.role();
    let value_role = value.role();
    if !data.has_role(group_role) || (agg != Aggregation::Count && !data.has_role(value_role)) {
        return RankedSeries::default();
    }

    let filtered = apply_filter(data, filter);
    let roles = &filtered.roles;

    // Insertion-ordered accumulators: (label, value).
    let mut order: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(String, f64)> = Vec::new();
    for r in &filtered.records {
        let Some(label) = r.text(roles, group_role) else { continue };
        let v = match agg {
            Aggregation::Count => 1.0,
            _ => match r.minutes(roles, value_role) {
                Some(v) => v,
                None => continue,
            },
        };
        match order.get(label) {
            Some(&i) => {
                let acc = &mut groups[i].1;
                *acc = match agg {
                    Aggregation::Max => acc.max(v),
                    _ => *acc + v,
                };
            }
            None => {
                order.insert(label, groups.len());
                groups.push((label.to_string(), v));
            }
        }
    }

    // `sort_by` is stable, which is what keeps first-seen order on ties.
    groups.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    RankedSeries {
        entries: groups
            .into_iter()
            .take(limit)
            .map(|(label, value)| RankedEntry { label, value })
            .collect(),
    }
}

/// Sum (or count, with `value = None`) per week or month, ascending by key.
pub fn bucket(
    data: &IncidentDataset,
    key: BucketKey,
    value: Option<ValueKey>,
    filter: &FilterSpec,
) -> TimeBucketSeries {
    let key_role = match key {
        BucketKey::Week => ColumnRole::Week,
        BucketKey::Month => ColumnRole::Date,
    };
    if !data.has_role(key_role) || value.is_some_and(|v| !data.has_role(v.role())) {
        return TimeBucketSeries::default();
    }

    let filtered = apply_filter(data, filter);
    let roles = &filtered.roles;
    let mut sums: BTreeMap<Bucket, f64> = BTreeMap::new();
    for r in &filtered.records {
        let bucket = match key {
            BucketKey::Week => r.week(roles).map(Bucket::Week),
            BucketKey::Month => r.month(roles).map(Bucket::Month),
        };
        let Some(bucket) = bucket else { continue };
        let v = match value {
            Some(vk) => match r.minutes(roles, vk.role()) {
                Some(v) => v,
                None => continue,
            },
            None => 1.0,
        };
        *sums.entry(bucket).or_insert(0.0) += v;
    }
    TimeBucketSeries { points: sums.into_iter().collect() }
}

pub fn distinct_weeks(data: &IncidentDataset) -> Vec<u32> {
    let set: BTreeSet<u32> = data.records.iter().filter_map(|r| r.week(&data.roles)).collect();
    set.into_iter().collect()
}

pub fn distinct_text(data: &IncidentDataset, role: ColumnRole) -> Vec<String> {
    let set: BTreeSet<&str> = data.records.iter().filter_map(|r| r.text(&data.roles, role)).collect();
    set.into_iter().map(str::to_string).collect()
}

pub fn distinct_months(data: &IncidentDataset) -> Vec<YearMonth> {
    let set: BTreeSet<YearMonth> = data.records.iter().filter_map(|r| r.month(&data.roles)).collect();
    set.into_iter().collect()
}

pub fn distinct_years(data: &IncidentDataset) -> Vec<i32> {
    let set: BTreeSet<i32> = distinct_months(data).into_iter().map(|m| m.year).collect();
    set.into_iter().collect()
}

/// `Week #29`, `Weeks #28, 29`, or `Week #N/A`.
pub fn period_label(data: &IncidentDataset) -> String {
    let weeks = distinct_weeks(data);
    match weeks.as_slice() {
        [] => "Week #N/A".to_string(),
        [one] => format!("Week #{}", one),
        many => format!(
            "Weeks #{}",
            many.iter().map(|w| w.to_string()).collect::<Vec<_>>().join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::normalize;

    fn dataset(csv: &str) -> IncidentDataset {
        normalize(csv.as_bytes()).unwrap()
    }

    fn outages_by_area() -> IncidentDataset {
        dataset("AREA,T. MUERTO\nNetwork,30\nNetwork,10\nPower,25\n")
    }

    #[test]
    fn test_rank_sums_by_area() {
        let s = rank(
            &outages_by_area(),
            GroupKey::Area,
            ValueKey::Downtime,
            &FilterSpec::default(),
            Aggregation::Sum,
            Some(2),
        );
        assert_eq!(s.labels(), vec!["Network", "Power"]);
        assert_eq!(s.values(), vec![40.0, 25.0]);
    }

    #[test]
    fn test_rank_max_and_count() {
        let data = outages_by_area();
        let f = FilterSpec::default();
        let max = rank(&data, GroupKey::Area, ValueKey::Downtime, &f, Aggregation::Max, None);
        assert_eq!(max.values(), vec![30.0, 25.0]);
        let count = rank(&data, GroupKey::Area, ValueKey::Downtime, &f, Aggregation::Count, None);
        assert_eq!(count.labels(), vec!["Network", "Power"]);
        assert_eq!(count.values(), vec![2.0, 1.0]);
    }

    #[test]
    fn test_rank_ties_keep_first_seen_order() {
        let data = dataset("AREA,T. MUERTO\nZeta,5\nAlpha,5\nMid,7\nZeta,0\n");
        for _ in 0..5 {
            let s = rank(&data, GroupKey::Area, ValueKey::Downtime, &FilterSpec::default(), Aggregation::Sum, None);
            assert_eq!(s.labels(), vec!["Mid", "Zeta", "Alpha"]);
        }
    }

    #[test]
    fn test_rank_truncation_is_min_k_groups() {
        let data = dataset("AREA,T. MUERTO\na,1\nb,2\nc,3\nd,4\n");
        for k in 0..7i64 {
            let s = rank(&data, GroupKey::Area, ValueKey::Downtime, &FilterSpec::default(), Aggregation::Sum, Some(k));
            assert_eq!(s.len(), (k as usize).min(4));
            let v = s.values();
            assert!(v.windows(2).all(|w| w[0] >= w[1]));
        }
        let neg = rank(&data, GroupKey::Area, ValueKey::Downtime, &FilterSpec::default(), Aggregation::Sum, Some(-3));
        assert!(neg.is_empty());
    }

    #[test]
    fn test_rank_never_inflates_totals() {
        let data = dataset("AREA,T. MUERTO,WEEK#\na,1,1\nb,2.5,1\n,9,1\nc,,1\na,4,2\nd,3,1\n");
        let mut filter = FilterSpec::default();
        filter.weeks.insert(1);
        let column_total: f64 = apply_filter(&data, &filter)
            .records
            .iter()
            .filter_map(|r| r.minutes(&data.roles, ColumnRole::Downtime))
            .sum();
        let partial = rank(&data, GroupKey::Area, ValueKey::Downtime, &filter, Aggregation::Sum, Some(2));
        assert!(partial.total() <= column_total);
        let full = rank(&data, GroupKey::Area, ValueKey::Downtime, &filter, Aggregation::Sum, Some(10));
        // The row with no area carries 9 minutes that cannot be ranked.
        assert_eq!(full.total(), column_total - 9.0);
    }

    #[test]
    fn test_rank_missing_columns_is_empty() {
        let data = dataset("CLASS,T. MUERTO\nx,1\n");
        let s = rank(&data, GroupKey::Area, ValueKey::Downtime, &FilterSpec::default(), Aggregation::Sum, Some(3));
        assert!(s.is_empty());
        let s = rank(&data, GroupKey::Class, ValueKey::ItDowntime, &FilterSpec::default(), Aggregation::Sum, Some(3));
        assert!(s.is_empty());
        let empty = IncidentDataset::default();
        assert!(rank(&empty, GroupKey::Area, ValueKey::Downtime, &FilterSpec::default(), Aggregation::Sum, None).is_empty());
    }

    #[test]
    fn test_filters_are_conjunctive_and_skip_absent_columns() {
        let data = dataset(
            "FECHA,WEEK#,AREA,T. MUERTO\n01/03/2024,1,a,1\n02/05/2024,6,b,2\n02/06/2024,6,c,4\n01/09/2025,2,d,8\n",
        );
        let mut f = FilterSpec::default();
        f.years.insert(2024);
        f.months.insert("2024-02".to_string());
        f.weeks.insert(6);
        assert_eq!(apply_filter(&data, &f).len(), 2);

        let no_week = dataset("AREA,T. MUERTO\na,1\n");
        assert_eq!(apply_filter(&no_week, &f).len(), 1);
    }

    #[test]
    fn test_bucket_by_week_and_month() {
        let data = dataset(
            "FECHA,WEEK#,T. MUERTO\n02/05/2024,6,2\n01/03/2024,1,1\n02/06/2024,6,4\nbad,,8\n",
        );
        let weeks = bucket(&data, BucketKey::Week, Some(ValueKey::Downtime), &FilterSpec::default());
        assert_eq!(weeks.points, vec![(Bucket::Week(1), 1.0), (Bucket::Week(6), 6.0)]);

        let months = bucket(&data, BucketKey::Month, None, &FilterSpec::default());
        let keys: Vec<String> = months.keys().iter().map(|b| b.to_string()).collect();
        assert_eq!(keys, vec!["2024-01", "2024-02"]);
        assert_eq!(months.values(), vec![1.0, 2.0]);

        let missing = bucket(&data, BucketKey::Month, Some(ValueKey::ItDowntime), &FilterSpec::default());
        assert!(missing.is_empty());
    }

    #[test]
    fn test_period_label() {
        assert_eq!(period_label(&dataset("WEEK#,AREA\n29,a\n29,b\n")), "Week #29");
        assert_eq!(period_label(&dataset("WEEK#,AREA\n30,a\n28,b\n")), "Weeks #28, 30");
        assert_eq!(period_label(&dataset("AREA\na\n")), "Week #N/A");
    }

    #[test]
    fn test_restrict_by_class() {
        let data = dataset("CLASS,AREA\nHW,a\nSW,b\nHW,c\n");
        let hw = restrict(&data, ColumnRole::Class, "HW");
        assert_eq!(distinct_text(&hw, ColumnRole::Area), vec!["a", "c"]);
    }
}
