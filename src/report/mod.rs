//! Four-page support report built from one filtered dataset.
//!
//! Composition is pure: it produces a [`ReportDocument`] of page and panel
//! descriptions. Drawing is left to a [`render::DocumentRenderer`].

pub mod chart;
pub mod render;
pub mod table;

use crate::aggregate::{apply_filter, bucket, period_label, rank, restrict};
use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use crate::types::{
    Aggregation, Bucket, BucketKey, ColumnRole, FilterSpec, GroupKey, IncidentDataset,
    RankedSeries, TimeBucketSeries, ValueKey,
};
use crate::util::{title_case, wrap_label};
use chart::{ChartOptions, ChartPanel, ReferenceLine};
use table::TableLayout;
use tracing::{debug, info};

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Palette slot for a panel; the renderer maps it to a color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accent {
    Area,
    Class,
    Event,
    Weekly,
    MonthlyDowntime,
    MonthlyFrequency,
    Neutral,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Panel {
    Table(TableLayout),
    Chart(ChartPanel),
    Placeholder { title: String, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelSlot {
    pub row: usize,
    pub col: usize,
    pub col_span: usize,
    pub accent: Accent,
    pub panel: Panel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportPage {
    pub title: String,
    pub grid_rows: usize,
    pub grid_cols: usize,
    /// Relative row heights, one per grid row.
    pub row_weights: Vec<f64>,
    pub slots: Vec<PanelSlot>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportDocument {
    pub period_label: String,
    pub pages: Vec<ReportPage>,
}

const NO_DATA: &str = "No data available";

/// Build the four report pages for the rows of `data` passing `filter`.
pub fn compose(data: &IncidentDataset, filter: &FilterSpec, config: &ReportConfig) -> Result<ReportDocument> {
    let filtered = apply_filter(data, filter);
    if filtered.is_empty() {
        return Err(ReportError::EmptyDataset);
    }
    let composer = Composer::new(&filtered, config);
    let pages = vec![
        composer.summary_page(),
        composer.failure_types_page(),
        composer.trend_page(),
        composer.critical_events_page(),
    ];
    info!(
        "Composed {} report pages over {} records ({})",
        pages.len(),
        filtered.len(),
        composer.period
    );
    Ok(ReportDocument { period_label: composer.period, pages })
}

struct Composer<'a> {
    data: &'a IncidentDataset,
    config: &'a ReportConfig,
    period: String,
    event_label: String,
    top_area: RankedSeries,
    top_class: RankedSeries,
    top_event: RankedSeries,
}

impl<'a> Composer<'a> {
    fn new(data: &'a IncidentDataset, config: &'a ReportConfig) -> Self {
        let event_label = data
            .column_name(ColumnRole::Description)
            .map(|c| title_case(&c.replace('_', " ")))
            .unwrap_or_else(|| "Event / Problem".to_string());
        Composer {
            data,
            config,
            period: period_label(data),
            event_label,
            top_area: ranked_downtime(data, GroupKey::Area),
            top_class: ranked_downtime(data, GroupKey::Class),
            top_event: ranked_downtime(data, GroupKey::Description),
        }
    }

    fn max_rows(&self) -> usize {
        self.config.layout.max_rows
    }

    fn table(&self, title: &str, series: &RankedSeries, header: &str, wrap: usize) -> Panel {
        if series.is_empty() {
            return placeholder(title);
        }
        Panel::Table(table::layout(
            title,
            series,
            [header, "Time"],
            self.max_rows(),
            wrap,
            &self.config.layout.table,
        ))
    }

    fn chart_options(&self) -> ChartOptions {
        ChartOptions { headroom: self.config.chart.headroom, ..ChartOptions::default() }
    }

    fn summary_page(&self) -> ReportPage {
        let sections = [
            ("Top 3 by Area", "Area", &self.top_area, Accent::Area),
            ("Top 3 by Class", "Failure type", &self.top_class, Accent::Class),
            ("Top 3 by Event", self.event_label.as_str(), &self.top_event, Accent::Event),
        ];
        let mut slots = Vec::with_capacity(6);
        for (col, (title, header, series, accent)) in sections.into_iter().enumerate() {
            let table = self.table(title, series, header, self.config.layout.summary_wrap);
            slots.push(slot(0, col, 1, accent, table));

            let top = series.head(self.max_rows());
            let labels = top
                .labels()
                .iter()
                .map(|l| wrap_label(l, self.config.layout.chart_wrap).join("\n"))
                .collect();
            let chart = chart::render(labels, top.values(), title, &self.chart_options());
            slots.push(slot(1, col, 1, accent, Panel::Chart(chart)));
        }
        ReportPage {
            title: format!("Top 3 Support Analysis {}", self.period),
            grid_rows: 2,
            grid_cols: 3,
            row_weights: vec![1.05, 1.45],
            slots,
        }
    }

    fn failure_types_page(&self) -> ReportPage {
        let wrap = self.config.layout.detail_wrap;
        let mut slots = vec![slot(
            0,
            0,
            1,
            Accent::Neutral,
            self.table("Top 3 Failure Types", &self.top_class, "Description", wrap),
        )];

        let positions = [(0, 1), (1, 0), (1, 1)];
        let classes = self.top_class.head(self.max_rows());
        let mut details = Vec::new();
        if self.data.has_role(ColumnRole::Description) {
            for class_name in classes.labels() {
                let subset = restrict(self.data, ColumnRole::Class, &class_name);
                details.push((class_name, ranked_downtime(&subset, GroupKey::Description)));
            }
        }
        debug!("Failure-type drill-down over {} classes", details.len());

        for (idx, &(row, col)) in positions.iter().enumerate() {
            let panel = match details.get(idx) {
                Some((class_name, series)) => {
                    self.table(&format!("Top 3 {}", class_name), series, "Description", wrap)
                }
                None => placeholder(""),
            };
            slots.push(slot(row, col, 1, Accent::Neutral, panel));
        }
        ReportPage {
            title: format!("Failure Types {}", self.period),
            grid_rows: 2,
            grid_cols: 2,
            row_weights: vec![1.0, 1.0],
            slots,
        }
    }

    fn trend_page(&self) -> ReportPage {
        let none = FilterSpec::default();
        let weekly = bucket(self.data, BucketKey::Week, Some(ValueKey::Downtime), &none);
        let monthly = bucket(self.data, BucketKey::Month, Some(ValueKey::Downtime), &none);
        let frequency = bucket(self.data, BucketKey::Month, None, &none);

        let target = self.config.chart.target_minutes;
        let weekly_chart = chart::render(
            bucket_labels(&weekly),
            weekly.values(),
            "IT Downtime per Week",
            &ChartOptions {
                reference_line: Some(ReferenceLine {
                    value: target,
                    label: format!("Target {} min", target),
                }),
                ..self.chart_options()
            },
        );
        let monthly_chart = chart::render(
            bucket_labels(&monthly),
            monthly.values(),
            "IT Downtime per Month",
            &ChartOptions { trend: true, ..self.chart_options() },
        );
        let frequency_chart = chart::render(
            bucket_labels(&frequency),
            frequency.values(),
            "IT Frequency Issues per Month",
            &self.chart_options(),
        );

        ReportPage {
            title: format!("Top 3 Support Trend {}", self.period),
            grid_rows: 2,
            grid_cols: 2,
            row_weights: vec![1.3, 1.1],
            slots: vec![
                slot(0, 0, 1, Accent::Weekly, Panel::Chart(weekly_chart)),
                slot(0, 1, 1, Accent::MonthlyDowntime, Panel::Chart(monthly_chart)),
                slot(1, 0, 2, Accent::MonthlyFrequency, Panel::Chart(frequency_chart)),
            ],
        }
    }

    fn critical_events_page(&self) -> ReportPage {
        let critical = self.top_event.head(self.max_rows());
        let title = format!("Top 3 {}", self.event_label);
        let panel = self.table(&title, &critical, "Description", self.config.layout.detail_wrap);
        ReportPage {
            title: format!("Critical Failures to Address {}", self.period),
            grid_rows: 1,
            grid_cols: 1,
            row_weights: vec![1.0],
            slots: vec![slot(0, 0, 1, Accent::Neutral, panel)],
        }
    }
}

fn ranked_downtime(data: &IncidentDataset, group: GroupKey) -> RankedSeries {
    rank(data, group, ValueKey::Downtime, &FilterSpec::default(), Aggregation::Sum, None)
}

fn slot(row: usize, col: usize, col_span: usize, accent: Accent, panel: Panel) -> PanelSlot {
    PanelSlot { row, col, col_span, accent, panel }
}

fn placeholder(title: &str) -> Panel {
    Panel::Placeholder { title: title.to_string(), message: NO_DATA.to_string() }
}

/// `W29` for weeks, `Jul 2024` for months.
fn bucket_labels(series: &TimeBucketSeries) -> Vec<String> {
    series
        .keys()
        .iter()
        .map(|b| match b {
            Bucket::Week(w) => format!("W{}", w),
            Bucket::Month(m) => match MONTH_NAMES.get((m.month as usize).wrapping_sub(1)) {
                Some(name) => format!("{} {}", name, m.year),
                None => m.to_string(),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::normalize;

    const LOG: &str = "\
FECHA,SHIFT,PROBLEM DESCRIPTION/SOLUTION,CLASS,AREA,WEEK#,T. ESPERA,T. SOLUCION,T. MUERTO,T. MUERTO TI
01/08/2024,A,Printer jam,Hardware,Office,2,5,10,15,0
01/09/2024,B,Switch reboot,Network,Plant,2,10,20,30,30
02/14/2024,A,Printer jam,Hardware,Office,7,1,4,5,0
02/15/2024,C,Password reset,Access,Office,7,0,3,3,3
02/16/2024,C,Cable cut,Network,Warehouse,7,10,40,50,50
";

    fn data() -> IncidentDataset {
        normalize(LOG.as_bytes()).unwrap()
    }

    #[test]
    fn test_compose_has_four_pages_in_order() {
        let doc = compose(&data(), &FilterSpec::default(), &ReportConfig::default()).unwrap();
        assert_eq!(doc.pages.len(), 4);
        assert_eq!(doc.period_label, "Weeks #2, 7");
        assert!(doc.pages[0].title.starts_with("Top 3 Support Analysis"));
        assert!(doc.pages[1].title.starts_with("Failure Types"));
        assert!(doc.pages[2].title.starts_with("Top 3 Support Trend"));
        assert!(doc.pages[3].title.starts_with("Critical Failures"));
    }

    #[test]
    fn test_empty_filter_result_is_error() {
        let mut filter = FilterSpec::default();
        filter.weeks.insert(40);
        let err = compose(&data(), &filter, &ReportConfig::default()).unwrap_err();
        assert!(matches!(err, ReportError::EmptyDataset));
    }

    #[test]
    fn test_summary_page_tables_and_charts() {
        let doc = compose(&data(), &FilterSpec::default(), &ReportConfig::default()).unwrap();
        let page = &doc.pages[0];
        assert_eq!(page.slots.len(), 6);
        let Panel::Table(area) = &page.slots[0].panel else { panic!("expected table") };
        assert_eq!(area.rows[1].cells[0], vec!["1. Warehouse"]);
        assert_eq!(area.total_row().unwrap().cells[1], vec!["103 min"]);
        let Panel::Table(event) = &page.slots[4].panel else { panic!("expected table") };
        assert_eq!(event.rows[0].cells[0], vec!["Problem Description/Solution"]);
        let Panel::Chart(ChartPanel::Bars(bars)) = &page.slots[1].panel else { panic!("expected chart") };
        assert_eq!(bars.labels, vec!["Warehouse", "Plant", "Office"]);
        assert!(!bars.highlight_first);
    }

    #[test]
    fn test_failure_types_drill_down() {
        let doc = compose(&data(), &FilterSpec::default(), &ReportConfig::default()).unwrap();
        let page = &doc.pages[1];
        assert_eq!(page.slots.len(), 4);
        let Panel::Table(network) = &page.slots[1].panel else { panic!("expected table") };
        assert_eq!(network.title, "Top 3 Network");
        assert_eq!(network.body_rows().count(), 2);
        assert_eq!(network.rows[1].cells[0], vec!["1. Cable cut"]);
        let Panel::Table(access) = &page.slots[3].panel else { panic!("expected table") };
        assert_eq!(access.title, "Top 3 Access");
    }

    #[test]
    fn test_drill_down_pads_with_placeholders() {
        let mut filter = FilterSpec::default();
        filter.weeks.insert(2);
        let doc = compose(&data(), &filter, &ReportConfig::default()).unwrap();
        let page = &doc.pages[1];
        assert_eq!(page.slots.len(), 4);
        assert!(matches!(page.slots[3].panel, Panel::Placeholder { .. }));
        assert_eq!(doc.period_label, "Week #2");
    }

    #[test]
    fn test_trend_page_series() {
        let doc = compose(&data(), &FilterSpec::default(), &ReportConfig::default()).unwrap();
        let page = &doc.pages[2];
        let Panel::Chart(ChartPanel::Bars(weekly)) = &page.slots[0].panel else { panic!("weekly") };
        assert_eq!(weekly.labels, vec!["W2", "W7"]);
        assert_eq!(weekly.values, vec![45.0, 58.0]);
        assert_eq!(weekly.reference_line.as_ref().unwrap().value, 83.0);
        let Panel::Chart(ChartPanel::Bars(monthly)) = &page.slots[1].panel else { panic!("monthly") };
        assert_eq!(monthly.labels, vec!["Jan 2024", "Feb 2024"]);
        let trend = monthly.trend.as_ref().unwrap();
        assert!(trend[1] > trend[0]);
        let Panel::Chart(ChartPanel::Bars(freq)) = &page.slots[2].panel else { panic!("frequency") };
        assert_eq!(freq.values, vec![2.0, 3.0]);
        assert_eq!(page.slots[2].col_span, 2);
    }

    #[test]
    fn test_missing_columns_render_placeholders() {
        let sparse = normalize(b"AREA,T. MUERTO\nOffice,4\n").unwrap();
        let doc = compose(&sparse, &FilterSpec::default(), &ReportConfig::default()).unwrap();
        assert_eq!(doc.pages.len(), 4);
        assert_eq!(doc.period_label, "Week #N/A");
        assert!(matches!(doc.pages[0].slots[2].panel, Panel::Placeholder { .. }));
        assert!(matches!(doc.pages[2].slots[0].panel, Panel::Chart(ChartPanel::Placeholder { .. })));
        assert!(matches!(doc.pages[3].slots[0].panel, Panel::Placeholder { .. }));
    }

    #[test]
    fn test_generic_event_label_without_description_column() {
        let data = normalize(b"CLASS,AREA,T. MUERTO\nHardware,Office,4\n").unwrap();
        let config = ReportConfig::default();
        assert_eq!(Composer::new(&data, &config).event_label, "Event / Problem");

        let doc = compose(&data, &FilterSpec::default(), &config).unwrap();
        let Panel::Placeholder { title, .. } = &doc.pages[3].slots[0].panel else {
            panic!("expected placeholder")
        };
        assert_eq!(title, "Top 3 Event / Problem");
    }

    #[test]
    fn test_event_label_skips_empty_keyword_column() {
        let data = normalize(
            b"EVENT TYPE,PROBLEM DESCRIPTION/SOLUTION,CLASS,AREA,T. MUERTO\n\
              ,Printer jam,Hardware,Office,15\n\
              ,Cable cut,Network,Plant,50\n",
        )
        .unwrap();
        let doc = compose(&data, &FilterSpec::default(), &ReportConfig::default()).unwrap();

        let Panel::Table(event) = &doc.pages[0].slots[4].panel else { panic!("expected table") };
        assert_eq!(event.rows[0].cells[0], vec!["Problem Description/Solution"]);
        assert_eq!(event.rows[1].cells[0], vec!["1. Cable cut"]);

        let Panel::Table(critical) = &doc.pages[3].slots[0].panel else { panic!("expected table") };
        assert_eq!(critical.title, "Top 3 Problem Description/Solution");
    }
}
