//! Bar chart descriptions: labels, bar heights, annotations, axis bound,
//! optional reference line and trend overlay. Nothing here draws.

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceLine {
    pub value: f64,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartOptions {
    pub highlight_first: bool,
    pub reference_line: Option<ReferenceLine>,
    pub trend: bool,
    /// Headroom multiplier for the y-axis upper bound.
    pub headroom: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub title: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    /// Rounded value printed above each bar.
    pub annotations: Vec<String>,
    pub y_max: f64,
    pub highlight_first: bool,
    pub reference_line: Option<ReferenceLine>,
    pub trend: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartPanel {
    Placeholder { title: String },
    Bars(BarChart),
}

impl ChartPanel {
    pub fn title(&self) -> &str {
        match self {
            ChartPanel::Placeholder { title } => title,
            ChartPanel::Bars(c) => &c.title,
        }
    }
}

pub fn render(labels: Vec<String>, values: Vec<f64>, title: &str, options: &ChartOptions) -> ChartPanel {
    if labels.is_empty() || values.is_empty() {
        return ChartPanel::Placeholder { title: title.to_string() };
    }
    let max = values.iter().copied().fold(0.0_f64, f64::max);
    let headroom = if options.headroom > 0.0 { options.headroom } else { 1.15 };
    let y_max = if max > 0.0 { max * headroom } else { 1.0 };
    let annotations = values.iter().map(|v| format!("{}", v.round_ties_even() as i64)).collect();
    let trend = options.trend.then(|| trend_line(&values));

    ChartPanel::Bars(BarChart {
        title: title.to_string(),
        labels,
        values,
        annotations,
        y_max,
        highlight_first: options.highlight_first,
        reference_line: options.reference_line.clone(),
        trend,
    })
}

/// Least-squares line over bucket index. Fewer than two points returns
/// the values unchanged.
pub fn trend_line(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return values.to_vec();
    }
    let nf = n as f64;
    let mean_x = (nf - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / nf;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxy += dx * (y - mean_y);
        sxx += dx * dx;
    }
    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    (0..n).map(|i| slope * i as f64 + intercept).collect()
}
