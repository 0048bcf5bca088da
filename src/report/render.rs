//! Drawing backends for a composed [`ReportDocument`].
//!
//! `SvgHtmlRenderer` draws each page with plotters' SVG backend and wraps the
//! pages into a single printable HTML file, one page per sheet.

use super::chart::{BarChart, ChartPanel};
use super::table::{RowKind, TableLayout};
use super::{Accent, Panel, PanelSlot, ReportDocument, ReportPage};
use crate::config::{ColorConfig, ReportConfig};
use crate::error::{ReportError, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::debug;

type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

pub trait DocumentRenderer {
    fn render(&self, doc: &ReportDocument) -> Result<Vec<u8>>;
}

pub struct SvgHtmlRenderer {
    width: u32,
    height: u32,
    title_height: u32,
    colors: ColorConfig,
}

impl SvgHtmlRenderer {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            width: config.layout.page_width,
            height: config.layout.page_height,
            title_height: config.layout.title_height,
            colors: config.chart.colors.clone(),
        }
    }

    /// Draw one page and return its SVG markup.
    pub fn render_page(&self, page: &ReportPage) -> Result<String> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (self.width, self.height)).into_drawing_area();
            root.fill(&WHITE).map_err(render_error)?;
            let (title_area, body) = root.split_vertically(self.title_height);
            let title_font = ("sans-serif", 26).into_font().style(FontStyle::Bold);
            title_area
                .draw_text(&page.title, &title_font.color(&BLACK), (20, 16))
                .map_err(render_error)?;

            for slot in &page.slots {
                let area = slot_area(&body, page, slot);
                self.draw_panel(&area, slot)?;
            }
            root.present().map_err(render_error)?;
        }
        Ok(svg)
    }

    fn accent(&self, accent: Accent) -> RGBColor {
        let c = &self.colors;
        rgb(match accent {
            Accent::Area => c.area,
            Accent::Class => c.class,
            Accent::Event => c.event,
            Accent::Weekly => c.weekly,
            Accent::MonthlyDowntime => c.monthly_downtime,
            Accent::MonthlyFrequency => c.monthly_frequency,
            Accent::Neutral => c.table_header,
        })
    }

    fn draw_panel(&self, area: &Area<'_>, slot: &PanelSlot) -> Result<()> {
        let accent = self.accent(slot.accent);
        match &slot.panel {
            Panel::Table(table) => self.draw_table(area, table, accent),
            Panel::Chart(ChartPanel::Bars(chart)) => self.draw_bars(area, chart, accent),
            Panel::Chart(ChartPanel::Placeholder { title }) => draw_placeholder(area, title, "No data"),
            Panel::Placeholder { title, message } => draw_placeholder(area, title, message),
        }
    }

    fn draw_table(&self, area: &Area<'_>, table: &TableLayout, accent: RGBColor) -> Result<()> {
        let (w, h) = area.dim_in_pixel();
        let title_font = ("sans-serif", 16).into_font().style(FontStyle::Bold);
        area.draw_text(&table.title, &title_font.color(&accent), (4, 4))
            .map_err(render_error)?;

        // Row heights are in table units; fit them below the title.
        let top = 28;
        let available = h.saturating_sub(top as u32 + 4) as f64;
        let pixel_per_unit = (available / table.total_height().max(f64::EPSILON)).min(90.0);
        let border = rgb(self.colors.table_border);
        let header_fill = rgb(self.colors.table_header);
        let total_fill = rgb(self.colors.table_total);
        let cell_font = ("sans-serif", 13).into_font();

        let mut y = top;
        for row in &table.rows {
            let row_h = (row.height * pixel_per_unit).round() as i32;
            let mut x = 0i32;
            for (col, lines) in row.cells.iter().enumerate() {
                let frac = table.column_widths.get(col).copied().unwrap_or(0.0);
                let col_w = (frac * w as f64).round() as i32;
                let fill = match row.kind {
                    RowKind::Header => header_fill,
                    RowKind::Total => total_fill,
                    RowKind::Body => WHITE,
                };
                area.draw(&Rectangle::new([(x, y), (x + col_w, y + row_h)], fill.filled()))
                    .map_err(render_error)?;
                area.draw(&Rectangle::new([(x, y), (x + col_w, y + row_h)], border.stroke_width(1)))
                    .map_err(render_error)?;

                let text_color = if row.kind == RowKind::Header { WHITE } else { BLACK };
                let style = if row.kind == RowKind::Body {
                    cell_font.clone().color(&text_color)
                } else {
                    cell_font.clone().style(FontStyle::Bold).color(&text_color)
                };
                let line_h = 16;
                let block = line_h * lines.len() as i32;
                let mut ty = y + (row_h - block).max(0) / 2;
                for line in lines {
                    area.draw_text(line, &style, (x + 6, ty)).map_err(render_error)?;
                    ty += line_h;
                }
                x += col_w;
            }
            y += row_h;
        }
        Ok(())
    }

    fn draw_bars(&self, area: &Area<'_>, chart: &BarChart, accent: RGBColor) -> Result<()> {
        let n = chart.values.len() as i32;
        let mut ctx = ChartBuilder::on(area)
            .caption(&chart.title, ("sans-serif", 16).into_font().style(FontStyle::Bold))
            .margin(8)
            .x_label_area_size(50)
            .y_label_area_size(45)
            .build_cartesian_2d((0..n).into_segmented(), 0f64..chart.y_max)
            .map_err(render_error)?;

        ctx.configure_mesh()
            .disable_x_mesh()
            .light_line_style(RGBColor(225, 225, 225))
            .x_labels(chart.labels.len())
            // Tick labels may span several lines; they are drawn below.
            .x_label_formatter(&|_| String::new())
            .y_label_formatter(&|y| format!("{:.0}", y))
            .draw()
            .map_err(render_error)?;

        let (base_x, base_y) = area.get_base_pixel();
        let tick_font = ("sans-serif", 11)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Top));
        for (i, label) in chart.labels.iter().enumerate() {
            let (x, y) = ctx.backend_coord(&(SegmentValue::CenterOf(i as i32), 0.0));
            for (line_no, line) in label.lines().enumerate() {
                let pos = (x - base_x, y - base_y + 6 + 13 * line_no as i32);
                area.draw_text(line, &tick_font, pos).map_err(render_error)?;
            }
        }

        let highlight = rgb(self.colors.highlight);
        let highlight_first = chart.highlight_first;
        ctx.draw_series(chart.values.iter().enumerate().map(|(i, v)| {
            let i = i as i32;
            let color = if highlight_first && i == 0 { highlight } else { accent };
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *v)],
                color.filled(),
            );
            bar.set_margin(0, 0, 8, 8);
            bar
        }))
        .map_err(render_error)?;

        let offset = chart.y_max * 0.03;
        let annotation_font = ("sans-serif", 12).into_font().style(FontStyle::Bold);
        ctx.draw_series(chart.annotations.iter().zip(&chart.values).enumerate().map(|(i, (text, v))| {
            Text::new(
                text.clone(),
                (SegmentValue::CenterOf(i as i32), v + offset),
                annotation_font.clone(),
            )
        }))
        .map_err(render_error)?;

        let mut has_legend = false;
        if let Some(line) = &chart.reference_line {
            let color = rgb(self.colors.trend);
            ctx.draw_series(LineSeries::new(
                vec![(SegmentValue::Exact(0), line.value), (SegmentValue::Exact(n), line.value)],
                color.stroke_width(2),
            ))
            .map_err(render_error)?
            .label(line.label.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
            has_legend = true;
        }
        if let Some(trend) = &chart.trend {
            let color = rgb(self.colors.trend);
            ctx.draw_series(LineSeries::new(
                trend
                    .iter()
                    .enumerate()
                    .map(|(i, t)| (SegmentValue::CenterOf(i as i32), *t)),
                color.stroke_width(2),
            ))
            .map_err(render_error)?
            .label("Trend")
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
            has_legend = true;
        }
        if has_legend {
            ctx.configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(render_error)?;
        }
        Ok(())
    }
}

impl DocumentRenderer for SvgHtmlRenderer {
    fn render(&self, doc: &ReportDocument) -> Result<Vec<u8>> {
        let mut html = String::from(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n",
        );
        html.push_str(&format!("<title>IT Support Report {}</title>\n", escape(&doc.period_label)));
        html.push_str(
            "<style>\n@page { size: A4 landscape; margin: 0; }\n\
             body { margin: 0; }\n\
             section.page { page-break-after: always; break-after: page; }\n\
             </style>\n</head>\n<body>\n",
        );
        for (idx, page) in doc.pages.iter().enumerate() {
            let svg = self.render_page(page)?;
            debug!("Rendered page {} ({} bytes of SVG)", idx + 1, svg.len());
            html.push_str("<section class=\"page\">\n");
            html.push_str(&svg);
            html.push_str("\n</section>\n");
        }
        html.push_str("</body>\n</html>\n");
        Ok(html.into_bytes())
    }
}

/// Pixel rectangle of a grid slot within the page body.
fn slot_area<'a>(body: &Area<'a>, page: &ReportPage, slot: &PanelSlot) -> Area<'a> {
    let (w, h) = body.dim_in_pixel();
    let pad = 12i32;
    let total_weight: f64 = page.row_weights.iter().sum::<f64>().max(f64::EPSILON);
    let row_top: f64 = page.row_weights.iter().take(slot.row).sum();
    let row_weight = page.row_weights.get(slot.row).copied().unwrap_or(1.0);
    let col_w = w as f64 / page.grid_cols.max(1) as f64;

    let x = (slot.col as f64 * col_w) as i32 + pad;
    let y = (row_top / total_weight * h as f64) as i32 + pad;
    let width = (col_w * slot.col_span as f64) as i32 - 2 * pad;
    let height = (row_weight / total_weight * h as f64) as i32 - 2 * pad;
    body.clone().shrink((x, y), (width.max(1), height.max(1)))
}

fn draw_placeholder(area: &Area<'_>, title: &str, message: &str) -> Result<()> {
    let (w, h) = area.dim_in_pixel();
    if !title.is_empty() {
        let title_font = ("sans-serif", 16).into_font().style(FontStyle::Bold);
        area.draw_text(title, &title_font.color(&BLACK), (4, 4))
            .map_err(render_error)?;
    }
    let style = ("sans-serif", 14).into_font().color(&RGBColor(119, 119, 119));
    let x = (w as i32 / 2 - 60).max(4);
    area.draw_text(message, &style, (x, h as i32 / 2))
        .map_err(render_error)?;
    Ok(())
}

fn rgb(c: [u8; 3]) -> RGBColor {
    RGBColor(c[0], c[1], c[2])
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn render_error<E: std::fmt::Display>(e: E) -> ReportError {
    ReportError::Render(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::normalize;
    use crate::report::compose;
    use crate::types::FilterSpec;

    #[test]
    fn test_renders_four_page_html() {
        let data = normalize(
            b"FECHA,CLASS,AREA,WEEK#,EVENT,T. MUERTO\n\
              01/08/2024,Hardware,Office,2,Printer jam,15\n\
              02/14/2024,Network,Plant,7,Switch <reboot>,30\n",
        )
        .unwrap();
        let config = ReportConfig::default();
        let doc = compose(&data, &FilterSpec::default(), &config).unwrap();
        let bytes = SvgHtmlRenderer::new(&config).render(&doc).unwrap();
        let html = String::from_utf8(bytes).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert_eq!(html.matches("<section class=\"page\">").count(), 4);
        assert_eq!(html.matches("<svg").count(), 4);
        assert!(html.contains("Weeks #2, 7"));
    }

    #[test]
    fn test_placeholder_page_renders() {
        let data = normalize(b"AREA,T. MUERTO\nOffice,4\n").unwrap();
        let config = ReportConfig::default();
        let doc = compose(&data, &FilterSpec::default(), &config).unwrap();
        let svg = SvgHtmlRenderer::new(&config).render_page(&doc.pages[3]).unwrap();
        assert!(svg.contains("No data available"));
    }

    #[test]
    fn test_wrapped_tick_labels_keep_their_lines() {
        let chart = super::super::chart::render(
            vec!["Main line\nNorth".to_string(), "Office".to_string()],
            vec![40.0, 10.0],
            "Top 3 by Area",
            &super::super::chart::ChartOptions::default(),
        );
        let page = ReportPage {
            title: "Labels".to_string(),
            grid_rows: 1,
            grid_cols: 1,
            row_weights: vec![1.0],
            slots: vec![PanelSlot { row: 0, col: 0, col_span: 1, accent: Accent::Area, panel: Panel::Chart(chart) }],
        };
        let svg = SvgHtmlRenderer::new(&ReportConfig::default()).render_page(&page).unwrap();
        assert!(svg.contains(">Main line<"));
        assert!(svg.contains(">North<"));
        assert!(!svg.contains("Main line North"));
    }
}
