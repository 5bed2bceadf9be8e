//! Spread charts rendered to SVG with Plotters.
//!
//! One chart overlays every index's aligned spread series (bps) over a date
//! window, with a zero reference line. The x axis is days since the first
//! date in the window; tick labels are formatted back to calendar years.

use std::path::Path;

use chrono::{Duration, NaiveDate};
use plotters::prelude::*;

use crate::align::AlignedSeries;
use crate::domain::IndexCode;
use crate::error::PipelineError;

/// A render-only chart description; all data prep happens before `render`.
pub struct SpreadChart<'a> {
    pub aligned: &'a AlignedSeries,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub width: u32,
    pub height: u32,
}

fn series_color(index: IndexCode) -> RGBColor {
    match index {
        IndexCode::Spx => BLUE,
        IndexCode::Ndx => GREEN,
        IndexCode::Indu => RED,
    }
}

impl SpreadChart<'_> {
    pub fn title(&self) -> String {
        format!("Implied Forward Spread Across Indices (bps) [{} to {}]", self.start, self.end)
    }

    /// Write the chart to `path` as SVG.
    pub fn render(&self, path: &Path) -> Result<(), PipelineError> {
        self.draw(path).map_err(|e| PipelineError::Chart {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn draw(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let origin = self.aligned.dates.first().copied().unwrap_or(self.start);
        let x_of = |d: NaiveDate| (d - origin).num_days() as f64;

        let x0 = 0.0;
        let mut x1 = self.aligned.dates.last().map(|d| x_of(*d)).unwrap_or(1.0);
        if x1 <= x0 {
            x1 = x0 + 1.0;
        }
        let (y0, y1) = padded_range(self.aligned.value_range());

        let root = SVGBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(self.title(), ("sans-serif", 20))
            .margin(10)
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(x0..x1, y0..y1)?;

        let fmt_x = |v: &f64| (origin + Duration::days(v.round() as i64)).format("%Y").to_string();
        chart
            .configure_mesh()
            .x_desc("Date")
            .y_desc("Spread (bps)")
            .x_labels(10)
            .y_labels(8)
            .x_label_formatter(&fmt_x)
            .y_label_formatter(&|v| format!("{v:.0}"))
            .draw()?;

        // Zero reference.
        chart.draw_series(LineSeries::new([(x0, 0.0), (x1, 0.0)], BLACK.mix(0.7)))?;

        for (index, values) in &self.aligned.columns {
            let color = series_color(*index);
            let mut labelled = false;
            for segment in segments(&self.aligned.dates, values) {
                let points = segment.into_iter().map(|(d, v)| (x_of(d), v));
                let drawn = chart.draw_series(LineSeries::new(points, color.mix(0.8)))?;
                if !labelled {
                    drawn
                        .label(format!("{} Spread (bps)", index.code()))
                        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
                    labelled = true;
                }
            }
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;

        root.present()?;
        Ok(())
    }
}

/// Split a column into runs of consecutive present values.
fn segments(dates: &[NaiveDate], values: &[Option<f64>]) -> Vec<Vec<(NaiveDate, f64)>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for (date, value) in dates.iter().zip(values) {
        match value {
            Some(v) => current.push((*date, *v)),
            None if !current.is_empty() => out.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn padded_range(range: Option<(f64, f64)>) -> (f64, f64) {
    // Always keep the zero line in view.
    let (lo, hi) = match range {
        Some((lo, hi)) if lo.is_finite() && hi.is_finite() => (lo.min(0.0), hi.max(0.0)),
        _ => (-1.0, 1.0),
    };
    let pad = ((hi - lo) * 0.05).max(1.0);
    (lo - pad, hi + pad)
}
