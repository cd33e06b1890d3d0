//! Static Chart Renderer
//! Draws the joined data to PNG files with plotters.
//!
//! Charts:
//! 1. Time series: temperature and attainment over the years, stacked
//! 2. Regression: temperature vs. attainment with the fitted line
//! 3. Cross-country: latest year of every country, temperature vs. attainment

use crate::data::{AgeSelection, JoinedRecord};
use crate::stats::Regression;
use plotters::prelude::*;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("No data to plot")]
    NoData,
    #[error("Failed to draw {}: {message}", path.display())]
    Drawing { path: PathBuf, message: String },
}

pub const CHART_SIZE: (u32, u32) = (1024, 768);

const TEMPERATURE_COLOR: RGBColor = RGBColor(237, 125, 49);
const ATTAINMENT_COLOR: RGBColor = RGBColor(91, 155, 213);
const LINE_COLOR: RGBColor = RGBColor(156, 0, 6);
const FONT: &str = "sans-serif";

/// Turn a name into something safe for a file name.
pub fn safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Value range padded by 15% on each side; flat data gets +-1.
pub fn padded_range(values: impl IntoIterator<Item = f64>) -> Option<Range<f64>> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        if v.is_finite() {
            min = min.min(v);
            max = max.max(v);
        }
    }
    if min.is_infinite() {
        return None;
    }
    let pad = if max > min { (max - min) * 0.15 } else { 1.0 };
    Some((min - pad)..(max + pad))
}

pub struct ChartRenderer;

impl ChartRenderer {
    /// Two stacked scatter plots over years: temperature on top, attainment
    /// below.
    pub fn render_time_series(
        country: &str,
        rows: &[JoinedRecord],
        measure_label: &str,
        ages: AgeSelection,
        path: &Path,
    ) -> Result<(), ChartError> {
        let years = padded_range(rows.iter().map(|r| r.year as f64)).ok_or(ChartError::NoData)?;
        let temps = padded_range(rows.iter().map(|r| r.average_temperature))
            .ok_or(ChartError::NoData)?;
        let attain =
            padded_range(rows.iter().map(|r| r.attainment_value)).ok_or(ChartError::NoData)?;

        let fail = drawing_error(path);
        let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(&fail)?;
        let root = root
            .titled(
                &format!("{country}: Climate vs. Education Attainment ({ages})"),
                (FONT, 28),
            )
            .map_err(&fail)?;
        let (upper, lower) = root.split_vertically(364);

        let panels = [
            (
                &upper,
                temps,
                "Avg Temp (Celsius)",
                TEMPERATURE_COLOR,
                rows.iter()
                    .map(|r| (r.year as f64, r.average_temperature))
                    .collect::<Vec<_>>(),
            ),
            (
                &lower,
                attain,
                measure_label,
                ATTAINMENT_COLOR,
                rows.iter()
                    .map(|r| (r.year as f64, r.attainment_value))
                    .collect::<Vec<_>>(),
            ),
        ];

        for (area, y_range, y_desc, color, points) in panels {
            let mut chart = ChartBuilder::on(area)
                .margin(15)
                .x_label_area_size(35)
                .y_label_area_size(60)
                .build_cartesian_2d(years.clone(), y_range)
                .map_err(&fail)?;

            chart
                .configure_mesh()
                .x_desc("Year")
                .y_desc(y_desc)
                .x_label_formatter(&|x| format!("{x:.0}"))
                .draw()
                .map_err(&fail)?;

            chart
                .draw_series(
                    points
                        .iter()
                        .map(|&(x, y)| Circle::new((x, y), 5, color.filled())),
                )
                .map_err(&fail)?
                .label(y_desc)
                .legend(move |(x, y)| Circle::new((x + 5, y), 5, color.filled()));

            chart
                .configure_series_labels()
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()
                .map_err(&fail)?;
        }

        root.present().map_err(&fail)?;
        info!(path = %path.display(), "wrote time series chart");
        Ok(())
    }

    /// Temperature vs. attainment with the regression line from
    /// floor(min x) to ceil(max x).
    pub fn render_regression(
        country: &str,
        rows: &[JoinedRecord],
        regression: &Regression,
        measure_label: &str,
        path: &Path,
    ) -> Result<(), ChartError> {
        let temps = padded_range(rows.iter().map(|r| r.average_temperature))
            .ok_or(ChartError::NoData)?;
        let start_x = rows
            .iter()
            .map(|r| r.average_temperature)
            .fold(f64::INFINITY, f64::min)
            .floor();
        let end_x = rows
            .iter()
            .map(|r| r.average_temperature)
            .fold(f64::NEG_INFINITY, f64::max)
            .ceil();

        let line = [
            (start_x, regression.predict(start_x)),
            (end_x, regression.predict(end_x)),
        ];
        let y_range = padded_range(
            rows.iter()
                .map(|r| r.attainment_value)
                .chain(line.iter().map(|&(_, y)| y)),
        )
        .ok_or(ChartError::NoData)?;
        let x_range = (temps.start.min(start_x))..(temps.end.max(end_x));

        let fail = drawing_error(path);
        let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(&fail)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                format!("{country}: Average Temperature (Celsius) compared to {measure_label}"),
                (FONT, 24),
            )
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, y_range)
            .map_err(&fail)?;

        chart
            .configure_mesh()
            .x_desc("Average Temperature (Celsius)")
            .y_desc(measure_label)
            .draw()
            .map_err(&fail)?;

        chart
            .draw_series(rows.iter().map(|r| {
                Circle::new(
                    (r.average_temperature, r.attainment_value),
                    5,
                    ATTAINMENT_COLOR.filled(),
                )
            }))
            .map_err(&fail)?
            .label(format!("(Avg Temperature, {measure_label})"))
            .legend(|(x, y)| Circle::new((x + 5, y), 5, ATTAINMENT_COLOR.filled()));

        chart
            .draw_series(LineSeries::new(line, LINE_COLOR.stroke_width(2)))
            .map_err(&fail)?
            .label(format!(
                "Regression Line (r = {:.2}, p = {:.3})",
                regression.r, regression.p_value
            ))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 15, y)], LINE_COLOR));

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(&fail)?;

        root.present().map_err(&fail)?;
        info!(path = %path.display(), "wrote regression chart");
        Ok(())
    }

    /// One labelled point per row, usually the latest year of each country.
    pub fn render_cross_country(
        rows: &[JoinedRecord],
        measure_label: &str,
        path: &Path,
    ) -> Result<(), ChartError> {
        let x_range = padded_range(rows.iter().map(|r| r.average_temperature))
            .ok_or(ChartError::NoData)?;
        let y_range =
            padded_range(rows.iter().map(|r| r.attainment_value)).ok_or(ChartError::NoData)?;

        let fail = drawing_error(path);
        let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(&fail)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                format!("Average Temperature vs. {measure_label} by Country"),
                (FONT, 24),
            )
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, y_range)
            .map_err(&fail)?;

        chart
            .configure_mesh()
            .x_desc("Average Temperature (Celsius)")
            .y_desc(measure_label)
            .draw()
            .map_err(&fail)?;

        chart
            .draw_series(rows.iter().map(|r| {
                EmptyElement::at((r.average_temperature, r.attainment_value))
                    + Circle::new((0, 0), 4, ATTAINMENT_COLOR.filled())
                    + Text::new(
                        format!("{} ({})", r.country, r.year),
                        (6, -6),
                        (FONT, 11).into_font(),
                    )
            }))
            .map_err(&fail)?;

        root.present().map_err(&fail)?;
        info!(path = %path.display(), countries = rows.len(), "wrote cross-country chart");
        Ok(())
    }
}

fn drawing_error<E: std::fmt::Display>(path: &Path) -> impl Fn(E) -> ChartError + '_ {
    move |e| ChartError::Drawing {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(safe_file_name("Côte D'Ivoire"), "Côte_D_Ivoire");
        assert_eq!(safe_file_name("new-zealand_1"), "new-zealand_1");
        assert_eq!(safe_file_name("a/b c"), "a_b_c");
    }

    #[test]
    fn range_is_padded() {
        let range = padded_range([0.0, 10.0]).unwrap();
        assert!((range.start + 1.5).abs() < 1e-12);
        assert!((range.end - 11.5).abs() < 1e-12);
    }

    #[test]
    fn flat_range_gets_unit_padding() {
        assert_eq!(padded_range([4.0, 4.0]), Some(3.0..5.0));
    }

    #[test]
    fn range_ignores_non_finite_values() {
        assert_eq!(padded_range([f64::NAN, 2.0]), Some(1.0..3.0));
        assert_eq!(padded_range(Vec::<f64>::new()), None);
        assert_eq!(padded_range([f64::NAN]), None);
    }

    #[test]
    fn empty_rows_are_rejected_before_drawing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        let err = ChartRenderer::render_cross_country(&[], "Average Years of Schooling", &path)
            .unwrap_err();
        assert!(matches!(err, ChartError::NoData));
        assert!(!path.exists());
    }
}
