//! Statistics Calculator Module
//! Descriptive statistics per series and the temperature vs. attainment
//! linear regression with its significance test.

use crate::data::JoinedTable;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;
use thiserror::Error;
use tracing::debug;

/// Significance threshold for the slope t-test
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.05;

/// Fewest points a regression is fitted on.
pub const MIN_REGRESSION_POINTS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("x and y have different lengths ({x} vs {y})")]
    LengthMismatch { x: usize, y: usize },
    #[error("Need at least {min} points for a regression, got {0}", min = MIN_REGRESSION_POINTS)]
    TooFewPoints(usize),
    #[error("All x values are equal; the regression slope is undefined")]
    ZeroVariance,
}

/// Descriptive statistics of one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for SeriesStats {
    fn default() -> Self {
        Self {
            count: 0,
            mean: f64::NAN,
            median: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
        }
    }
}

/// Least squares fit `y = intercept + slope * x`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Regression {
    pub intercept: f64,
    pub slope: f64,
    pub r: f64,
    pub r_squared: f64,
    pub p_value: f64,
    pub is_significant: bool,
    pub n: usize,
}

impl Regression {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Per-country summary printed by the command line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountrySummary {
    pub country: String,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub temperature: SeriesStats,
    pub attainment: SeriesStats,
    pub regression: Option<Regression>,
}

pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute descriptive statistics for an array of values.
    pub fn describe(values: &[f64]) -> SeriesStats {
        let n = values.len();
        if n == 0 {
            return SeriesStats::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };

        let std = if n > 1 { values.std_dev() } else { 0.0 };

        SeriesStats {
            count: n,
            mean: values.mean(),
            median,
            std,
            min: sorted[0],
            max: sorted[n - 1],
        }
    }

    /// Ordinary least squares with a two-tailed t-test on Pearson's r.
    pub fn linear_regression(x: &[f64], y: &[f64]) -> Result<Regression, StatsError> {
        if x.len() != y.len() {
            return Err(StatsError::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        let n = x.len();
        if n < MIN_REGRESSION_POINTS {
            return Err(StatsError::TooFewPoints(n));
        }

        let x_var = x.variance();
        if x_var == 0.0 {
            return Err(StatsError::ZeroVariance);
        }
        let y_var = y.variance();
        let cov = x.covariance(y);

        let slope = cov / x_var;
        let intercept = y.mean() - slope * x.mean();

        // A flat y has no linear relationship to test.
        if y_var == 0.0 {
            return Ok(Regression {
                intercept,
                slope,
                r: 0.0,
                r_squared: 0.0,
                p_value: 1.0,
                is_significant: false,
                n,
            });
        }

        let r = (cov / (x_var.sqrt() * y_var.sqrt())).clamp(-1.0, 1.0);
        let p_value = Self::correlation_p_value(r, n);

        Ok(Regression {
            intercept,
            slope,
            r,
            r_squared: r * r,
            p_value,
            is_significant: p_value <= SIGNIFICANCE_THRESHOLD,
            n,
        })
    }

    /// Two-tailed p-value of `r` under Student's t with n - 2 degrees of freedom.
    fn correlation_p_value(r: f64, n: usize) -> f64 {
        let df = (n - 2) as f64;
        let denom = 1.0 - r * r;
        if denom <= 0.0 {
            return 0.0;
        }
        let t = r * (df / denom).sqrt();

        match StudentsT::new(0.0, 1.0, df) {
            Ok(dist) => 2.0 * (1.0 - dist.cdf(t.abs())),
            Err(_) => f64::NAN,
        }
    }

    /// Statistics and regression of one country's joined rows.
    pub fn country_summary(table: &JoinedTable, country: &str) -> CountrySummary {
        let rows = table.for_country(country);
        let temperatures: Vec<f64> = rows.iter().map(|r| r.average_temperature).collect();
        let attainment: Vec<f64> = rows.iter().map(|r| r.attainment_value).collect();

        let regression = match Self::linear_regression(&temperatures, &attainment) {
            Ok(regression) => Some(regression),
            Err(e) => {
                debug!(country, error = %e, "no regression for country");
                None
            }
        };

        CountrySummary {
            country: rows
                .first()
                .map(|r| r.country.clone())
                .unwrap_or_else(|| country.to_string()),
            first_year: rows.first().map(|r| r.year),
            last_year: rows.last().map(|r| r.year),
            temperature: Self::describe(&temperatures),
            attainment: Self::describe(&attainment),
            regression,
        }
    }
}
