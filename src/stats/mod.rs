//! Stats module - descriptive statistics and regression

mod calculator;

pub use calculator::{
    CountrySummary, Regression, SeriesStats, StatsCalculator, StatsError,
    MIN_REGRESSION_POINTS, SIGNIFICANCE_THRESHOLD,
};
