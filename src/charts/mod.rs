//! Charts module - Chart rendering

mod renderer;

pub use renderer::{padded_range, safe_file_name, ChartError, ChartRenderer, CHART_SIZE};
