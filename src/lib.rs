//! Climate & Education - joins Barro-Lee education attainment with Berkeley
//! Earth land temperatures and charts the result.

pub mod charts;
pub mod data;
pub mod stats;
