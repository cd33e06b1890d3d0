//! Joined Table
//! The aligned rows handed to the chart renderer, with Polars export.

use crate::data::aliases::normalize_key;
use crate::data::records::JoinedRecord;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Failed to create {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinedTable {
    records: Vec<JoinedRecord>,
}

impl From<Vec<JoinedRecord>> for JoinedTable {
    fn from(records: Vec<JoinedRecord>) -> Self {
        Self { records }
    }
}

impl JoinedTable {
    pub fn records(&self) -> &[JoinedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted unique country names.
    pub fn countries(&self) -> Vec<String> {
        let mut countries: Vec<String> = self.records.iter().map(|r| r.country.clone()).collect();
        countries.sort();
        countries.dedup();
        countries
    }

    /// Rows for one country (case and spacing insensitive), sorted by year.
    pub fn for_country(&self, country: &str) -> Vec<JoinedRecord> {
        let key = normalize_key(country);
        let mut rows: Vec<JoinedRecord> = self
            .records
            .iter()
            .filter(|r| normalize_key(&r.country) == key)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.year);
        rows
    }

    /// The most recent row of every country, sorted by country.
    pub fn latest_per_country(&self) -> Vec<JoinedRecord> {
        let mut latest: BTreeMap<&str, &JoinedRecord> = BTreeMap::new();
        for record in &self.records {
            latest
                .entry(record.country.as_str())
                .and_modify(|current| {
                    if record.year > current.year {
                        *current = record;
                    }
                })
                .or_insert(record);
        }
        latest.into_values().cloned().collect()
    }

    /// Columns: country, year, attainment_value, average_temperature.
    pub fn to_dataframe(&self) -> Result<DataFrame, TableError> {
        let countries: Vec<String> = self.records.iter().map(|r| r.country.clone()).collect();
        let years: Vec<i32> = self.records.iter().map(|r| r.year).collect();
        let attainment: Vec<f64> = self.records.iter().map(|r| r.attainment_value).collect();
        let temperature: Vec<f64> = self.records.iter().map(|r| r.average_temperature).collect();

        let df = DataFrame::new(vec![
            Column::new("country".into(), countries),
            Column::new("year".into(), years),
            Column::new("attainment_value".into(), attainment),
            Column::new("average_temperature".into(), temperature),
        ])?;

        Ok(df)
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), TableError> {
        let path = path.as_ref();
        let mut df = self.to_dataframe()?;
        let mut file = File::create(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)?;

        Ok(())
    }
}
