//! CSV Data Loader Module
//! Reads the Barro-Lee and Berkeley Earth CSV files with Polars and turns
//! their rows into typed records.

use crate::data::records::{
    AgeSelection, AnnualTemperature, AttainmentMeasure, EducationOptions, EducationRecord,
    TemperatureRecord,
};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },
    #[error("{}: missing required column '{column}' (is this the right file?)", path.display())]
    MissingColumn { path: PathBuf, column: String },
    #[error("{}: row {row}: invalid {column} value '{value}': {reason}", path.display())]
    Parse {
        path: PathBuf,
        row: usize,
        column: String,
        value: String,
        reason: String,
    },
    #[error("Invalid age range {from}-{to}: start age must be less than end age")]
    InvalidAgeRange { from: u32, to: u32 },
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Failed to load CSV {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },
}

/// Barro-Lee columns read regardless of the selected measure.
pub const EDUCATION_COUNTRY: &str = "country";
pub const EDUCATION_YEAR: &str = "year";
pub const EDUCATION_SEX: &str = "sex";
pub const EDUCATION_AGE_FROM: &str = "agefrom";
pub const EDUCATION_AGE_TO: &str = "ageto";
/// `sex` value of the both-sexes rows.
pub const TOTAL_SEX: &str = "MF";

/// Berkeley Earth columns.
pub const TEMPERATURE_DATE: &str = "dt";
pub const TEMPERATURE_VALUE: &str = "AverageTemperature";
pub const TEMPERATURE_COUNTRY: &str = "Country";

/// Pseudo column named in errors about a whole record.
pub const RECORD: &str = "<record>";

/// A CSV file read with every column as a string.
///
/// Rows are numbered from 1, header excluded.
struct RawTable {
    path: PathBuf,
    df: DataFrame,
}

impl RawTable {
    fn read(path: &Path) -> Result<Self, LoaderError> {
        if !path.is_file() {
            return Err(LoaderError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        check_record_lengths(path)?;

        // A zero-length inference window reads every column as String so the
        // field parsing below can report the offending row.
        let df = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()
            .and_then(|lazy| lazy.collect())
            .map_err(|source| LoaderError::Csv {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(path = %path.display(), rows = df.height(), "read csv");

        Ok(Self {
            path: path.to_path_buf(),
            df,
        })
    }

    fn height(&self) -> usize {
        self.df.height()
    }

    fn column(&self, name: &str) -> Result<&StringChunked, LoaderError> {
        self.optional_column(name)
            .ok_or_else(|| LoaderError::MissingColumn {
                path: self.path.clone(),
                column: name.to_string(),
            })
    }

    fn optional_column(&self, name: &str) -> Option<&StringChunked> {
        self.df
            .column(name)
            .ok()
            .and_then(|col| col.as_materialized_series().str().ok())
    }

    fn parse_error(&self, row: usize, column: &str, value: &str, reason: impl Display) -> LoaderError {
        LoaderError::Parse {
            path: self.path.clone(),
            row,
            column: column.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Parse a required field.
    fn parse<T>(&self, row: usize, column: &str, raw: Option<&str>) -> Result<T, LoaderError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let value = raw.map(str::trim).unwrap_or_default();
        if value.is_empty() {
            return Err(self.parse_error(row, column, value, "missing value"));
        }
        value
            .parse::<T>()
            .map_err(|e| self.parse_error(row, column, value, e))
    }

    /// Parse a required floating point field, rejecting NaN and infinities.
    fn parse_finite(&self, row: usize, column: &str, raw: Option<&str>) -> Result<f64, LoaderError> {
        let value: f64 = self.parse(row, column, raw)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(self.parse_error(row, column, raw.unwrap_or_default(), "not a finite number"))
        }
    }

    fn text(&self, row: usize, column: &str, raw: Option<&str>) -> Result<String, LoaderError> {
        let value = raw.map(str::trim).unwrap_or_default();
        if value.is_empty() {
            Err(self.parse_error(row, column, value, "missing value"))
        } else {
            Ok(value.to_string())
        }
    }
}

/// Every record must have as many fields as the header.
fn check_record_lengths(path: &Path) -> Result<(), LoaderError> {
    let read_error = |source: csv::Error| match source.position().map(|pos| pos.record()) {
        Some(record) if record > 0 => LoaderError::Parse {
            path: path.to_path_buf(),
            row: record as usize,
            column: RECORD.to_string(),
            value: String::new(),
            reason: source.to_string(),
        },
        _ => LoaderError::Read {
            path: path.to_path_buf(),
            source,
        },
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(read_error)?;
    let expected = reader.headers().map_err(read_error)?.len();

    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(read_error)?;
        if record.len() != expected {
            return Err(LoaderError::Parse {
                path: path.to_path_buf(),
                row: idx + 1,
                column: RECORD.to_string(),
                value: format!("{} fields", record.len()),
                reason: format!("header has {expected} fields"),
            });
        }
    }
    Ok(())
}

/// Parse a Berkeley Earth `dt` value: `YYYY-MM-DD` or `YYYY-MM`.
pub fn parse_date(value: &str) -> Result<NaiveDate, chrono::ParseError> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|err| match value.len() {
            7 => NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d"),
            _ => Err(err),
        })
}

/// Loads the two source datasets.
pub struct DataLoader;

impl DataLoader {
    /// Load Barro-Lee rows matching `options`.
    ///
    /// With [`AgeSelection::Total`] every accepted row becomes one record, in
    /// file order. With [`AgeSelection::Range`] the selected measure is
    /// averaged over the accepted age groups of each country and year, in
    /// order of first appearance.
    pub fn load_education(
        path: impl AsRef<Path>,
        options: &EducationOptions,
    ) -> Result<Vec<EducationRecord>, LoaderError> {
        if let AgeSelection::Range { from, to } = options.ages {
            if from >= to {
                return Err(LoaderError::InvalidAgeRange { from, to });
            }
        }

        let table = RawTable::read(path.as_ref())?;
        let measure_column = options.measure.column();

        let countries = table.column(EDUCATION_COUNTRY)?;
        let years = table.column(EDUCATION_YEAR)?;
        let ages_from = table.column(EDUCATION_AGE_FROM)?;
        let ages_to = table.column(EDUCATION_AGE_TO)?;
        let sexes = table.optional_column(EDUCATION_SEX);
        table.column(measure_column)?;
        let measures: Vec<(AttainmentMeasure, &StringChunked)> = AttainmentMeasure::ALL
            .iter()
            .filter_map(|&m| table.optional_column(m.column()).map(|col| (m, col)))
            .collect();

        let mut records = Vec::new();
        let mut skipped = 0usize;

        for idx in 0..table.height() {
            let row = idx + 1;

            // Every row is validated in full, including the ones filtered out.
            let country = table.text(row, EDUCATION_COUNTRY, countries.get(idx))?;
            let year: i32 = table.parse(row, EDUCATION_YEAR, years.get(idx))?;
            let age_from: u32 = table.parse(row, EDUCATION_AGE_FROM, ages_from.get(idx))?;
            let age_to: u32 = table.parse(row, EDUCATION_AGE_TO, ages_to.get(idx))?;
            let mut attainment_value = f64::NAN;
            for &(measure, column) in &measures {
                let value = table.parse_finite(row, measure.column(), column.get(idx))?;
                if measure == options.measure {
                    attainment_value = value;
                }
            }

            let total_sex = sexes.map_or(true, |sexes| {
                sexes.get(idx).map(str::trim) == Some(TOTAL_SEX)
            });
            if !total_sex || !options.ages.accepts(age_from, age_to) {
                skipped += 1;
                continue;
            }

            records.push(EducationRecord {
                country,
                year,
                age_from,
                age_to,
                attainment_value,
            });
        }

        let records = match options.ages {
            AgeSelection::Total => records,
            AgeSelection::Range { from, to } => average_age_groups(records, from, to),
        };

        info!(
            path = %table.path.display(),
            measure = measure_column,
            records = records.len(),
            skipped,
            "loaded education data"
        );

        Ok(records)
    }

    /// Load monthly Berkeley Earth readings.
    ///
    /// Rows with an empty `AverageTemperature` are missing readings and are
    /// skipped; their date must still be valid.
    pub fn load_temperature(path: impl AsRef<Path>) -> Result<Vec<TemperatureRecord>, LoaderError> {
        let table = RawTable::read(path.as_ref())?;

        let dates = table.column(TEMPERATURE_DATE)?;
        let temperatures = table.column(TEMPERATURE_VALUE)?;
        let countries = table.column(TEMPERATURE_COUNTRY)?;

        let mut records = Vec::with_capacity(table.height());
        let mut missing = 0usize;

        for idx in 0..table.height() {
            let row = idx + 1;

            let raw_date = dates.get(idx).unwrap_or_default();
            let date = parse_date(raw_date)
                .map_err(|e| table.parse_error(row, TEMPERATURE_DATE, raw_date.trim(), e))?;

            let raw_temperature = temperatures.get(idx).map(str::trim).unwrap_or_default();
            if raw_temperature.is_empty() {
                missing += 1;
                continue;
            }

            records.push(TemperatureRecord {
                country: table.text(row, TEMPERATURE_COUNTRY, countries.get(idx))?,
                date,
                average_temperature: table.parse_finite(
                    row,
                    TEMPERATURE_VALUE,
                    Some(raw_temperature),
                )?,
            });
        }

        info!(
            path = %table.path.display(),
            records = records.len(),
            missing,
            "loaded temperature data"
        );

        Ok(records)
    }

    /// Load monthly readings and reduce them to annual means.
    pub fn load_annual_temperature(
        path: impl AsRef<Path>,
    ) -> Result<Vec<AnnualTemperature>, LoaderError> {
        Self::load_temperature(path).map(|records| annual_means(&records))
    }
}

/// Average the readings of each (country, year), in order of first
/// appearance.
pub fn annual_means(records: &[TemperatureRecord]) -> Vec<AnnualTemperature> {
    let mut order: Vec<(&str, i32)> = Vec::new();
    let mut sums: HashMap<(&str, i32), (f64, usize)> = HashMap::new();

    for record in records {
        let key = (record.country.as_str(), record.year());
        let entry = sums.entry(key).or_insert_with(|| {
            order.push(key);
            (0.0, 0)
        });
        entry.0 += record.average_temperature;
        entry.1 += 1;
    }

    order
        .into_iter()
        .map(|key| {
            let (sum, readings) = sums[&key];
            AnnualTemperature {
                country: key.0.to_string(),
                year: key.1,
                average_temperature: sum / readings as f64,
                readings,
            }
        })
        .collect()
}

fn average_age_groups(records: Vec<EducationRecord>, from: u32, to: u32) -> Vec<EducationRecord> {
    let mut order: Vec<(String, i32)> = Vec::new();
    let mut sums: HashMap<(String, i32), (f64, usize)> = HashMap::new();

    for record in records {
        let key = (record.country, record.year);
        let entry = sums.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (0.0, 0)
        });
        entry.0 += record.attainment_value;
        entry.1 += 1;
    }

    order
        .into_iter()
        .map(|key| {
            let (sum, count) = sums[&key];
            EducationRecord {
                country: key.0,
                year: key.1,
                age_from: from,
                age_to: to,
                attainment_value: sum / count as f64,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const EDUCATION_HEADER: &str = "BLcode,country,year,sex,agefrom,ageto,lu,lp,lpc,ls,lsc,lh,lhc,yr_sch,yr_sch_pri,yr_sch_sec,yr_sch_ter,pop,WBcode,region_code";

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn education_row(country: &str, year: i32, from: u32, to: u32, yr_sch: &str) -> String {
        format!(
            "1,{country},{year},MF,{from},{to},10,20,15,30,20,10,5,{yr_sch},5.5,3.1,0.4,1000,CHL,LAC"
        )
    }

    #[test]
    fn date_accepts_day_and_month_precision() {
        assert_eq!(
            parse_date("1850-03-01").unwrap(),
            NaiveDate::from_ymd_opt(1850, 3, 1).unwrap()
        );
        assert_eq!(
            parse_date("2010-07").unwrap(),
            NaiveDate::from_ymd_opt(2010, 7, 1).unwrap()
        );
        assert!(parse_date("2010").is_err());
        assert!(parse_date("2010-13-01").is_err());
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn total_selection_skips_age_groups() {
        let file = csv_file(&[
            EDUCATION_HEADER.to_string(),
            education_row("Chile", 2010, 15, 999, "9.8"),
            education_row("Chile", 2010, 15, 19, "11.0"),
            education_row("Chile", 2010, 25, 999, "9.1"),
            education_row("Peru", 2010, 15, 999, "8.9"),
        ]
        .join("\n"));

        let records = DataLoader::load_education(file.path(), &EducationOptions::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].country, "Chile");
        assert_eq!(records[0].attainment_value, 9.8);
        assert_eq!(records[1].country, "Peru");
    }

    #[test]
    fn non_total_sex_rows_are_skipped() {
        let female = education_row("Chile", 2010, 15, 999, "9.7").replace(",MF,", ",F,");
        let file = csv_file(&[
            EDUCATION_HEADER.to_string(),
            female,
            education_row("Chile", 2010, 15, 999, "9.8"),
        ]
        .join("\n"));

        let records = DataLoader::load_education(file.path(), &EducationOptions::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].attainment_value, 9.8);
    }

    #[test]
    fn range_selection_averages_groups() {
        let file = csv_file(&[
            EDUCATION_HEADER.to_string(),
            education_row("Chile", 2010, 15, 19, "10.0"),
            education_row("Chile", 2010, 20, 24, "12.0"),
            education_row("Chile", 2010, 25, 29, "20.0"),
            education_row("Chile", 2010, 15, 999, "9.8"),
        ]
        .join("\n"));

        let options = EducationOptions {
            measure: AttainmentMeasure::AverageYears,
            ages: AgeSelection::Range { from: 15, to: 24 },
        };
        let records = DataLoader::load_education(file.path(), &options).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].attainment_value, 11.0);
        assert_eq!((records[0].age_from, records[0].age_to), (15, 24));
    }

    #[test]
    fn inverted_age_range_is_rejected() {
        let options = EducationOptions {
            measure: AttainmentMeasure::AverageYears,
            ages: AgeSelection::Range { from: 30, to: 20 },
        };
        let err = DataLoader::load_education("unused.csv", &options).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidAgeRange { from: 30, to: 20 }));
    }

    #[test]
    fn selected_measure_column_is_used() {
        let file = csv_file(&[
            EDUCATION_HEADER.to_string(),
            education_row("Chile", 2010, 15, 999, "9.8"),
        ]
        .join("\n"));

        let options = EducationOptions {
            measure: AttainmentMeasure::PercentTertiary,
            ages: AgeSelection::Total,
        };
        let records = DataLoader::load_education(file.path(), &options).unwrap();
        assert_eq!(records[0].attainment_value, 10.0);
    }

    #[test]
    fn malformed_value_names_row_and_column() {
        let file = csv_file(&[
            EDUCATION_HEADER.to_string(),
            education_row("Chile", 2010, 15, 999, "9.8"),
            education_row("Chile", 2015, 15, 999, "ten"),
        ]
        .join("\n"));

        let err = DataLoader::load_education(file.path(), &EducationOptions::default()).unwrap_err();
        match err {
            LoaderError::Parse { row, column, value, .. } => {
                assert_eq!(row, 2);
                assert_eq!(column, "yr_sch");
                assert_eq!(value, "ten");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn ragged_row_names_its_row() {
        let file = csv_file(&[
            EDUCATION_HEADER.to_string(),
            education_row("Chile", 2000, 15, 999, "9.0"),
            education_row("Chile", 2005, 15, 999, "9.2"),
            education_row("Chile", 2010, 15, 999, "9.8"),
            education_row("Chile", 2015, 15, 999, "10.1") + ",extra,fields",
        ]
        .join("\n"));

        let err = DataLoader::load_education(file.path(), &EducationOptions::default()).unwrap_err();
        match err {
            LoaderError::Parse { row, column, .. } => {
                assert_eq!(row, 4);
                assert_eq!(column, RECORD);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn short_temperature_row_names_its_row() {
        let file = csv_file(
            "dt,AverageTemperature,AverageTemperatureUncertainty,Country\n\
             2010-01-01,15.0,0.3,Chile\n\
             2010-02-01,14.0\n",
        );

        let err = DataLoader::load_temperature(file.path()).unwrap_err();
        assert!(matches!(err, LoaderError::Parse { row: 2, ref column, .. } if column == RECORD));
    }

    #[test]
    fn unselected_measure_is_still_validated() {
        let bad_lu = education_row("Chile", 2000, 15, 999, "9.0").replacen(",10,", ",abc,", 1);
        let file = csv_file(&[EDUCATION_HEADER.to_string(), bad_lu].join("\n"));

        let err = DataLoader::load_education(file.path(), &EducationOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::Parse { row: 1, ref column, ref value, .. } if column == "lu" && value == "abc"
        ));
    }

    #[test]
    fn filtered_rows_are_still_validated() {
        let file = csv_file(&[
            EDUCATION_HEADER.to_string(),
            education_row("Chile", 2000, 15, 999, "9.0"),
            education_row("Chile", 2000, 15, 19, "NOTANUMBER"),
        ]
        .join("\n"));

        let err = DataLoader::load_education(file.path(), &EducationOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::Parse { row: 2, ref column, .. } if column == "yr_sch"
        ));
    }

    #[test]
    fn wrong_file_reports_missing_column() {
        let file = csv_file("dt,AverageTemperature,AverageTemperatureUncertainty,Country\n2010-01-01,15.0,0.3,Chile\n");
        let err = DataLoader::load_education(file.path(), &EducationOptions::default()).unwrap_err();
        assert!(matches!(err, LoaderError::MissingColumn { ref column, .. } if column == "country"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = DataLoader::load_temperature("/no/such/GlobalLandTemperaturesByCountry.csv")
            .unwrap_err();
        assert!(matches!(err, LoaderError::FileNotFound { .. }));
    }

    #[test]
    fn temperature_skips_missing_readings() {
        let file = csv_file(
            "dt,AverageTemperature,AverageTemperatureUncertainty,Country\n\
             2010-01-01,15.0,0.3,Chile\n\
             2010-02-01,,,Chile\n\
             2010-07-01,5.0,0.2,Chile\n",
        );

        let records = DataLoader::load_temperature(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2010, 7, 1).unwrap());
    }

    #[test]
    fn temperature_rejects_bad_dates() {
        let file = csv_file(
            "dt,AverageTemperature,AverageTemperatureUncertainty,Country\n\
             2010-01-01,15.0,0.3,Chile\n\
             01/02/2010,14.0,0.3,Chile\n",
        );

        let err = DataLoader::load_temperature(file.path()).unwrap_err();
        assert!(matches!(err, LoaderError::Parse { row: 2, ref column, .. } if column == "dt"));
    }

    #[test]
    fn annual_means_average_per_country_year() {
        let file = csv_file(
            "dt,AverageTemperature,AverageTemperatureUncertainty,Country\n\
             2010-01-01,15.0,0.3,Chile\n\
             2010-07-01,5.0,0.2,Chile\n\
             2011-01-01,16.0,0.2,Chile\n\
             2010-01-01,-3.0,0.2,Norway\n",
        );

        let annual = DataLoader::load_annual_temperature(file.path()).unwrap();
        assert_eq!(annual.len(), 3);
        assert_eq!(annual[0].country, "Chile");
        assert_eq!(annual[0].year, 2010);
        assert_eq!(annual[0].average_temperature, 10.0);
        assert_eq!(annual[0].readings, 2);
        assert_eq!(annual[2].country, "Norway");
    }
}
