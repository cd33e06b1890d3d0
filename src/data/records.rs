//! Record types shared by the loaders, the joiner and the chart renderer.

use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One Barro-Lee row (or the average of several age-group rows) for a
/// country and year.
#[derive(Debug, Clone, PartialEq)]
pub struct EducationRecord {
    pub country: String,
    pub year: i32,
    pub age_from: u32,
    pub age_to: u32,
    pub attainment_value: f64,
}

/// One monthly Berkeley Earth reading.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureRecord {
    pub country: String,
    pub date: NaiveDate,
    pub average_temperature: f64,
}

impl TemperatureRecord {
    pub fn year(&self) -> i32 {
        self.date.year()
    }
}

/// Mean of all readings for one country and year.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnualTemperature {
    pub country: String,
    pub year: i32,
    pub average_temperature: f64,
    pub readings: usize,
}

/// A country/year present in both datasets.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRecord {
    pub country: String,
    pub year: i32,
    pub attainment_value: f64,
    pub average_temperature: f64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown attainment measure '{0}'")]
pub struct UnknownMeasure(pub String);

/// Which Barro-Lee column is used as the attainment value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttainmentMeasure {
    PercentNoSchooling,
    PercentPrimary,
    PercentCompletePrimary,
    PercentSecondary,
    PercentCompleteSecondary,
    PercentTertiary,
    PercentCompleteTertiary,
    #[default]
    AverageYears,
    AverageYearsPrimary,
    AverageYearsSecondary,
    AverageYearsTertiary,
}

impl AttainmentMeasure {
    pub const ALL: [AttainmentMeasure; 11] = [
        AttainmentMeasure::PercentNoSchooling,
        AttainmentMeasure::PercentPrimary,
        AttainmentMeasure::PercentCompletePrimary,
        AttainmentMeasure::PercentSecondary,
        AttainmentMeasure::PercentCompleteSecondary,
        AttainmentMeasure::PercentTertiary,
        AttainmentMeasure::PercentCompleteTertiary,
        AttainmentMeasure::AverageYears,
        AttainmentMeasure::AverageYearsPrimary,
        AttainmentMeasure::AverageYearsSecondary,
        AttainmentMeasure::AverageYearsTertiary,
    ];

    /// Header of the Barro-Lee column holding this measure.
    pub fn column(self) -> &'static str {
        match self {
            AttainmentMeasure::PercentNoSchooling => "lu",
            AttainmentMeasure::PercentPrimary => "lp",
            AttainmentMeasure::PercentCompletePrimary => "lpc",
            AttainmentMeasure::PercentSecondary => "ls",
            AttainmentMeasure::PercentCompleteSecondary => "lsc",
            AttainmentMeasure::PercentTertiary => "lh",
            AttainmentMeasure::PercentCompleteTertiary => "lhc",
            AttainmentMeasure::AverageYears => "yr_sch",
            AttainmentMeasure::AverageYearsPrimary => "yr_sch_pri",
            AttainmentMeasure::AverageYearsSecondary => "yr_sch_sec",
            AttainmentMeasure::AverageYearsTertiary => "yr_sch_ter",
        }
    }

    /// Kebab-case name accepted on the command line.
    pub fn name(self) -> &'static str {
        match self {
            AttainmentMeasure::PercentNoSchooling => "no-schooling",
            AttainmentMeasure::PercentPrimary => "primary",
            AttainmentMeasure::PercentCompletePrimary => "complete-primary",
            AttainmentMeasure::PercentSecondary => "secondary",
            AttainmentMeasure::PercentCompleteSecondary => "complete-secondary",
            AttainmentMeasure::PercentTertiary => "tertiary",
            AttainmentMeasure::PercentCompleteTertiary => "complete-tertiary",
            AttainmentMeasure::AverageYears => "years",
            AttainmentMeasure::AverageYearsPrimary => "years-primary",
            AttainmentMeasure::AverageYearsSecondary => "years-secondary",
            AttainmentMeasure::AverageYearsTertiary => "years-tertiary",
        }
    }

    /// Human readable axis label.
    pub fn label(self) -> &'static str {
        match self {
            AttainmentMeasure::PercentNoSchooling => "Percentage of No Schooling",
            AttainmentMeasure::PercentPrimary => "Percentage of Primary Schooling",
            AttainmentMeasure::PercentCompletePrimary => "Percentage of Complete Primary Schooling",
            AttainmentMeasure::PercentSecondary => "Percentage of Secondary Schooling",
            AttainmentMeasure::PercentCompleteSecondary => {
                "Percentage of Complete Secondary Schooling"
            }
            AttainmentMeasure::PercentTertiary => "Percentage of Tertiary Schooling",
            AttainmentMeasure::PercentCompleteTertiary => {
                "Percentage of Complete Tertiary Schooling"
            }
            AttainmentMeasure::AverageYears => "Average Years of Schooling",
            AttainmentMeasure::AverageYearsPrimary => "Average Years of Primary Schooling",
            AttainmentMeasure::AverageYearsSecondary => "Average Years of Secondary Schooling",
            AttainmentMeasure::AverageYearsTertiary => "Average Years of Tertiary Schooling",
        }
    }
}

impl fmt::Display for AttainmentMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AttainmentMeasure {
    type Err = UnknownMeasure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.column().eq_ignore_ascii_case(wanted) || m.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownMeasure(s.to_string()))
    }
}

/// Which Barro-Lee age groups feed the attainment value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgeSelection {
    /// Only the 15+ total-population aggregate rows.
    #[default]
    Total,
    /// Average of every age-group row inside `from..=to`.
    Range { from: u32, to: u32 },
}

/// Barro-Lee aggregate rows span `agefrom = 15` to `ageto = 999`.
pub const TOTAL_AGE_FROM: u32 = 15;
pub const TOTAL_AGE_TO: u32 = 999;

impl AgeSelection {
    pub fn accepts(&self, age_from: u32, age_to: u32) -> bool {
        match *self {
            AgeSelection::Total => age_from == TOTAL_AGE_FROM && age_to == TOTAL_AGE_TO,
            AgeSelection::Range { from, to } => {
                // the aggregate row would double count every group it covers
                age_to != TOTAL_AGE_TO && from <= age_from && age_to <= to
            }
        }
    }

    pub fn bounds(&self) -> (u32, u32) {
        match *self {
            AgeSelection::Total => (TOTAL_AGE_FROM, TOTAL_AGE_TO),
            AgeSelection::Range { from, to } => (from, to),
        }
    }
}

impl fmt::Display for AgeSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bounds() {
            (from, TOTAL_AGE_TO) => write!(f, "Ages {from}+"),
            (from, to) => write!(f, "Ages {from} - {to}"),
        }
    }
}

/// Options for [`crate::data::DataLoader::load_education`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EducationOptions {
    pub measure: AttainmentMeasure,
    pub ages: AgeSelection,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_parses_column_and_cli_names() {
        assert_eq!("yr_sch".parse(), Ok(AttainmentMeasure::AverageYears));
        assert_eq!("LHC".parse(), Ok(AttainmentMeasure::PercentCompleteTertiary));
        assert_eq!(
            "years-secondary".parse(),
            Ok(AttainmentMeasure::AverageYearsSecondary)
        );
        assert_eq!(
            "bogus".parse::<AttainmentMeasure>(),
            Err(UnknownMeasure("bogus".to_string()))
        );
    }

    #[test]
    fn every_measure_has_a_distinct_column() {
        let mut columns: Vec<_> = AttainmentMeasure::ALL.iter().map(|m| m.column()).collect();
        columns.sort();
        columns.dedup();
        assert_eq!(columns.len(), AttainmentMeasure::ALL.len());
    }

    #[test]
    fn total_selection_only_takes_aggregate_rows() {
        let total = AgeSelection::Total;
        assert!(total.accepts(15, 999));
        assert!(!total.accepts(25, 999));
        assert!(!total.accepts(15, 19));
    }

    #[test]
    fn range_selection_takes_groups_inside_bounds() {
        let range = AgeSelection::Range { from: 15, to: 29 };
        assert!(range.accepts(15, 19));
        assert!(range.accepts(25, 29));
        assert!(!range.accepts(30, 34));
        assert!(!range.accepts(15, 999));
    }

    #[test]
    fn age_selection_describes_its_bounds() {
        assert_eq!(AgeSelection::Total.to_string(), "Ages 15+");
        assert_eq!(AgeSelection::Range { from: 25, to: 64 }.to_string(), "Ages 25 - 64");
    }

    #[test]
    fn temperature_year_comes_from_date() {
        let record = TemperatureRecord {
            country: "Chile".into(),
            date: NaiveDate::from_ymd_opt(2010, 7, 1).unwrap(),
            average_temperature: 5.0,
        };
        assert_eq!(record.year(), 2010);
    }
}
