//! Dataset Joiner Module
//! Aligns education and temperature records on (country, year).

use crate::data::aliases::{normalize_key, CountryAliasMap};
use crate::data::records::{EducationRecord, JoinedRecord, TemperatureRecord};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Which source a mismatched key was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MismatchSide {
    EducationOnly,
    TemperatureOnly,
}

/// A (country, year) present in one source but not the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinMismatch {
    pub country: String,
    pub year: i32,
    pub side: MismatchSide,
}

/// Outcome of a join besides the matched rows. Mismatches never fail a join.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
    pub matched: usize,
    /// Countries with at least one matched year.
    pub matched_countries: BTreeSet<String>,
    pub mismatches: Vec<JoinMismatch>,
}

impl JoinReport {
    pub fn count(&self, side: MismatchSide) -> usize {
        self.mismatches.iter().filter(|m| m.side == side).count()
    }

    /// Countries that only ever appear on `side`: no year of theirs matched.
    pub fn unmatched_countries(&self, side: MismatchSide) -> BTreeSet<String> {
        self.mismatches
            .iter()
            .filter(|m| m.side == side && !self.matched_countries.contains(&m.country))
            .map(|m| m.country.clone())
            .collect()
    }
}

type Key = (String, i32);

/// Accumulates one side of the join in order of first appearance.
struct Grouped {
    order: Vec<Key>,
    groups: HashMap<Key, Group>,
}

struct Group {
    country: String,
    sum: f64,
    count: usize,
}

impl Grouped {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            groups: HashMap::new(),
        }
    }

    fn add(&mut self, country: String, year: i32, value: f64) {
        let key = (normalize_key(&country), year);
        let order = &mut self.order;
        let group = self.groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Group {
                country,
                sum: 0.0,
                count: 0,
            }
        });
        group.sum += value;
        group.count += 1;
    }

    fn mean(&self, key: &Key) -> Option<(&str, f64)> {
        self.groups
            .get(key)
            .map(|g| (g.country.as_str(), g.sum / g.count as f64))
    }
}

/// Joins Barro-Lee education records with Berkeley Earth temperatures.
pub struct DatasetJoiner;

impl DatasetJoiner {
    /// Matched rows only. See [`DatasetJoiner::join_with_report`].
    pub fn join(
        education: &[EducationRecord],
        temperature: &[TemperatureRecord],
        aliases: &CountryAliasMap,
    ) -> Vec<JoinedRecord> {
        Self::join_with_report(education, temperature, aliases).0
    }

    /// Group both inputs by (normalized country, year) after alias
    /// resolution and emit a row for every key present on both sides.
    ///
    /// Temperature readings of a key are averaged, as are duplicate education
    /// records. Rows come out in order of first appearance in `education`.
    pub fn join_with_report(
        education: &[EducationRecord],
        temperature: &[TemperatureRecord],
        aliases: &CountryAliasMap,
    ) -> (Vec<JoinedRecord>, JoinReport) {
        let mut edu = Grouped::new();
        for record in education {
            let country = aliases.resolve(&record.country).into_owned();
            edu.add(country, record.year, record.attainment_value);
        }

        let mut temp = Grouped::new();
        for record in temperature {
            let country = aliases.resolve(&record.country).into_owned();
            temp.add(country, record.year(), record.average_temperature);
        }

        let mut joined = Vec::new();
        let mut report = JoinReport::default();

        for key in &edu.order {
            let Some((country, attainment_value)) = edu.mean(key) else {
                continue;
            };
            match temp.mean(key) {
                Some((_, average_temperature)) => {
                    report.matched_countries.insert(country.to_string());
                    joined.push(JoinedRecord {
                        country: country.to_string(),
                        year: key.1,
                        attainment_value,
                        average_temperature,
                    });
                }
                None => report.mismatches.push(JoinMismatch {
                    country: country.to_string(),
                    year: key.1,
                    side: MismatchSide::EducationOnly,
                }),
            }
        }

        for key in &temp.order {
            if edu.groups.contains_key(key) {
                continue;
            }
            if let Some((country, _)) = temp.mean(key) {
                report.mismatches.push(JoinMismatch {
                    country: country.to_string(),
                    year: key.1,
                    side: MismatchSide::TemperatureOnly,
                });
            }
        }

        report.matched = joined.len();
        log_report(&report);

        (joined, report)
    }
}

fn log_report(report: &JoinReport) {
    info!(
        matched = report.matched,
        education_only = report.count(MismatchSide::EducationOnly),
        temperature_only = report.count(MismatchSide::TemperatureOnly),
        "joined datasets"
    );

    for country in report.unmatched_countries(MismatchSide::EducationOnly) {
        warn!(%country, "no temperature data for country; add an alias if it is spelled differently");
    }
    for country in report.unmatched_countries(MismatchSide::TemperatureOnly) {
        debug!(%country, "no education data for country");
    }
}
