//! Data module - CSV loading, country reconciliation and the join

mod aliases;
mod joiner;
mod loader;
mod records;
mod table;

pub use aliases::{normalize_key, normalize_spacing, AliasError, CountryAliasMap};
pub use joiner::{DatasetJoiner, JoinMismatch, JoinReport, MismatchSide};
pub use loader::{annual_means, parse_date, DataLoader, LoaderError};
pub use records::{
    AgeSelection, AnnualTemperature, AttainmentMeasure, EducationOptions, EducationRecord,
    JoinedRecord, TemperatureRecord, UnknownMeasure,
};
pub use table::{JoinedTable, TableError};
