//! Command line arguments and the run settings derived from them.

use anyhow::{bail, Context, Result};
use clap::Parser;
use climate_edu::data::{AgeSelection, AttainmentMeasure, CountryAliasMap, EducationOptions};
use std::path::PathBuf;

/// Compare education attainment with historical land temperatures.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Barro-Lee educational attainment CSV
    #[arg(long, value_name = "CSV")]
    pub education: PathBuf,

    /// Berkeley Earth GlobalLandTemperaturesByCountry.csv
    #[arg(long, value_name = "CSV")]
    pub temperature: PathBuf,

    /// JSON object mapping alternate country spellings to canonical names
    #[arg(long, value_name = "JSON")]
    pub aliases: Option<PathBuf>,

    /// Do not apply the built-in alias table
    #[arg(long)]
    pub no_builtin_aliases: bool,

    /// Attainment column (e.g. yr_sch, lhc) or name (e.g. years, complete-tertiary)
    #[arg(long, default_value = "yr_sch")]
    pub measure: AttainmentMeasure,

    /// Average the age groups from this age instead of the 15+ total rows
    #[arg(long, requires = "age_to")]
    pub age_from: Option<u32>,

    /// Upper age of the averaged age groups
    #[arg(long, requires = "age_from")]
    pub age_to: Option<u32>,

    /// Render time series and regression charts for this country (repeatable)
    #[arg(long = "country", value_name = "NAME")]
    pub countries: Vec<String>,

    /// Directory the charts are written to
    #[arg(long, default_value = "charts")]
    pub output_dir: PathBuf,

    /// Also write the joined table to this CSV file
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Write per-country summaries as JSON
    #[arg(long, value_name = "JSON")]
    pub summary_json: Option<PathBuf>,

    /// Open the first rendered chart with the system viewer
    #[arg(long)]
    pub open: bool,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn education_options(&self) -> Result<EducationOptions> {
        let ages = match (self.age_from, self.age_to) {
            (Some(from), Some(to)) => {
                if from >= to {
                    bail!("--age-from ({from}) must be less than --age-to ({to})");
                }
                AgeSelection::Range { from, to }
            }
            _ => AgeSelection::Total,
        };

        Ok(EducationOptions {
            measure: self.measure,
            ages,
        })
    }

    pub fn alias_map(&self) -> Result<CountryAliasMap> {
        let mut aliases = if self.no_builtin_aliases {
            CountryAliasMap::new()
        } else {
            CountryAliasMap::builtin()
        };

        if let Some(path) = &self.aliases {
            let custom = CountryAliasMap::from_json_file(path)?;
            aliases
                .merge(custom)
                .with_context(|| format!("merging aliases from {}", path.display()))?;
        }

        Ok(aliases)
    }

    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
