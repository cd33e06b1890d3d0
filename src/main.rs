//! Climate & Education - command line entry point
//!
//! Loads the Barro-Lee and Berkeley Earth CSV files, joins them on country and
//! year, prints per-country statistics and renders the comparison charts.

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::Args;
use climate_edu::charts::{safe_file_name, ChartRenderer};
use climate_edu::data::{
    AgeSelection, DataLoader, DatasetJoiner, JoinReport, JoinedTable, MismatchSide,
};
use climate_edu::stats::{CountrySummary, StatsCalculator};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    run(&args)
}

fn run(args: &Args) -> Result<()> {
    let options = args.education_options()?;
    let aliases = args.alias_map()?;
    info!(aliases = aliases.len(), "country alias map ready");

    let education = DataLoader::load_education(&args.education, &options)
        .context("loading education data")?;
    let temperature =
        DataLoader::load_temperature(&args.temperature).context("loading temperature data")?;

    let (joined, report) = DatasetJoiner::join_with_report(&education, &temperature, &aliases);
    let table = JoinedTable::from(joined);
    if table.is_empty() {
        bail!("the two datasets have no country and year in common");
    }

    if let Some(path) = &args.export {
        table
            .write_csv(path)
            .with_context(|| format!("exporting joined table to {}", path.display()))?;
        info!(path = %path.display(), rows = table.len(), "exported joined table");
    }

    let summaries: Vec<CountrySummary> = table
        .countries()
        .iter()
        .map(|country| StatsCalculator::country_summary(&table, country))
        .collect();
    print_summaries(&summaries);
    print_unmatched(&report);

    if let Some(path) = &args.summary_json {
        let json = serde_json::to_string_pretty(&summaries)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }

    let charts = render_charts(args, options.ages, &table)?;

    if args.open {
        if let Some(first) = charts.first() {
            if let Err(e) = open::that(first) {
                warn!(path = %first.display(), error = %e, "could not open chart");
            }
        }
    }

    Ok(())
}

fn render_charts(args: &Args, ages: AgeSelection, table: &JoinedTable) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    let label = args.measure.label();
    let mut written = Vec::new();

    let cross_country = args.output_dir.join("cross_country.png");
    ChartRenderer::render_cross_country(&table.latest_per_country(), label, &cross_country)?;
    written.push(cross_country);

    for country in &args.countries {
        let rows = table.for_country(country);
        if rows.is_empty() {
            bail!("no joined data for country '{country}'");
        }
        let name = safe_file_name(&rows[0].country);

        let series = args.output_dir.join(format!("{name}_time_series.png"));
        ChartRenderer::render_time_series(&rows[0].country, &rows, label, ages, &series)?;
        written.push(series);

        let temperatures: Vec<f64> = rows.iter().map(|r| r.average_temperature).collect();
        let attainment: Vec<f64> = rows.iter().map(|r| r.attainment_value).collect();
        match StatsCalculator::linear_regression(&temperatures, &attainment) {
            Ok(regression) => {
                let path = args.output_dir.join(format!("{name}_regression.png"));
                ChartRenderer::render_regression(&rows[0].country, &rows, &regression, label, &path)?;
                written.push(path);
            }
            Err(e) => warn!(country = %rows[0].country, error = %e, "skipping regression chart"),
        }
    }

    Ok(written)
}

fn print_summaries(summaries: &[CountrySummary]) {
    println!(
        "{:<32} {:>9} {:>8} {:>10} {:>10} {:>8} {:>8}",
        "Country", "Years", "Points", "Temp mean", "Attn mean", "r", "p"
    );
    for s in summaries {
        let years = match (s.first_year, s.last_year) {
            (Some(first), Some(last)) => format!("{first}-{last}"),
            _ => "-".to_string(),
        };
        let (r, p) = s
            .regression
            .as_ref()
            .map(|reg| (format!("{:.2}", reg.r), format!("{:.3}", reg.p_value)))
            .unwrap_or_else(|| ("-".to_string(), "-".to_string()));

        println!(
            "{:<32} {:>9} {:>8} {:>10.2} {:>10.2} {:>8} {:>8}",
            s.country, years, s.attainment.count, s.temperature.mean, s.attainment.mean, r, p
        );
    }
}

/// Education countries with no temperature data at all usually need an alias.
fn print_unmatched(report: &JoinReport) {
    let unmatched = report.unmatched_countries(MismatchSide::EducationOnly);
    if unmatched.is_empty() {
        return;
    }
    println!();
    println!("No temperature data for {} countries (add them to --aliases):", unmatched.len());
    for country in unmatched {
        println!("  {country}");
    }
}
