//! control-runner: headless matched-control runner.
//!
//! Usage:
//!   control-runner --input for_controls.csv --mode properties --output-dir ./controls
//!   control-runner --input for_controls.csv --mode statistics --config match.json --db run.db
//!
//! Flags:
//!   --sequential       match every treated unit against the whole control table
//!   --real-time YEAR   only match treated units sold in YEAR

use anyhow::{bail, Context, Result};
use leasecontrols_core::{
    coalesce::NearestControls,
    config::MatchConfig,
    engine::{ControlEngine, MatchReport},
    output::IDENTITY_HEADER,
    record::Transaction,
    store::ControlStore,
    types::RunId,
};
use std::env;
use std::path::Path;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let input = flag_value(&args, "--input").context("--input is required")?;
    let mode = flag_value(&args, "--mode").unwrap_or("statistics");
    let output_dir = flag_value(&args, "--output-dir").unwrap_or("./controls");
    let db = flag_value(&args, "--db");

    let mut config = match flag_value(&args, "--config") {
        Some(path) => MatchConfig::load(path)?,
        None => MatchConfig::default(),
    };
    if args.iter().any(|a| a == "--sequential") {
        config.parallelize = false;
    }
    if let Some(year) = flag_value(&args, "--real-time") {
        config.real_time_year = Some(year.parse().context("--real-time expects a year")?);
    }
    config.validate()?;

    println!("control-runner");
    println!("  input:       {input}");
    println!("  mode:        {mode}");
    println!("  output_dir:  {output_dir}");
    println!("  radii (km):  {:?}", config.radius_ladder);
    println!("  margin:      {}", config.duration_margin);
    println!();

    let rows = read_transactions(input)?;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Cannot create {output_dir}"))?;

    let run_id: RunId = format!("run-{}", uuid::Uuid::new_v4());
    let mut store = match db {
        Some(path) => {
            let store = ControlStore::open(path)?;
            store.migrate()?;
            store.insert_run(&run_id, mode, &config, env!("CARGO_PKG_VERSION"))?;
            Some(store)
        }
        None => None,
    };

    match mode {
        "properties" => run_properties(&rows, config, output_dir, &run_id, store.as_mut())?,
        "statistics" => run_statistics(&rows, config, output_dir, &run_id, store.as_mut())?,
        other => bail!("Unknown mode '{other}', expected 'properties' or 'statistics'"),
    }
    Ok(())
}

fn run_properties(
    rows:       &[Transaction],
    config:     MatchConfig,
    output_dir: &str,
    run_id:     &str,
    store:      Option<&mut ControlStore>,
) -> Result<()> {
    let engine = ControlEngine::new(config)?;
    let run = engine.match_properties(rows)?;

    let path = Path::new(output_dir).join("control_properties.csv");
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(IDENTITY_HEADER)?;
    for row in &run.rows {
        writer.write_record(row.record())?;
    }
    writer.flush()?;

    if let Some(store) = store {
        store.insert_identity_rows(run_id, &run.rows)?;
        store.insert_report(run_id, "", &run.report)?;
    }

    print_summary("properties", &run.report);
    println!("  rows written:     {}", run.rows.len());
    println!("  saved to:         {}", path.display());
    Ok(())
}

fn run_statistics(
    rows:       &[Transaction],
    config:     MatchConfig,
    output_dir: &str,
    run_id:     &str,
    mut store:  Option<&mut ControlStore>,
) -> Result<()> {
    for variant in config.standard_variants() {
        let tag = variant.output_tag.clone();
        let label = if tag.is_empty() { "log_price" } else { tag.trim_start_matches('_') };
        println!("Tag: {label}");
        println!("----------------");

        if !has_column(rows, &variant.outcome_field) {
            log::warn!("Skipping '{label}': no '{}' column in the extract", variant.outcome_field);
            continue;
        }

        let engine = ControlEngine::new(variant)?;
        let run = engine.match_statistics(rows)?;

        let path = Path::new(output_dir).join(format!("controls{tag}.csv"));
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(NearestControls::header(&tag))?;
        for row in &run.nearest {
            writer.write_record(row.record())?;
        }
        writer.flush()?;

        if let Some(store) = store.as_deref_mut() {
            store.insert_nearest_controls(run_id, &tag, &run.nearest)?;
            store.insert_report(run_id, &tag, &run.report)?;
        }

        print_summary(label, &run.report);
        println!("  saved to:         {}", path.display());
        println!();
    }
    Ok(())
}

/// Read a CSV extract. Every row must satisfy the record contract; the
/// first violation aborts the run.
fn read_transactions(path: &str) -> Result<Vec<Transaction>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(false)
        .from_path(path)
        .with_context(|| format!("Cannot read {path}"))?;
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let row = Transaction::from_columns(headers.iter().zip(record.iter()))
            .with_context(|| format!("{path}: data row {}", line + 1))?;
        rows.push(row);
    }
    log::info!("Loaded {} transactions from {path}", rows.len());
    Ok(rows)
}

fn has_column(rows: &[Transaction], field: &str) -> bool {
    rows.first().is_some_and(|row| row.numeric(field).is_ok())
}

fn print_summary(label: &str, report: &MatchReport) {
    println!("=== {label} ===");
    println!("  chunks:           {}", report.chunks_submitted);
    println!("  units matched:    {}", report.units_processed - report.units_unmatched);
    println!("  units unmatched:  {}", report.units_unmatched);
    println!("  missing controls: {} ({} chunks)", report.units_dropped, report.chunks_dropped);
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
