use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use env_logger::Env;
use log::{error, info, warn};
use rusqlite::Connection;

use college_report::{ingest, pipeline, report, Config};

const CONFIG_FILE: &str = "college-report.toml";

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = load_config()?;
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("import") => {
            let csv_path = args
                .get(2)
                .context("Usage: college-report import <csv-file>")?;
            run_import(&config, Path::new(csv_path))
        }
        _ => run_report(&config),
    }
}

fn load_config() -> Result<Config> {
    if Path::new(CONFIG_FILE).exists() {
        let config =
            Config::load_from_file(CONFIG_FILE).context("Failed to load configuration")?;
        info!("Loaded configuration from {CONFIG_FILE}");
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

/// Import mode: load the consolidated score CSV into the score collection.
fn run_import(config: &Config, csv_path: &Path) -> Result<()> {
    let conn = open_database(config)?;

    let result = ingest::import_csv(&conn, config, csv_path);
    close_database(conn);

    let total = result?;
    info!("Import completed successfully: {total} documents");
    Ok(())
}

/// Report mode: enrich every score document with its resolved college and
/// render the per-college category report.
fn run_report(config: &Config) -> Result<()> {
    let conn = open_database(config)?;

    // The connection is released before the run result is inspected, so a
    // failed run still closes cleanly. Windows persisted before a failure
    // stay persisted; re-running converges to the same state.
    let result = pipeline::run_enrichment(&conn, config);
    close_database(conn);

    let outcome = result?;

    info!("Creating report...");
    let rows = report::project(&outcome.stats);
    report::write_csv_file(Path::new(&config.report_path), &rows)?;
    info!("Report saved to {}", config.report_path);

    Ok(())
}

fn open_database(config: &Config) -> Result<Connection> {
    info!("Connecting to report database...");
    Connection::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path))
}

fn close_database(conn: Connection) {
    if let Err((_, err)) = conn.close() {
        warn!("Failed to close database cleanly: {err}");
    } else {
        info!("Database connection closed");
    }
}
