//! Loads a GTFS zip from disk into a throwaway in-memory backend, runs the
//! full pipeline, and prints the resulting error report. A thin smoke-test
//! tool, not the deployment path — an embedding application wires its own
//! `Backend` and calls [`gtfs::process_archive`] directly.

use std::env;
use std::fs;
use std::process::ExitCode;

use gtfs::backend::in_memory::InMemoryBackend;
use gtfs::loader::LoaderConfig;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: gtfs_validate <feed.zip>");
        return ExitCode::FAILURE;
    };

    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("could not read {path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let backend = InMemoryBackend::new();
    let outcome = match gtfs::load_and_validate(&backend, bytes, &LoaderConfig::default()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("failed to load {path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "loaded {} table(s) into namespace {}",
        outcome.tables_loaded.len(),
        outcome.namespace
    );
    println!(
        "{} pattern(s), {} service date(s)",
        outcome.patterns.patterns.len(),
        outcome.calendar.dates.len()
    );

    for record in &outcome.errors {
        let line = record
            .line
            .map(|l| l.to_string())
            .unwrap_or_else(|| "?".to_owned());
        println!(
            "[{:?}] {} line {}: {}",
            record.severity,
            record.entity_type,
            line,
            record.bad_value.as_deref().unwrap_or(record.detail.as_deref().unwrap_or(""))
        );
    }

    if outcome.errors.iter().any(|r| r.severity == gtfs_model::Severity::High) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
