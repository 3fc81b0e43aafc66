//! Ingests, validates and re-exports GTFS (and GTFS-Flex) feeds against a
//! pluggable [`backend::Backend`].
//!
//! The pipeline is the same four steps regardless of which backend is
//! wired in: [`archive::Archive::open`] a zip, [`loader::load_archive`] it
//! table by table into a fresh namespace, resolve what the loader couldn't
//! ([`reference_resolver`], [`calendar`], [`pattern`], [`validators`]), then
//! hand the namespace back to the caller — or [`exporter::export_namespace`]
//! it straight back out as a zip. [`process_archive`] runs all of that in
//! the order the components depend on each other.

pub mod archive;
pub mod backend;
pub mod calendar;
pub mod coercion;
pub mod error_store;
pub mod exporter;
pub mod loader;
pub mod namespace;
pub mod pattern;
pub mod reference_resolver;
pub mod validators;

use gtfs_model::ErrorRecord;

use crate::archive::Archive;
use crate::backend::Backend;
use crate::calendar::CalendarOutput;
use crate::error_store::ErrorStore;
use crate::loader::{LoadError, LoaderConfig};
use crate::pattern::PatternFinderOutput;

/// Everything a full load-and-validate run produced: the namespace the feed
/// now lives in, which tables were present, the derived service calendar and
/// stop patterns, and the sorted, deduplicated error report.
pub struct ProcessOutcome {
    pub namespace: String,
    pub tables_loaded: Vec<String>,
    pub calendar: CalendarOutput,
    pub patterns: PatternFinderOutput,
    pub errors: Vec<ErrorRecord>,
}

/// Runs the full pipeline against an already-open archive: load, resolve
/// references, expand the service calendar, find stop patterns, then run
/// the semantic validators. Per §7's propagation policy only a failure to
/// open the archive or reach the backend aborts the run early — everything
/// else downstream of a successful load degrades to an error record instead.
pub async fn process_archive(
    backend: &dyn Backend,
    namespace: &str,
    archive: &mut Archive,
    config: &LoaderConfig,
) -> Result<ProcessOutcome, LoadError> {
    let outcome = loader::load_archive(backend, namespace, archive, config).await?;
    let mut errors: ErrorStore = outcome.errors;

    reference_resolver::resolve_references(backend, namespace, &mut errors)
        .await
        .map_err(LoadError::Backend)?;

    let calendar = calendar::expand_calendar(backend, namespace, &mut errors)
        .await
        .map_err(LoadError::Backend)?;

    let patterns = pattern::find_patterns(backend, namespace, &mut errors)
        .await
        .map_err(LoadError::Backend)?;

    validators::run_all(backend, namespace, config, &calendar, &mut errors)
        .await
        .map_err(LoadError::Backend)?;

    Ok(ProcessOutcome {
        namespace: outcome.namespace,
        tables_loaded: outcome.tables_loaded,
        calendar,
        patterns,
        errors: errors.into_sorted_records(),
    })
}

/// Convenience wrapper over [`process_archive`] that opens the zip bytes and
/// mints a namespace itself, for callers that don't need to reuse an
/// [`Archive`] or pick their own namespace id (e.g. a re-import in §8's
/// export round-trip scenario).
pub async fn load_and_validate(
    backend: &dyn Backend,
    archive_bytes: Vec<u8>,
    config: &LoaderConfig,
) -> Result<ProcessOutcome, LoadError> {
    let mut archive = Archive::open(archive_bytes)?;
    let namespace =
        namespace::generate_namespace_from_fingerprint(archive.fingerprint(), 0);
    process_archive(backend, &namespace, &mut archive, config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::in_memory::InMemoryBackend;

    #[tokio::test]
    async fn runs_the_full_pipeline_on_a_minimal_feed() {
        let backend = InMemoryBackend::new();
        let bytes = crate::archive::tests_support::zip_with(&[
            (
                "agency.txt",
                "agency_id,agency_name,agency_url,agency_timezone\n1,Fake Transit,https://example.com,America/Los_Angeles\n",
            ),
            (
                "stops.txt",
                "stop_id,stop_name,stop_lat,stop_lon\nS1,Stop One,37.0,-121.0\nS2,Stop Two,37.01,-121.0\n",
            ),
            ("routes.txt", "route_id,route_type\nR1,3\n"),
            (
                "trips.txt",
                "route_id,service_id,trip_id\nR1,WD,T1\n",
            ),
            (
                "stop_times.txt",
                "trip_id,arrival_time,departure_time,stop_id,stop_sequence\nT1,07:00:00,07:00:00,S1,1\nT1,07:10:00,07:10:00,S2,2\n",
            ),
            (
                "calendar.txt",
                "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\nWD,1,1,1,1,1,1,1,20170915,20170917\n",
            ),
            (
                "calendar_dates.txt",
                "service_id,date,exception_type\nWD,20170916,2\n",
            ),
        ]);

        let outcome = load_and_validate(&backend, bytes, &LoaderConfig::default())
            .await
            .unwrap();

        assert_eq!(outcome.patterns.patterns.len(), 1);
        assert_eq!(outcome.calendar.dates.len(), 2);

        let trips = backend.fetch_all(&outcome.namespace, "trips").await.unwrap();
        assert_eq!(trips[0].text("pattern_id"), Some(outcome.patterns.patterns[0].pattern_id.as_str()));
    }
}
