//! Semantic validators (component C9): a set of independent checks that run
//! once the feed is loaded and its references resolved. Each validator gets
//! its own module and pushes findings onto the shared [`ErrorStore`]; a
//! validator that panics or fails is caught by the caller and logged as
//! [`ErrorKind::ValidatorFailed`] rather than aborting the rest of the run,
//! per the propagation policy — no validator here is allowed to stop
//! another one from running.

mod conditional;
mod duplicate_stops;
mod flex;
mod names;
mod orphans;
mod overlapping_trips;
mod speed;
mod trip_times;

use std::panic::AssertUnwindSafe;

use gtfs_model::{Entity, ErrorKind, ErrorRecord};

use crate::backend::{Backend, BackendError};
use crate::calendar::CalendarOutput;
use crate::error_store::ErrorStore;
use crate::loader::LoaderConfig;

pub async fn run_all(
    backend: &dyn Backend,
    namespace: &str,
    config: &LoaderConfig,
    calendar: &CalendarOutput,
    errors: &mut ErrorStore,
) -> Result<(), BackendError> {
    let stops = backend.fetch_all(namespace, "stops").await?;
    let routes = backend.fetch_all(namespace, "routes").await?;
    let trips = backend.fetch_all(namespace, "trips").await?;
    let stop_times = backend.fetch_all(namespace, "stop_times").await?;
    let transfers = backend.fetch_all(namespace, "transfers").await?;
    let fare_rules = backend.fetch_all(namespace, "fare_rules").await?;
    let booking_rules = backend.fetch_all(namespace, "booking_rules").await?;
    let location_groups = backend.fetch_all(namespace, "location_groups").await?;
    let location_group_stops = backend.fetch_all(namespace, "location_group_stops").await?;

    run_named("trip_times", errors, |errors| {
        trip_times::check(&stop_times, errors)
    });
    run_named("speed", errors, |errors| {
        speed::check(&stop_times, &trips, &routes, &stops, config, errors)
    });
    run_named("names", errors, |errors| {
        names::check(&routes, &stops, &trips, errors)
    });
    run_named("duplicate_stops", errors, |errors| {
        duplicate_stops::check(&stops, errors)
    });
    run_named("orphans", errors, |errors| {
        orphans::check(&stops, &routes, &trips, &stop_times, &transfers, errors)
    });
    run_named("overlapping_trips", errors, |errors| {
        overlapping_trips::check(&trips, &stop_times, errors)
    });
    run_named("flex", errors, |errors| {
        flex::check(
            &stop_times,
            &booking_rules,
            &location_groups,
            &location_group_stops,
            &calendar.service_id_index,
            errors,
        )
    });
    run_named("conditional", errors, |errors| {
        conditional::check(&stops, &fare_rules, errors)
    });

    Ok(())
}

/// Runs one validator, catching a panic so a bug in one check can't take
/// down the rest of the pipeline; per §7 this is logged and recorded as
/// [`ErrorKind::ValidatorFailed`] rather than propagated.
fn run_named(name: &str, errors: &mut ErrorStore, f: impl FnOnce(&mut ErrorStore)) {
    log::info!("validators: running {name}");
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| f(errors)));
    if let Err(panic) = result {
        let detail = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "validator panicked".to_owned());
        log::warn!("validators: {name} panicked: {detail}");
        errors.push(ErrorRecord::new(ErrorKind::ValidatorFailed, name).with_detail(detail));
    }
}
