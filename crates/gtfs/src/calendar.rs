//! Service calendar expander (component C8): folds `calendar.txt`'s
//! day-of-week bitmask together with `calendar_dates.txt`'s exceptions into
//! one explicit [`ServiceDate`] row per (service_id, calendar date) that the
//! service actually runs, and totals scheduled revenue time per route_type
//! into [`ServiceDuration`] rows for the plausibility checks.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use gtfs_model::derived::{ServiceDate, ServiceDuration};
use gtfs_model::{ErrorKind, ErrorRecord};

use crate::backend::Backend;
use crate::error_store::ErrorStore;

pub struct CalendarOutput {
    pub dates: Vec<ServiceDate>,
    pub durations: Vec<ServiceDuration>,
    /// Stable per-feed index assigned to each distinct `service_id`, so
    /// downstream derived tables can carry a `u32` instead of repeating the
    /// string on every row.
    pub service_id_index: HashMap<String, u32>,
    /// Every calendar date between the feed's earliest and latest active
    /// date that has zero active services — the `DateNoServiceActive`
    /// findings, kept alongside the error records so an embedding
    /// application can render a calendar gap view without re-deriving it.
    pub dates_with_no_service: Vec<NaiveDate>,
    /// Scheduled revenue seconds per calendar date, broken out by GTFS
    /// `route_type` (§6's daily summary arrays: bus=3, tram=0, metro=1,
    /// rail=2) plus a `total` bucket summing every route_type.
    pub daily_duration_seconds: Vec<DailyDuration>,
}

/// One calendar date's total scheduled revenue time, split by route_type.
#[derive(Debug, Clone, Copy, Default)]
pub struct DailyDuration {
    pub date: NaiveDate,
    pub bus_seconds: i64,
    pub tram_seconds: i64,
    pub metro_seconds: i64,
    pub rail_seconds: i64,
    pub total_seconds: i64,
}

fn weekday_flag(descriptor_field: &str) -> Weekday {
    match descriptor_field {
        "monday" => Weekday::Mon,
        "tuesday" => Weekday::Tue,
        "wednesday" => Weekday::Wed,
        "thursday" => Weekday::Thu,
        "friday" => Weekday::Fri,
        "saturday" => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

const WEEKDAY_FIELDS: &[&str] = &[
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

pub async fn expand_calendar(
    backend: &dyn Backend,
    namespace: &str,
    errors: &mut ErrorStore,
) -> Result<CalendarOutput, crate::backend::BackendError> {
    let calendar_rows = backend.fetch_all(namespace, "calendar").await?;
    let exception_rows = backend.fetch_all(namespace, "calendar_dates").await?;
    let trips = backend.fetch_all(namespace, "trips").await?;
    let routes = backend.fetch_all(namespace, "routes").await?;
    let stop_times = backend.fetch_all(namespace, "stop_times").await?;

    let mut service_id_index: HashMap<String, u32> = HashMap::new();
    let mut index_of = |service_id: &str| -> u32 {
        if let Some(i) = service_id_index.get(service_id) {
            return *i;
        }
        let next = service_id_index.len() as u32;
        service_id_index.insert(service_id.to_owned(), next);
        next
    };

    let mut active: HashMap<(u32, NaiveDate), bool> = HashMap::new();

    for row in &calendar_rows {
        let Some(service_id) = row.text("service_id") else {
            continue;
        };
        let Some(start) = row.date("start_date") else {
            continue;
        };
        let Some(end) = row.date("end_date") else {
            continue;
        };
        if end < start {
            continue;
        }

        let active_weekdays: HashSet<Weekday> = WEEKDAY_FIELDS
            .iter()
            .filter(|field| row.integer(field) == Some(1))
            .map(|field| weekday_flag(field))
            .collect();

        let index = index_of(service_id);
        let mut day = start;
        // calendar.txt windows can span years; this is bounded by the feed
        // itself, not by anything this module chooses.
        while day <= end {
            if active_weekdays.contains(&day.weekday()) {
                active.insert((index, day), true);
            }
            day += Duration::days(1);
        }
    }

    for row in &exception_rows {
        let Some(service_id) = row.text("service_id") else {
            continue;
        };
        let Some(date) = row.date("date") else {
            continue;
        };
        let index = index_of(service_id);
        match row.integer("exception_type") {
            Some(1) => {
                active.insert((index, date), true);
            }
            Some(2) => {
                active.remove(&(index, date));
            }
            _ => {}
        }
    }

    let mut dates: Vec<ServiceDate> = active
        .keys()
        .map(|(service_id_index, date)| ServiceDate {
            service_id_index: *service_id_index,
            date: *date,
        })
        .collect();
    dates.sort_by_key(|d| (d.service_id_index, d.date));

    let known_services: HashSet<u32> = service_id_index.values().copied().collect();
    for record in &calendar_rows {
        let Some(service_id) = record.text("service_id") else {
            continue;
        };
        let index = *service_id_index.get(service_id).unwrap_or(&u32::MAX);
        let ever_active = dates.iter().any(|d| d.service_id_index == index);
        if !ever_active {
            errors.push(
                ErrorRecord::new(ErrorKind::ServiceNeverActive, "calendar")
                    .with_line(record.line)
                    .with_entity_id(service_id),
            );
        }
    }

    let used_services: HashSet<&str> = trips.iter().filter_map(|t| t.text("service_id")).collect();
    for service_id in service_id_index.keys() {
        if !used_services.contains(service_id.as_str()) {
            errors.push(ErrorRecord::new(ErrorKind::ServiceUnused, "calendar").with_entity_id(service_id));
        }
    }

    for trip in &trips {
        let (Some(trip_id), Some(service_id)) = (trip.text("trip_id"), trip.text("service_id"))
        else {
            continue;
        };
        let index = service_id_index.get(service_id).copied();
        let ever_active = index.is_some_and(|i| known_services.contains(&i) && dates.iter().any(|d| d.service_id_index == i));
        if !ever_active {
            errors.push(
                ErrorRecord::new(ErrorKind::TripNeverActive, "trips")
                    .with_line(trip.line)
                    .with_entity_id(trip_id),
            );
        }
    }

    let route_type_by_route: HashMap<&str, i64> = routes
        .iter()
        .filter_map(|r| Some((r.text("route_id")?, r.integer("route_type")?)))
        .collect();
    let route_by_trip: HashMap<&str, &str> = trips
        .iter()
        .filter_map(|t| Some((t.text("trip_id")?, t.text("route_id")?)))
        .collect();

    let mut trip_span: HashMap<&str, (i64, i64)> = HashMap::new();
    for st in &stop_times {
        let Some(trip_id) = st.text("trip_id") else {
            continue;
        };
        let Some(time) = st
            .time_of_day("departure_time")
            .or_else(|| st.time_of_day("arrival_time"))
        else {
            continue;
        };
        trip_span
            .entry(trip_id)
            .and_modify(|(min, max)| {
                *min = (*min).min(time);
                *max = (*max).max(time);
            })
            .or_insert((time, time));
    }

    let mut duration_totals: HashMap<(u32, NaiveDate, i64), i64> = HashMap::new();
    for service_date in &dates {
        let service_id = service_id_index
            .iter()
            .find(|(_, idx)| **idx == service_date.service_id_index)
            .map(|(id, _)| id.as_str());
        let Some(service_id) = service_id else {
            continue;
        };
        for trip in &trips {
            if trip.text("service_id") != Some(service_id) {
                continue;
            }
            let Some(trip_id) = trip.text("trip_id") else {
                continue;
            };
            let Some((min, max)) = trip_span.get(trip_id) else {
                continue;
            };
            let route_type = route_by_trip
                .get(trip_id)
                .and_then(|route_id| route_type_by_route.get(route_id))
                .copied()
                .unwrap_or(3);
            *duration_totals
                .entry((service_date.service_id_index, service_date.date, route_type))
                .or_insert(0) += max - min;
        }
    }

    let mut durations: Vec<ServiceDuration> = duration_totals
        .into_iter()
        .map(
            |((service_id_index, date, route_type), duration_seconds)| ServiceDuration {
                service_id_index,
                date,
                route_type,
                duration_seconds,
            },
        )
        .collect();
    durations.sort_by_key(|d| (d.service_id_index, d.date, d.route_type));

    let active_dates: HashSet<NaiveDate> = dates.iter().map(|d| d.date).collect();
    let mut dates_with_no_service = Vec::new();
    if let (Some(earliest), Some(latest)) = (active_dates.iter().min(), active_dates.iter().max())
    {
        let mut day = *earliest;
        while day <= *latest {
            if !active_dates.contains(&day) {
                dates_with_no_service.push(day);
                errors.push(
                    ErrorRecord::new(ErrorKind::DateNoServiceActive, "calendar")
                        .with_detail(day.format("%Y-%m-%d").to_string()),
                );
            }
            day += Duration::days(1);
        }
    }

    let mut daily_totals: BTreeMap<NaiveDate, DailyDuration> = BTreeMap::new();
    for duration in &durations {
        let entry = daily_totals.entry(duration.date).or_insert(DailyDuration {
            date: duration.date,
            ..Default::default()
        });
        entry.total_seconds += duration.duration_seconds;
        match duration.route_type {
            0 => entry.tram_seconds += duration.duration_seconds,
            1 => entry.metro_seconds += duration.duration_seconds,
            2 => entry.rail_seconds += duration.duration_seconds,
            3 => entry.bus_seconds += duration.duration_seconds,
            _ => {}
        }
    }
    let daily_duration_seconds: Vec<DailyDuration> = daily_totals.into_values().collect();

    Ok(CalendarOutput {
        dates,
        durations,
        service_id_index,
        dates_with_no_service,
        daily_duration_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::in_memory::InMemoryBackend;
    use gtfs_model::{Entity, FieldValue};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn expands_weekday_service_and_applies_an_exception() {
        let backend = InMemoryBackend::new();
        backend.create_namespace("ns").await.unwrap();

        let mut cal = Entity::new(1, 2);
        cal.set("service_id", FieldValue::Text("WD".to_owned()));
        for day in ["monday", "tuesday", "wednesday", "thursday", "friday"] {
            cal.set(day, FieldValue::Integer(1));
        }
        for day in ["saturday", "sunday"] {
            cal.set(day, FieldValue::Integer(0));
        }
        cal.set("start_date", FieldValue::Date(date(2026, 1, 5))); // Monday
        cal.set("end_date", FieldValue::Date(date(2026, 1, 11))); // Sunday
        backend.bulk_copy("ns", "calendar", vec![cal]).await.unwrap();

        let mut exception = Entity::new(1, 2);
        exception.set("service_id", FieldValue::Text("WD".to_owned()));
        exception.set("date", FieldValue::Date(date(2026, 1, 10))); // Saturday, added
        exception.set("exception_type", FieldValue::Integer(1));
        backend
            .bulk_copy("ns", "calendar_dates", vec![exception])
            .await
            .unwrap();

        let mut trip = Entity::new(1, 2);
        trip.set("trip_id", FieldValue::Text("T1".to_owned()));
        trip.set("service_id", FieldValue::Text("WD".to_owned()));
        trip.set("route_id", FieldValue::Text("R1".to_owned()));
        backend.bulk_copy("ns", "trips", vec![trip]).await.unwrap();

        let mut errors = ErrorStore::new(100);
        let output = expand_calendar(&backend, "ns", &mut errors).await.unwrap();

        assert_eq!(output.dates.len(), 6); // 5 weekdays + 1 exception Saturday
        assert!(output.dates.iter().any(|d| d.date == date(2026, 1, 10)));
        assert!(!output.dates.iter().any(|d| d.date == date(2026, 1, 11))); // Sunday, never active
    }

    #[tokio::test]
    async fn flags_a_gap_day_with_no_active_service() {
        let backend = InMemoryBackend::new();
        backend.create_namespace("ns").await.unwrap();

        // Two single-day services with a silent Wednesday gap between them.
        let mut cal = Entity::new(1, 2);
        cal.set("service_id", FieldValue::Text("MON_ONLY".to_owned()));
        for day in WEEKDAY_FIELDS {
            cal.set(day, FieldValue::Integer(0));
        }
        cal.set("monday", FieldValue::Integer(1));
        cal.set("start_date", FieldValue::Date(date(2026, 1, 5)));
        cal.set("end_date", FieldValue::Date(date(2026, 1, 5)));
        backend.bulk_copy("ns", "calendar", vec![cal]).await.unwrap();

        let mut exception = Entity::new(1, 2);
        exception.set("service_id", FieldValue::Text("FRI_ONLY".to_owned()));
        exception.set("date", FieldValue::Date(date(2026, 1, 9)));
        exception.set("exception_type", FieldValue::Integer(1));
        backend
            .bulk_copy("ns", "calendar_dates", vec![exception])
            .await
            .unwrap();

        let mut errors = ErrorStore::new(100);
        let output = expand_calendar(&backend, "ns", &mut errors).await.unwrap();

        assert!(output.dates_with_no_service.contains(&date(2026, 1, 7)));
        assert!(errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::DateNoServiceActive));
    }

    #[tokio::test]
    async fn flags_a_service_id_that_is_never_active() {
        let backend = InMemoryBackend::new();
        backend.create_namespace("ns").await.unwrap();

        let mut cal = Entity::new(1, 2);
        cal.set("service_id", FieldValue::Text("NEVER".to_owned()));
        for day in WEEKDAY_FIELDS {
            cal.set(day, FieldValue::Integer(0));
        }
        cal.set("start_date", FieldValue::Date(date(2026, 1, 5)));
        cal.set("end_date", FieldValue::Date(date(2026, 1, 11)));
        backend.bulk_copy("ns", "calendar", vec![cal]).await.unwrap();

        let mut errors = ErrorStore::new(100);
        expand_calendar(&backend, "ns", &mut errors).await.unwrap();

        assert!(errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::ServiceNeverActive));
    }
}
