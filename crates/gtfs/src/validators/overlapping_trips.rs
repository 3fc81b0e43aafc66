//! Two trips sharing a `block_id` are meant to be run back-to-back by the
//! same vehicle. If they also share a `service_id` and their scheduled time
//! ranges overlap, no single vehicle could actually operate both.

use std::collections::HashMap;

use gtfs_model::{Entity, ErrorKind, ErrorRecord};

use crate::error_store::ErrorStore;

struct TripSpan<'a> {
    trip_id: &'a str,
    line: u64,
    start: i64,
    end: i64,
}

pub fn check(trips: &[Entity], stop_times: &[Entity], errors: &mut ErrorStore) {
    let mut span_by_trip: HashMap<&str, (i64, i64)> = HashMap::new();
    for row in stop_times {
        let Some(trip_id) = row.text("trip_id") else {
            continue;
        };
        let Some(time) = row
            .time_of_day("departure_time")
            .or_else(|| row.time_of_day("arrival_time"))
        else {
            continue;
        };
        span_by_trip
            .entry(trip_id)
            .and_modify(|(min, max)| {
                *min = (*min).min(time);
                *max = (*max).max(time);
            })
            .or_insert((time, time));
    }

    let mut by_block: HashMap<(&str, &str), Vec<TripSpan>> = HashMap::new();
    for trip in trips {
        let (Some(trip_id), Some(block_id), Some(service_id)) = (
            trip.text("trip_id"),
            trip.text("block_id"),
            trip.text("service_id"),
        ) else {
            continue;
        };
        let Some(&(start, end)) = span_by_trip.get(trip_id) else {
            continue;
        };
        by_block.entry((block_id, service_id)).or_default().push(TripSpan {
            trip_id,
            line: trip.line,
            start,
            end,
        });
    }

    for mut spans in by_block.into_values() {
        spans.sort_by_key(|s| s.start);
        for pair in spans.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if b.start < a.end {
                errors.push(
                    ErrorRecord::new(ErrorKind::OverlappingTripsInBlock, "trips")
                        .with_line(b.line)
                        .with_entity_id(b.trip_id)
                        .with_detail(format!("overlaps trip {}", a.trip_id)),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtfs_model::FieldValue;

    fn trip(trip_id: &str, block_id: &str, service_id: &str) -> Entity {
        let mut row = Entity::new(1, 1);
        row.set("trip_id", FieldValue::Text(trip_id.to_owned()));
        row.set("block_id", FieldValue::Text(block_id.to_owned()));
        row.set("service_id", FieldValue::Text(service_id.to_owned()));
        row
    }

    fn stop_time(trip_id: &str, seq: i64, time: i64) -> Entity {
        let mut row = Entity::new(1, 1);
        row.set("trip_id", FieldValue::Text(trip_id.to_owned()));
        row.set("stop_sequence", FieldValue::Integer(seq));
        row.set("arrival_time", FieldValue::TimeOfDay(time));
        row.set("departure_time", FieldValue::TimeOfDay(time));
        row
    }

    #[test]
    fn flags_two_trips_in_the_same_block_that_overlap() {
        let trips = vec![trip("T1", "B1", "WD"), trip("T2", "B1", "WD")];
        let stop_times = vec![
            stop_time("T1", 0, 100),
            stop_time("T1", 1, 500),
            stop_time("T2", 0, 400),
            stop_time("T2", 1, 700),
        ];
        let mut errors = ErrorStore::new(100);
        check(&trips, &stop_times, &mut errors);
        assert!(errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::OverlappingTripsInBlock));
    }

    #[test]
    fn accepts_back_to_back_trips() {
        let trips = vec![trip("T1", "B1", "WD"), trip("T2", "B1", "WD")];
        let stop_times = vec![
            stop_time("T1", 0, 100),
            stop_time("T1", 1, 500),
            stop_time("T2", 0, 500),
            stop_time("T2", 1, 900),
        ];
        let mut errors = ErrorStore::new(100);
        check(&trips, &stop_times, &mut errors);
        assert!(errors.is_empty());
    }
}
