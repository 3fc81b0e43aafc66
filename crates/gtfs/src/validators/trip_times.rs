//! Checks that each trip's `stop_times` rows are chronologically sane: times
//! present where they must be, and non-decreasing in `stop_sequence` order.

use std::collections::HashMap;

use gtfs_model::{Entity, ErrorKind, ErrorRecord};

use crate::error_store::ErrorStore;

pub fn check(stop_times: &[Entity], errors: &mut ErrorStore) {
    let mut by_trip: HashMap<&str, Vec<&Entity>> = HashMap::new();
    for row in stop_times {
        if let Some(trip_id) = row.text("trip_id") {
            by_trip.entry(trip_id).or_default().push(row);
        }
    }

    for (trip_id, mut rows) in by_trip {
        rows.sort_by_key(|r| r.integer("stop_sequence").unwrap_or(0));

        let mut previous: Option<i64> = None;
        let mut any_time_present = false;

        for row in &rows {
            let is_flex = row.text("stop_id").is_none();
            let arrival = if is_flex {
                row.time_of_day("start_pickup_drop_off_window")
            } else {
                row.time_of_day("arrival_time")
            };
            let departure = if is_flex {
                row.time_of_day("end_pickup_drop_off_window")
            } else {
                row.time_of_day("departure_time")
            };

            if arrival.is_some() || departure.is_some() {
                any_time_present = true;
            }

            for time in [arrival, departure].into_iter().flatten() {
                if let Some(prev) = previous {
                    if time < prev {
                        errors.push(
                            ErrorRecord::new(ErrorKind::TripTimesOutOfOrder, "stop_times")
                                .with_line(row.line)
                                .with_entity_id(trip_id),
                        );
                    }
                }
                previous = Some(time.max(previous.unwrap_or(time)));
            }
        }

        if !any_time_present {
            errors.push(
                ErrorRecord::new(ErrorKind::TripTimesMissing, "stop_times").with_entity_id(trip_id),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtfs_model::FieldValue;

    fn stop_time(trip_id: &str, seq: i64, arrival: i64, departure: i64) -> Entity {
        let mut row = Entity::new(1, 1);
        row.set("trip_id", FieldValue::Text(trip_id.to_owned()));
        row.set("stop_id", FieldValue::Text(format!("S{seq}")));
        row.set("stop_sequence", FieldValue::Integer(seq));
        row.set("arrival_time", FieldValue::TimeOfDay(arrival));
        row.set("departure_time", FieldValue::TimeOfDay(departure));
        row
    }

    #[test]
    fn flags_a_trip_whose_times_go_backwards() {
        let rows = vec![
            stop_time("T1", 0, 100, 110),
            stop_time("T1", 1, 90, 95),
        ];
        let mut errors = ErrorStore::new(100);
        check(&rows, &mut errors);
        assert!(errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::TripTimesOutOfOrder));
    }

    #[test]
    fn accepts_monotonic_times() {
        let rows = vec![
            stop_time("T1", 0, 100, 110),
            stop_time("T1", 1, 120, 130),
        ];
        let mut errors = ErrorStore::new(100);
        check(&rows, &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn flags_a_trip_with_no_times_at_all() {
        let mut row = Entity::new(1, 1);
        row.set("trip_id", FieldValue::Text("T2".to_owned()));
        row.set("stop_id", FieldValue::Text("S0".to_owned()));
        row.set("stop_sequence", FieldValue::Integer(0));
        let mut errors = ErrorStore::new(100);
        check(&[row], &mut errors);
        assert!(errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::TripTimesMissing));
    }
}
