//! Flags stop-to-stop hops that imply an implausible average speed for the
//! trip's route_type, using great-circle distance over elapsed scheduled
//! time. Flex halts have no fixed coordinates to measure between, so a hop
//! touching one is skipped and reported separately rather than silently
//! passed.

use std::collections::HashMap;

use gtfs_model::{Entity, ErrorKind, ErrorRecord};
use utility::geo::haversine_distance;

use crate::error_store::ErrorStore;
use crate::loader::LoaderConfig;

struct StopCoord {
    lat: f64,
    lon: f64,
}

pub fn check(
    stop_times: &[Entity],
    trips: &[Entity],
    routes: &[Entity],
    stops: &[Entity],
    config: &LoaderConfig,
    errors: &mut ErrorStore,
) {
    let coords: HashMap<&str, StopCoord> = stops
        .iter()
        .filter_map(|s| {
            Some((
                s.text("stop_id")?,
                StopCoord {
                    lat: s.double("stop_lat")?,
                    lon: s.double("stop_lon")?,
                },
            ))
        })
        .collect();

    let route_type_by_route: HashMap<&str, i64> = routes
        .iter()
        .filter_map(|r| Some((r.text("route_id")?, r.integer("route_type")?)))
        .collect();
    let route_by_trip: HashMap<&str, &str> = trips
        .iter()
        .filter_map(|t| Some((t.text("trip_id")?, t.text("route_id")?)))
        .collect();

    let mut by_trip: HashMap<&str, Vec<&Entity>> = HashMap::new();
    for row in stop_times {
        if let Some(trip_id) = row.text("trip_id") {
            by_trip.entry(trip_id).or_default().push(row);
        }
    }

    for (trip_id, mut rows) in by_trip {
        rows.sort_by_key(|r| r.integer("stop_sequence").unwrap_or(0));
        let route_type = route_by_trip
            .get(trip_id)
            .and_then(|r| route_type_by_route.get(r))
            .copied()
            .unwrap_or(3);
        let max_kmh = config.speed_thresholds.max_kmh(route_type);

        let min_kmh = config.speed_thresholds.min_kmh(route_type);

        for pair in rows.windows(2) {
            let (prev, next) = (pair[0], pair[1]);
            let (Some(prev_id), Some(next_id)) = (prev.text("stop_id"), next.text("stop_id"))
            else {
                errors.push(
                    ErrorRecord::new(ErrorKind::TripSpeedNotValidated, "stop_times")
                        .with_line(next.line)
                        .with_entity_id(trip_id)
                        .with_detail("hop touches a flex halt, not evaluated"),
                );
                continue;
            };
            let (Some(prev_coord), Some(next_coord)) = (coords.get(prev_id), coords.get(next_id))
            else {
                continue;
            };
            let (Some(prev_time), Some(next_time)) = (
                prev.time_of_day("departure_time").or_else(|| prev.time_of_day("arrival_time")),
                next.time_of_day("arrival_time").or_else(|| next.time_of_day("departure_time")),
            ) else {
                continue;
            };

            let elapsed_hours = (next_time - prev_time) as f64 / 3600.0;
            if elapsed_hours <= 0.0 {
                continue;
            }

            let distance_km =
                haversine_distance(prev_coord.lat, prev_coord.lon, next_coord.lat, next_coord.lon);
            let speed_kmh = distance_km / elapsed_hours;

            if speed_kmh > max_kmh {
                errors.push(
                    ErrorRecord::new(ErrorKind::TravelTooFast, "stop_times")
                        .with_line(next.line)
                        .with_entity_id(trip_id)
                        .with_detail(format!("{speed_kmh:.1} km/h exceeds {max_kmh:.1} km/h ceiling")),
                );
            } else if speed_kmh < min_kmh {
                errors.push(
                    ErrorRecord::new(ErrorKind::TravelTooSlow, "stop_times")
                        .with_line(next.line)
                        .with_entity_id(trip_id)
                        .with_detail(format!("{speed_kmh:.1} km/h is below the {min_kmh:.1} km/h floor")),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtfs_model::FieldValue;

    fn stop(id: &str, lat: f64, lon: f64) -> Entity {
        let mut row = Entity::new(1, 1);
        row.set("stop_id", FieldValue::Text(id.to_owned()));
        row.set("stop_lat", FieldValue::Double(lat));
        row.set("stop_lon", FieldValue::Double(lon));
        row
    }

    fn stop_time(trip_id: &str, seq: i64, stop_id: &str, time: i64) -> Entity {
        let mut row = Entity::new(1, 1);
        row.set("trip_id", FieldValue::Text(trip_id.to_owned()));
        row.set("stop_id", FieldValue::Text(stop_id.to_owned()));
        row.set("stop_sequence", FieldValue::Integer(seq));
        row.set("arrival_time", FieldValue::TimeOfDay(time));
        row.set("departure_time", FieldValue::TimeOfDay(time));
        row
    }

    fn trip(trip_id: &str, route_id: &str) -> Entity {
        let mut row = Entity::new(1, 1);
        row.set("trip_id", FieldValue::Text(trip_id.to_owned()));
        row.set("route_id", FieldValue::Text(route_id.to_owned()));
        row
    }

    fn route(route_id: &str, route_type: i64) -> Entity {
        let mut row = Entity::new(1, 1);
        row.set("route_id", FieldValue::Text(route_id.to_owned()));
        row.set("route_type", FieldValue::Integer(route_type));
        row
    }

    #[test]
    fn flags_an_impossibly_fast_bus_hop() {
        let stops = vec![stop("A", 52.5, 13.4), stop("B", 53.5, 13.4)]; // ~111km apart
        let trips = vec![trip("T1", "R1")];
        let routes = vec![route("R1", 3)]; // bus
        let stop_times = vec![
            stop_time("T1", 0, "A", 0),
            stop_time("T1", 1, "B", 60), // 1 minute for 111km
        ];
        let mut errors = ErrorStore::new(100);
        check(&stop_times, &trips, &routes, &stops, &LoaderConfig::default(), &mut errors);
        assert!(errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::TravelTooFast));
    }

    #[test]
    fn flags_an_implausibly_slow_bus_hop() {
        let stops = vec![stop("A", 52.5, 13.4), stop("B", 53.5, 13.4)]; // ~111km apart
        let trips = vec![trip("T1", "R1")];
        let routes = vec![route("R1", 3)]; // bus, min 2 km/h
        // 111km over 90h is ~1.2 km/h, under the bus floor of 2 km/h.
        let stop_times = vec![
            stop_time("T1", 0, "A", 0),
            stop_time("T1", 1, "B", 90 * 3600),
        ];
        let mut errors = ErrorStore::new(100);
        check(&stop_times, &trips, &routes, &stops, &LoaderConfig::default(), &mut errors);
        assert!(errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::TravelTooSlow));
    }

    #[test]
    fn accepts_a_reasonable_bus_hop() {
        let stops = vec![stop("A", 52.5, 13.4), stop("B", 52.51, 13.41)];
        let trips = vec![trip("T1", "R1")];
        let routes = vec![route("R1", 3)];
        let stop_times = vec![
            stop_time("T1", 0, "A", 0),
            stop_time("T1", 1, "B", 300),
        ];
        let mut errors = ErrorStore::new(100);
        check(&stop_times, &trips, &routes, &stops, &LoaderConfig::default(), &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn skips_and_flags_a_hop_touching_a_flex_location() {
        let stops = vec![stop("A", 52.5, 13.4)];
        let trips = vec![trip("T1", "R1")];
        let routes = vec![route("R1", 3)];
        let mut flex_row = Entity::new(1, 1);
        flex_row.set("trip_id", FieldValue::Text("T1".to_owned()));
        flex_row.set("location_id", FieldValue::Text("L1".to_owned()));
        flex_row.set("stop_sequence", FieldValue::Integer(1));
        flex_row.set(
            "start_pickup_drop_off_window",
            FieldValue::TimeOfDay(300),
        );
        let stop_times = vec![stop_time("T1", 0, "A", 0), flex_row];
        let mut errors = ErrorStore::new(100);
        check(&stop_times, &trips, &routes, &stops, &LoaderConfig::default(), &mut errors);
        assert!(errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::TripSpeedNotValidated));
        assert!(!errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::TravelTooFast || r.kind == ErrorKind::TravelTooSlow));
    }
}
