//! Flags entities nobody else references: a stop that appears in neither
//! `stop_times` nor `transfers`, or a route with no trips. Referential
//! integrity (component C6) already guarantees the reverse direction (every
//! reference resolves to something); this is the complementary check that a
//! declared entity is actually used by anything.

use std::collections::HashSet;

use gtfs_model::{Entity, ErrorKind, ErrorRecord};

use crate::error_store::ErrorStore;

pub fn check(stops: &[Entity], routes: &[Entity], trips: &[Entity], stop_times: &[Entity], transfers: &[Entity], errors: &mut ErrorStore) {
    check_unused_stops(stops, stop_times, transfers, errors);
    check_unused_routes(routes, trips, errors);
}

fn check_unused_stops(stops: &[Entity], stop_times: &[Entity], transfers: &[Entity], errors: &mut ErrorStore) {
    let mut referenced: HashSet<&str> = HashSet::new();
    for st in stop_times {
        if let Some(stop_id) = st.text("stop_id") {
            referenced.insert(stop_id);
        }
    }
    for transfer in transfers {
        if let Some(stop_id) = transfer.text("from_stop_id") {
            referenced.insert(stop_id);
        }
        if let Some(stop_id) = transfer.text("to_stop_id") {
            referenced.insert(stop_id);
        }
    }

    for stop in stops {
        // A station's child stops/entrances are referenced through
        // `parent_station`, not `stop_times` — a station itself being
        // otherwise unused is expected, not an error.
        if stop.integer("location_type").unwrap_or(0) != 0 {
            continue;
        }
        let Some(stop_id) = stop.text("stop_id") else {
            continue;
        };
        if !referenced.contains(stop_id) {
            errors.push(
                ErrorRecord::new(ErrorKind::StopUnused, "stops")
                    .with_line(stop.line)
                    .with_entity_id(stop_id),
            );
        }
    }
}

fn check_unused_routes(routes: &[Entity], trips: &[Entity], errors: &mut ErrorStore) {
    let referenced: HashSet<&str> = trips.iter().filter_map(|t| t.text("route_id")).collect();

    for route in routes {
        let Some(route_id) = route.text("route_id") else {
            continue;
        };
        if !referenced.contains(route_id) {
            errors.push(
                ErrorRecord::new(ErrorKind::RouteUnused, "routes")
                    .with_line(route.line)
                    .with_entity_id(route_id),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtfs_model::FieldValue;

    fn stop(id: &str) -> Entity {
        let mut row = Entity::new(1, 1);
        row.set("stop_id", FieldValue::Text(id.to_owned()));
        row
    }

    fn route(id: &str) -> Entity {
        let mut row = Entity::new(1, 1);
        row.set("route_id", FieldValue::Text(id.to_owned()));
        row
    }

    fn stop_time(stop_id: &str) -> Entity {
        let mut row = Entity::new(1, 1);
        row.set("stop_id", FieldValue::Text(stop_id.to_owned()));
        row
    }

    fn trip(route_id: &str) -> Entity {
        let mut row = Entity::new(1, 1);
        row.set("route_id", FieldValue::Text(route_id.to_owned()));
        row
    }

    #[test]
    fn flags_a_stop_with_no_stop_times_or_transfers() {
        let stops = vec![stop("S1"), stop("S2")];
        let stop_times = vec![stop_time("S1")];
        let mut errors = ErrorStore::new(100);
        check(&stops, &[], &[], &stop_times, &[], &mut errors);
        assert!(errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::StopUnused && r.entity_id.as_deref() == Some("S2")));
        assert!(!errors
            .records()
            .iter()
            .any(|r| r.entity_id.as_deref() == Some("S1")));
    }

    #[test]
    fn a_stop_referenced_only_by_a_transfer_is_not_unused() {
        let stops = vec![stop("S1")];
        let mut transfer = Entity::new(1, 1);
        transfer.set("from_stop_id", FieldValue::Text("S1".to_owned()));
        let mut errors = ErrorStore::new(100);
        check(&stops, &[], &[], &[], &[transfer], &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn flags_a_route_with_no_trips() {
        let routes = vec![route("R1"), route("R2")];
        let trips = vec![trip("R1")];
        let mut errors = ErrorStore::new(100);
        check(&[], &routes, &trips, &[], &[], &mut errors);
        assert!(errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::RouteUnused && r.entity_id.as_deref() == Some("R2")));
    }
}
