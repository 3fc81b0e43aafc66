//! Naming-quality nudges: these never indicate broken data, just authoring
//! that will read poorly to riders (a route whose long name just repeats the
//! short name, a stop description that's really just its name again, a trip
//! headsign redundantly prefixed with the route name it's already shown next
//! to).

use gtfs_model::{Entity, ErrorKind, ErrorRecord};

use crate::error_store::ErrorStore;

/// The GTFS reference recommends `route_short_name` read like a badge, not a
/// sentence; six characters comfortably covers things like "71X" or "N-Ring"
/// while catching names that are really long names typed into the wrong
/// column.
const MAX_ROUTE_SHORT_NAME_CHARS: usize = 6;

fn same_text(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn describes_a_destination(headsign: &str) -> bool {
    let lower = headsign.trim().to_lowercase();
    lower.starts_with("to ") || lower.starts_with("towards ")
}

pub fn check(routes: &[Entity], stops: &[Entity], trips: &[Entity], errors: &mut ErrorStore) {
    for route in routes {
        let Some(route_id) = route.text("route_id") else {
            continue;
        };
        let short = route.text("route_short_name");
        let long = route.text("route_long_name");

        if let Some(short) = short {
            if short.trim().chars().count() > MAX_ROUTE_SHORT_NAME_CHARS {
                errors.push(
                    ErrorRecord::new(ErrorKind::RouteShortNameTooLong, "routes")
                        .with_line(route.line)
                        .with_entity_id(route_id)
                        .with_bad_value(short),
                );
            }
        }

        if let (Some(short), Some(long)) = (short, long) {
            if !short.is_empty() && same_text(short, long) {
                errors.push(
                    ErrorRecord::new(ErrorKind::RouteShortAndLongNameEqual, "routes")
                        .with_line(route.line)
                        .with_entity_id(route_id),
                );
            } else if !short.is_empty() && long.to_lowercase().contains(&short.to_lowercase()) {
                errors.push(
                    ErrorRecord::new(ErrorKind::RouteLongNameContainsShortName, "routes")
                        .with_line(route.line)
                        .with_entity_id(route_id),
                );
            }
        }

        if let Some(desc) = route.text("route_desc") {
            let name = long.or(short);
            if let Some(name) = name {
                if same_text(desc, name) {
                    errors.push(
                        ErrorRecord::new(ErrorKind::RouteDescriptionSameAsName, "routes")
                            .with_line(route.line)
                            .with_entity_id(route_id),
                    );
                }
            }
        }
    }

    for stop in stops {
        let Some(stop_id) = stop.text("stop_id") else {
            continue;
        };
        if let (Some(name), Some(desc)) = (stop.text("stop_name"), stop.text("stop_desc")) {
            if same_text(name, desc) {
                errors.push(
                    ErrorRecord::new(ErrorKind::StopDescriptionSameAsName, "stops")
                        .with_line(stop.line)
                        .with_entity_id(stop_id),
                );
            }
        }
    }

    let route_name_by_id: std::collections::HashMap<&str, &str> = routes
        .iter()
        .filter_map(|r| {
            let id = r.text("route_id")?;
            let name = r.text("route_long_name").or_else(|| r.text("route_short_name"))?;
            Some((id, name))
        })
        .collect();

    for trip in trips {
        let (Some(trip_id), Some(headsign)) = (trip.text("trip_id"), trip.text("trip_headsign"))
        else {
            continue;
        };
        let Some(route_name) = trip.text("route_id").and_then(|id| route_name_by_id.get(id)) else {
            continue;
        };
        if !route_name.is_empty() && headsign.to_lowercase().contains(&route_name.to_lowercase()) {
            errors.push(
                ErrorRecord::new(ErrorKind::TripHeadsignContainsRouteName, "trips")
                    .with_line(trip.line)
                    .with_entity_id(trip_id),
            );
        }
    }

    for trip in trips {
        let (Some(trip_id), Some(headsign)) = (trip.text("trip_id"), trip.text("trip_headsign"))
        else {
            continue;
        };
        if !describes_a_destination(headsign) {
            errors.push(
                ErrorRecord::new(
                    ErrorKind::TripHeadsignShouldDescribeDestinationOrWaypoints,
                    "trips",
                )
                .with_line(trip.line)
                .with_entity_id(trip_id)
                .with_bad_value(headsign),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtfs_model::FieldValue;

    #[test]
    fn flags_identical_short_and_long_route_names() {
        let mut route = Entity::new(1, 1);
        route.set("route_id", FieldValue::Text("R1".to_owned()));
        route.set("route_short_name", FieldValue::Text("M10".to_owned()));
        route.set("route_long_name", FieldValue::Text("m10".to_owned()));
        let mut errors = ErrorStore::new(100);
        check(&[route], &[], &[], &mut errors);
        assert!(errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::RouteShortAndLongNameEqual));
    }

    #[test]
    fn flags_a_headsign_that_repeats_the_route_name() {
        let mut route = Entity::new(1, 1);
        route.set("route_id", FieldValue::Text("R1".to_owned()));
        route.set("route_long_name", FieldValue::Text("Ringbahn".to_owned()));

        let mut trip = Entity::new(1, 1);
        trip.set("trip_id", FieldValue::Text("T1".to_owned()));
        trip.set("route_id", FieldValue::Text("R1".to_owned()));
        trip.set("trip_headsign", FieldValue::Text("Ringbahn via Hauptbahnhof".to_owned()));

        let mut errors = ErrorStore::new(100);
        check(&[route], &[], &[trip], &mut errors);
        assert!(errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::TripHeadsignContainsRouteName));
    }

    #[test]
    fn flags_a_route_short_name_longer_than_six_characters() {
        let mut route = Entity::new(1, 1);
        route.set("route_id", FieldValue::Text("R1".to_owned()));
        route.set("route_short_name", FieldValue::Text("Express Line".to_owned()));
        let mut errors = ErrorStore::new(100);
        check(&[route], &[], &[], &mut errors);
        assert!(errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::RouteShortNameTooLong));
    }

    #[test]
    fn flags_a_headsign_that_does_not_describe_a_destination() {
        let mut trip = Entity::new(1, 1);
        trip.set("trip_id", FieldValue::Text("T1".to_owned()));
        trip.set("trip_headsign", FieldValue::Text("Express".to_owned()));
        let mut errors = ErrorStore::new(100);
        check(&[], &[], &[trip], &mut errors);
        assert!(errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::TripHeadsignShouldDescribeDestinationOrWaypoints));
    }

    #[test]
    fn accepts_a_headsign_prefixed_with_towards() {
        let mut trip = Entity::new(1, 1);
        trip.set("trip_id", FieldValue::Text("T1".to_owned()));
        trip.set("trip_headsign", FieldValue::Text("Towards Hauptbahnhof".to_owned()));
        let mut errors = ErrorStore::new(100);
        check(&[], &[], &[trip], &mut errors);
        assert!(!errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::TripHeadsignShouldDescribeDestinationOrWaypoints));
    }

    #[test]
    fn accepts_distinct_names() {
        let mut route = Entity::new(1, 1);
        route.set("route_id", FieldValue::Text("R1".to_owned()));
        route.set("route_short_name", FieldValue::Text("M10".to_owned()));
        route.set("route_long_name", FieldValue::Text("Nordbahnhof - Warschauer Str.".to_owned()));
        let mut errors = ErrorStore::new(100);
        check(&[route], &[], &[], &mut errors);
        assert!(errors.is_empty());
    }
}
