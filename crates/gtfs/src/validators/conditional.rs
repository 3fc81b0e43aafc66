//! Conditionally-required fields: several GTFS columns are only mandatory
//! given the value of another column on the same row (a `stops` row is only
//! required to carry `stop_lat`/`stop_lon` when it's a physical location, not
//! when it's a boarding area that inherits its parent station's position).
//! Expressed as a small table of rules rather than one-off `if`s so adding a
//! new conditional field is a data change, not a new code path.

use gtfs_model::{Entity, ErrorKind, ErrorRecord};

use crate::error_store::ErrorStore;

/// `location_type` values, per GTFS `stops.txt`: 0 = stop/platform (the
/// default when absent), 1 = station, 2 = entrance/exit, 3 = generic node,
/// 4 = boarding area.
const LOCATION_TYPE_STOP_OR_PLATFORM: i64 = 0;
const LOCATION_TYPE_BOARDING_AREA: i64 = 4;

enum Check {
    NotEmpty(&'static str),
    ForeignRefExists(&'static str),
    HasMultipleRowsFor(&'static str),
}

fn location_type_of(row: &Entity) -> i64 {
    row.integer("location_type").unwrap_or(LOCATION_TYPE_STOP_OR_PLATFORM)
}

fn run_check(check: &Check, row: &Entity, entity_type: &str, errors: &mut ErrorStore, detail: &str) {
    let missing = match check {
        Check::NotEmpty(field) => row.get(field).is_none(),
        Check::ForeignRefExists(field) => row.get(field).is_none(),
        // caller already verified the row count condition before invoking us
        Check::HasMultipleRowsFor(_) => true,
    };
    if missing {
        let entity_id = row
            .text("stop_id")
            .or_else(|| row.text("fare_id"))
            .unwrap_or("?");
        errors.push(
            ErrorRecord::new(ErrorKind::ConditionallyRequiredFieldMissing, entity_type)
                .with_line(row.line)
                .with_entity_id(entity_id)
                .with_detail(detail),
        );
    }
}

fn check_stops(stops: &[Entity], errors: &mut ErrorStore) {
    for row in stops {
        match location_type_of(row) {
            LOCATION_TYPE_STOP_OR_PLATFORM => {
                for (check, detail) in [
                    (Check::NotEmpty("stop_name"), "stop_name required for a stop/platform"),
                    (Check::NotEmpty("stop_lat"), "stop_lat required for a stop/platform"),
                    (Check::NotEmpty("stop_lon"), "stop_lon required for a stop/platform"),
                ] {
                    run_check(&check, row, "stops", errors, detail);
                }
            }
            LOCATION_TYPE_BOARDING_AREA => {
                run_check(
                    &Check::ForeignRefExists("parent_station"),
                    row,
                    "stops",
                    errors,
                    "parent_station required for a boarding area",
                );
            }
            _ => {}
        }
    }
}

/// `fare_rules` rows that carry `contains_id` describe zone-based through
/// fares and only make sense as a set of two or more rows sharing the same
/// `fare_id` — a lone `contains_id` row can never match a real itinerary.
fn check_fare_rules(fare_rules: &[Entity], errors: &mut ErrorStore) {
    use std::collections::HashMap;

    let mut rows_per_fare: HashMap<&str, usize> = HashMap::new();
    for row in fare_rules {
        if let Some(fare_id) = row.text("fare_id") {
            if row.text("contains_id").is_some() {
                *rows_per_fare.entry(fare_id).or_insert(0) += 1;
            }
        }
    }

    for row in fare_rules {
        let (Some(fare_id), Some(_)) = (row.text("fare_id"), row.text("contains_id")) else {
            continue;
        };
        if rows_per_fare.get(fare_id).copied().unwrap_or(0) < 2 {
            run_check(
                &Check::HasMultipleRowsFor("contains_id"),
                row,
                "fare_rules",
                errors,
                "a lone contains_id row cannot express a zone-based fare",
            );
        }
    }
}

/// `stops.zone_id` is optional by default, but a `fare_rules` row that names
/// a zone via `origin_id`/`destination_id`/`contains_id` requires that some
/// stop actually carries that `zone_id` — a fare rule referencing a zone no
/// stop declares can never match an itinerary.
fn check_zone_ids(stops: &[Entity], fare_rules: &[Entity], errors: &mut ErrorStore) {
    let referenced_zones: std::collections::HashSet<&str> = fare_rules
        .iter()
        .flat_map(|r| [r.text("origin_id"), r.text("destination_id"), r.text("contains_id")])
        .flatten()
        .collect();
    if referenced_zones.is_empty() {
        return;
    }

    let declared_zones: std::collections::HashSet<&str> =
        stops.iter().filter_map(|s| s.text("zone_id")).collect();

    let mut missing: Vec<&str> = referenced_zones
        .into_iter()
        .filter(|zone_id| !declared_zones.contains(zone_id))
        .collect();
    missing.sort_unstable();

    for zone_id in missing {
        errors.push(
            ErrorRecord::new(ErrorKind::ConditionallyRequiredFieldMissing, "stops").with_bad_value(
                format!("zone_id {zone_id} is required by fare_rules within stops."),
            ),
        );
    }
}

pub fn check(stops: &[Entity], fare_rules: &[Entity], errors: &mut ErrorStore) {
    check_stops(stops, errors);
    check_fare_rules(fare_rules, errors);
    check_zone_ids(stops, fare_rules, errors);
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtfs_model::FieldValue;

    #[test]
    fn flags_a_platform_stop_missing_coordinates() {
        let mut stop = Entity::new(1, 1);
        stop.set("stop_id", FieldValue::Text("S1".to_owned()));
        stop.set("stop_name", FieldValue::Text("Main St".to_owned()));
        let mut errors = ErrorStore::new(100);
        check(&[stop], &[], &mut errors);
        assert!(errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::ConditionallyRequiredFieldMissing));
    }

    #[test]
    fn accepts_a_boarding_area_with_no_coordinates_but_a_parent() {
        let mut stop = Entity::new(1, 1);
        stop.set("stop_id", FieldValue::Text("S1".to_owned()));
        stop.set("location_type", FieldValue::Integer(4));
        stop.set("parent_station", FieldValue::Text("STATION1".to_owned()));
        let mut errors = ErrorStore::new(100);
        check(&[stop], &[], &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn flags_a_zone_referenced_by_fare_rules_but_undeclared_by_any_stop() {
        let mut stop = Entity::new(1, 1);
        stop.set("stop_id", FieldValue::Text("S1".to_owned()));
        stop.set("stop_name", FieldValue::Text("Main St".to_owned()));
        stop.set("stop_lat", FieldValue::Double(37.0));
        stop.set("stop_lon", FieldValue::Double(-121.0));

        let mut rule = Entity::new(1, 1);
        rule.set("fare_id", FieldValue::Text("F1".to_owned()));
        rule.set("origin_id", FieldValue::Text("1".to_owned()));

        let mut errors = ErrorStore::new(100);
        check(&[stop], &[rule], &mut errors);

        let zone_errors: Vec<_> = errors
            .records()
            .iter()
            .filter(|r| {
                r.kind == ErrorKind::ConditionallyRequiredFieldMissing
                    && r.bad_value.as_deref() == Some("zone_id 1 is required by fare_rules within stops.")
            })
            .collect();
        assert_eq!(zone_errors.len(), 1);
    }

    #[test]
    fn flags_a_lone_contains_id_fare_rule() {
        let mut rule = Entity::new(1, 1);
        rule.set("fare_id", FieldValue::Text("F1".to_owned()));
        rule.set("contains_id", FieldValue::Text("Z1".to_owned()));
        let mut errors = ErrorStore::new(100);
        check(&[], &[rule], &mut errors);
        assert!(errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::ConditionallyRequiredFieldMissing));
    }
}
