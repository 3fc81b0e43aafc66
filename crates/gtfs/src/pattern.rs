//! Pattern finder (component C7): groups trips on the same route that visit
//! the same stops, in the same order, with the same pickup/drop-off
//! behavior, and invents a human-readable name for each group.
//!
//! §4.6's naming procedure, in the order this module tries it:
//! 1. endpoint pair uniquely identifies the pattern on the route -> "from X to Y"
//! 2. otherwise a via stop unique to the pattern on the route -> "... via Z"
//! 3. otherwise, exactly two patterns share the endpoints and one's stop set
//!    is a superset of the other's -> "local"/"express"
//! 4. otherwise -> "... like trip T0"
//! every name is wrapped with the "{n} stops " prefix and " ({trips} trips)"
//! suffix.

use std::collections::{HashMap, HashSet};

use gtfs_model::derived::{Pattern, PatternHalt, PatternStop};
use gtfs_model::{Entity, ErrorKind, ErrorRecord, FieldValue};
use utility::edit_distance::edit_distance_shorten;

use crate::backend::Backend;
use crate::error_store::ErrorStore;

/// One stop_times row's contribution to a trip's pattern key and, for the
/// trip chosen to represent its pattern, to `pattern_stops`' travel times.
#[derive(Clone)]
struct Halt {
    sequence: i64,
    halt: PatternHalt,
    arrival: Option<i64>,
    departure: Option<i64>,
    window_start: Option<i64>,
    window_end: Option<i64>,
}

struct TripKey {
    trip_id: String,
    route_id: String,
    direction_id: Option<i64>,
    headsign: Option<String>,
    halts: Vec<Halt>,
}

/// FNV-1a, 64-bit. Not cryptographic — just needs to be stable across runs
/// on the same sequence of bytes so re-running the pattern finder on an
/// unchanged feed reassigns the same `pattern_id`s.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn halt_key(halt: &PatternHalt) -> String {
    match halt {
        PatternHalt::Stop {
            stop_id,
            pickup_type,
            drop_off_type,
        } => format!("S:{stop_id}:{pickup_type}:{drop_off_type}"),
        PatternHalt::Location { location_id } => format!("L:{location_id}"),
        PatternHalt::LocationGroup { location_group_id } => format!("G:{location_group_id}"),
    }
}

fn pattern_id_for(route_id: &str, halts: &[Halt]) -> String {
    let joined = halts
        .iter()
        .map(|h| halt_key(&h.halt))
        .collect::<Vec<_>>()
        .join("|");
    let hash = fnv1a(format!("{route_id}\u{1}{joined}").as_bytes());
    format!("{route_id}-{hash:016x}")
}

pub struct PatternFinderOutput {
    pub patterns: Vec<Pattern>,
    pub pattern_stops: Vec<PatternStop>,
}

struct PatternGroup<'a> {
    pattern_id: String,
    route_id: String,
    members: Vec<&'a TripKey>,
}

pub async fn find_patterns(
    backend: &dyn Backend,
    namespace: &str,
    errors: &mut ErrorStore,
) -> Result<PatternFinderOutput, crate::backend::BackendError> {
    let trips = backend.fetch_all(namespace, "trips").await?;
    let stop_times = backend.fetch_all(namespace, "stop_times").await?;
    let stops = backend.fetch_all(namespace, "stops").await?;

    let stop_names: HashMap<String, String> = stops
        .iter()
        .filter_map(|row| {
            let id = row.text("stop_id")?.to_owned();
            let name = row.text("stop_name").unwrap_or(&id).to_owned();
            Some((id, name))
        })
        .collect();

    let halts_by_trip = collect_halts(&stop_times);

    let mut trip_keys = Vec::new();
    for trip in &trips {
        let Some(trip_id) = trip.text("trip_id") else {
            continue;
        };
        let Some(route_id) = trip.text("route_id") else {
            continue;
        };
        let mut halts = halts_by_trip.get(trip_id).cloned().unwrap_or_default();
        halts.sort_by_key(|h| h.sequence);
        trip_keys.push(TripKey {
            trip_id: trip_id.to_owned(),
            route_id: route_id.to_owned(),
            direction_id: trip.integer("direction_id"),
            headsign: trip.text("trip_headsign").map(str::to_owned),
            halts,
        });
    }

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, PatternGroup> = HashMap::new();
    for key in &trip_keys {
        let pattern_id = pattern_id_for(&key.route_id, &key.halts);
        groups
            .entry(pattern_id.clone())
            .or_insert_with(|| {
                order.push(pattern_id.clone());
                PatternGroup {
                    pattern_id: pattern_id.clone(),
                    route_id: key.route_id.clone(),
                    members: Vec::new(),
                }
            })
            .members
            .push(key);
    }

    let mut by_route: HashMap<&str, Vec<&str>> = HashMap::new();
    for pattern_id in &order {
        let route_id = groups[pattern_id].route_id.as_str();
        by_route.entry(route_id).or_default().push(pattern_id);
    }

    let mut names: HashMap<String, String> = HashMap::new();
    for pattern_ids in by_route.values() {
        let route_groups: Vec<&PatternGroup> =
            pattern_ids.iter().map(|id| &groups[*id]).collect();
        name_route_patterns(&route_groups, &stop_names, &mut names, errors);
    }

    let mut patterns = Vec::new();
    let mut pattern_stops = Vec::new();
    let mut trip_pattern_updates: HashMap<String, FieldValue> = HashMap::new();

    for pattern_id in &order {
        let group = &groups[pattern_id];
        let representative = group.members[0];
        let trip_count = group.members.len();
        let direction_id = representative.direction_id;

        patterns.push(Pattern {
            pattern_id: pattern_id.clone(),
            route_id: group.route_id.clone(),
            name: names
                .remove(pattern_id)
                .unwrap_or_else(|| "unnamed pattern".to_owned()),
            direction_id,
            trip_count,
        });

        for member in &group.members {
            trip_pattern_updates.insert(
                member.trip_id.clone(),
                FieldValue::Text(pattern_id.clone()),
            );
        }

        pattern_stops.extend(travel_times(pattern_id, &representative.halts));
    }

    if !trip_pattern_updates.is_empty() {
        backend
            .bulk_update_field(
                namespace,
                "trips",
                "trip_id",
                "pattern_id",
                &trip_pattern_updates,
            )
            .await?;
    }

    Ok(PatternFinderOutput {
        patterns,
        pattern_stops,
    })
}

fn collect_halts(stop_times: &[Entity]) -> HashMap<String, Vec<Halt>> {
    let mut halts_by_trip: HashMap<String, Vec<Halt>> = HashMap::new();
    for st in stop_times {
        let Some(trip_id) = st.text("trip_id") else {
            continue;
        };
        let sequence = st.integer("stop_sequence").unwrap_or(0);
        let halt = if let Some(stop_id) = st.text("stop_id") {
            PatternHalt::Stop {
                stop_id: stop_id.to_owned(),
                pickup_type: st.integer("pickup_type").unwrap_or(0),
                drop_off_type: st.integer("drop_off_type").unwrap_or(0),
            }
        } else if let Some(location_id) = st.text("location_id") {
            PatternHalt::Location {
                location_id: location_id.to_owned(),
            }
        } else if let Some(group_id) = st.text("location_group_id") {
            PatternHalt::LocationGroup {
                location_group_id: group_id.to_owned(),
            }
        } else {
            continue;
        };
        halts_by_trip.entry(trip_id.to_owned()).or_default().push(Halt {
            sequence,
            halt,
            arrival: st.time_of_day("arrival_time"),
            departure: st.time_of_day("departure_time"),
            window_start: st.time_of_day("start_pickup_drop_off_window"),
            window_end: st.time_of_day("end_pickup_drop_off_window"),
        });
    }
    halts_by_trip
}

/// Arrival-like/departure-like pair for a halt, generalized across regular
/// stops (arrival_time/departure_time) and flex halts (the pickup/drop-off
/// window), plus whether it's a flex halt — travel time between two flex
/// halts is always zero regardless of the window values (§4.6).
fn effective_times(halt: &Halt) -> (Option<i64>, Option<i64>, bool) {
    match halt.halt {
        PatternHalt::Stop { .. } => (halt.arrival, halt.departure, false),
        PatternHalt::Location { .. } | PatternHalt::LocationGroup { .. } => {
            (halt.window_start, halt.window_end, true)
        }
    }
}

fn travel_times(pattern_id: &str, halts: &[Halt]) -> Vec<PatternStop> {
    let mut out = Vec::with_capacity(halts.len());
    let mut prev_departure: Option<i64> = None;
    let mut prev_is_flex = false;

    for (index, halt) in halts.iter().enumerate() {
        let (arrival, departure, is_flex) = effective_times(halt);

        let default_travel_time = if index == 0 {
            None
        } else if is_flex && prev_is_flex {
            Some(0)
        } else {
            match (arrival, prev_departure) {
                (Some(a), Some(p)) => Some(a - p),
                _ => None,
            }
        };

        let default_dwell_time = match (arrival, departure) {
            (Some(a), Some(d)) => Some(d - a),
            _ => None,
        };

        if let Some(d) = departure {
            prev_departure = Some(prev_departure.map_or(d, |p| p.max(d)));
        }
        prev_is_flex = is_flex;

        out.push(PatternStop {
            pattern_id: pattern_id.to_owned(),
            stop_sequence: index as i64,
            halt: halt.halt.clone(),
            default_travel_time,
            default_dwell_time,
        });
    }

    out
}

fn halt_name(halt: &PatternHalt, stop_names: &HashMap<String, String>) -> String {
    match halt {
        PatternHalt::Stop { stop_id, .. } => stop_names
            .get(stop_id)
            .cloned()
            .unwrap_or_else(|| stop_id.clone()),
        PatternHalt::Location { location_id } => location_id.clone(),
        PatternHalt::LocationGroup { location_group_id } => location_group_id.clone(),
    }
}

fn intermediate_names(halts: &[Halt], stop_names: &HashMap<String, String>) -> HashSet<String> {
    if halts.len() <= 2 {
        return HashSet::new();
    }
    halts[1..halts.len() - 1]
        .iter()
        .map(|h| halt_name(&h.halt, stop_names))
        .collect()
}

fn name_route_patterns(
    route_groups: &[&PatternGroup],
    stop_names: &HashMap<String, String>,
    names: &mut HashMap<String, String>,
    errors: &mut ErrorStore,
) {
    // Group patterns by (from, to) endpoint name pair to know which need
    // disambiguation at all.
    let mut by_endpoint: HashMap<(String, String), Vec<usize>> = HashMap::new();
    for (i, group) in route_groups.iter().enumerate() {
        let halts = &group.members[0].halts;
        let (Some(first), Some(last)) = (halts.first(), halts.last()) else {
            continue;
        };
        let key = (
            halt_name(&first.halt, stop_names),
            halt_name(&last.halt, stop_names),
        );
        by_endpoint.entry(key).or_default().push(i);
    }

    // How many patterns on this route use each via-candidate stop name, so
    // "unique to this pattern" can be checked with a single pass.
    let mut via_name_counts: HashMap<String, usize> = HashMap::new();
    for group in route_groups {
        for name in intermediate_names(&group.members[0].halts, stop_names) {
            *via_name_counts.entry(name).or_insert(0) += 1;
        }
    }

    for (i, group) in route_groups.iter().enumerate() {
        let halts = &group.members[0].halts;
        let stop_count = halts.len();
        let trip_count: usize = group.members.len();

        let Some(first) = halts.first() else {
            names.insert(group.pattern_id.clone(), "empty pattern".to_owned());
            continue;
        };
        let last = halts.last().unwrap();
        let first_name = halt_name(&first.halt, stop_names);
        let last_name = halt_name(&last.halt, stop_names);
        let base = format!("from {first_name} to {last_name}");

        let siblings = by_endpoint
            .get(&(first_name.clone(), last_name.clone()))
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let core = if siblings.len() <= 1 {
            base
        } else {
            let via = intermediate_names(halts, stop_names)
                .into_iter()
                .filter(|name| via_name_counts.get(name) == Some(&1))
                .min_by_key(|name| edit_distance_shorten(name, &first_name));

            if let Some(via) = via {
                format!("{base} via {via}")
            } else if siblings.len() == 2 {
                let other_index = siblings.iter().find(|&&j| j != i).copied().unwrap();
                let other_halts = &route_groups[other_index].members[0].halts;
                let this_set: HashSet<String> =
                    halts.iter().map(|h| halt_key(&h.halt)).collect();
                let other_set: HashSet<String> =
                    other_halts.iter().map(|h| halt_key(&h.halt)).collect();

                if other_set.is_subset(&this_set) && this_set.len() > other_set.len() {
                    format!("{base} local")
                } else if this_set.is_subset(&other_set) && other_set.len() > this_set.len() {
                    format!("{base} express")
                } else {
                    let t0 = &group.members[0].trip_id;
                    errors.push(
                        ErrorRecord::new(ErrorKind::PatternNameNotUnique, "trips")
                            .with_entity_id(&group.pattern_id),
                    );
                    format!("{base} like trip {t0}")
                }
            } else {
                let t0 = &group.members[0].trip_id;
                errors.push(
                    ErrorRecord::new(ErrorKind::PatternNameNotUnique, "trips")
                        .with_entity_id(&group.pattern_id),
                );
                format!("{base} like trip {t0}")
            }
        };

        names.insert(
            group.pattern_id.clone(),
            format!("{stop_count} stops {core} ({trip_count} trips)"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::in_memory::InMemoryBackend;
    use gtfs_model::FieldValue as FV;

    async fn seed(backend: &InMemoryBackend) {
        backend.create_namespace("ns").await.unwrap();

        let mut stops = Vec::new();
        for (id, name) in [("A", "Alpha"), ("B", "Beta"), ("C", "Gamma"), ("D", "Delta")] {
            let mut row = Entity::new(1, 1);
            row.set("stop_id", FV::Text(id.to_owned()));
            row.set("stop_name", FV::Text(name.to_owned()));
            stops.push(row);
        }
        backend.bulk_copy("ns", "stops", stops).await.unwrap();

        let mut trips = Vec::new();
        for trip_id in ["T-local", "T-express"] {
            let mut row = Entity::new(1, 1);
            row.set("trip_id", FV::Text(trip_id.to_owned()));
            row.set("route_id", FV::Text("R1".to_owned()));
            trips.push(row);
        }
        backend.bulk_copy("ns", "trips", trips).await.unwrap();

        let mut stop_times = Vec::new();
        let local_stops = ["A", "B", "C", "D"];
        for (seq, stop_id) in local_stops.iter().enumerate() {
            let mut row = Entity::new(1, 1);
            row.set("trip_id", FV::Text("T-local".to_owned()));
            row.set("stop_id", FV::Text((*stop_id).to_owned()));
            row.set("stop_sequence", FV::Integer(seq as i64));
            row.set(
                "arrival_time",
                FV::TimeOfDay(7 * 3600 + seq as i64 * 300),
            );
            row.set(
                "departure_time",
                FV::TimeOfDay(7 * 3600 + seq as i64 * 300 + 30),
            );
            stop_times.push(row);
        }
        let express_stops = ["A", "D"];
        for (seq, stop_id) in express_stops.iter().enumerate() {
            let mut row = Entity::new(1, 1);
            row.set("trip_id", FV::Text("T-express".to_owned()));
            row.set("stop_id", FV::Text((*stop_id).to_owned()));
            row.set("stop_sequence", FV::Integer(seq as i64));
            stop_times.push(row);
        }
        backend
            .bulk_copy("ns", "stop_times", stop_times)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn finds_two_distinct_patterns_on_the_same_route() {
        let backend = InMemoryBackend::new();
        seed(&backend).await;

        let mut errors = ErrorStore::new(100);
        let output = find_patterns(&backend, "ns", &mut errors).await.unwrap();
        assert_eq!(output.patterns.len(), 2);
        assert!(output.patterns.iter().all(|p| p.route_id == "R1"));
        assert!(output.patterns.iter().any(|p| p.trip_count == 1));
    }

    #[tokio::test]
    async fn names_local_and_express_patterns() {
        let backend = InMemoryBackend::new();
        seed(&backend).await;

        let mut errors = ErrorStore::new(100);
        let output = find_patterns(&backend, "ns", &mut errors).await.unwrap();
        let names: Vec<&str> = output.patterns.iter().map(|p| p.name.as_str()).collect();
        assert!(names.iter().any(|n| n.contains("local")));
        assert!(names.iter().any(|n| n.contains("express")));
    }

    #[tokio::test]
    async fn pattern_id_is_stable_across_runs() {
        let backend = InMemoryBackend::new();
        seed(&backend).await;

        let mut errors = ErrorStore::new(100);
        let first = find_patterns(&backend, "ns", &mut errors).await.unwrap();
        let second = find_patterns(&backend, "ns", &mut errors).await.unwrap();

        let mut first_ids: Vec<_> = first.patterns.iter().map(|p| p.pattern_id.clone()).collect();
        let mut second_ids: Vec<_> = second.patterns.iter().map(|p| p.pattern_id.clone()).collect();
        first_ids.sort();
        second_ids.sort();
        assert_eq!(first_ids, second_ids);
    }

    #[tokio::test]
    async fn writes_pattern_id_back_onto_trips() {
        let backend = InMemoryBackend::new();
        seed(&backend).await;

        let mut errors = ErrorStore::new(100);
        find_patterns(&backend, "ns", &mut errors).await.unwrap();

        let trips = backend.fetch_all("ns", "trips").await.unwrap();
        assert!(trips.iter().all(|t| t.text("pattern_id").is_some()));
    }

    #[tokio::test]
    async fn travel_time_is_none_at_the_first_stop_and_computed_after() {
        let backend = InMemoryBackend::new();
        seed(&backend).await;

        let mut errors = ErrorStore::new(100);
        let output = find_patterns(&backend, "ns", &mut errors).await.unwrap();
        let local = output
            .patterns
            .iter()
            .find(|p| p.trip_count == 1 && p.name.contains("local"))
            .unwrap();
        let mut stops: Vec<&PatternStop> = output
            .pattern_stops
            .iter()
            .filter(|s| s.pattern_id == local.pattern_id)
            .collect();
        stops.sort_by_key(|s| s.stop_sequence);
        assert_eq!(stops[0].default_travel_time, None);
        assert_eq!(stops[1].default_travel_time, Some(300));
        assert_eq!(stops[0].default_dwell_time, Some(30));
    }
}
