//! Flags stops that sit implausibly close to one another — usually the same
//! physical stop entered twice under different ids. Distance is computed in
//! flat meters rather than full haversine since we only care about a ~50m
//! threshold and the approximation error at that scale is negligible; the
//! `cos(lat)` term keeps the longitude degree-to-meter scale honest away
//! from the equator.

use gtfs_model::{Entity, ErrorKind, ErrorRecord};

use crate::error_store::ErrorStore;

const DUPLICATE_THRESHOLD_METERS: f64 = 50.0;
const METERS_PER_DEGREE: f64 = 111_111.0;

pub fn check(stops: &[Entity], errors: &mut ErrorStore) {
    let located: Vec<(&Entity, f64, f64)> = stops
        .iter()
        .filter_map(|s| Some((s, s.double("stop_lat")?, s.double("stop_lon")?)))
        .collect();

    for i in 0..located.len() {
        for j in (i + 1)..located.len() {
            let (stop_a, lat_a, lon_a) = located[i];
            let (stop_b, lat_b, lon_b) = located[j];

            let dlat_m = (lat_a - lat_b) * METERS_PER_DEGREE;
            let dlon_m = (lon_a - lon_b) * METERS_PER_DEGREE * lat_a.to_radians().cos();
            let distance = (dlat_m * dlat_m + dlon_m * dlon_m).sqrt();

            if distance <= DUPLICATE_THRESHOLD_METERS {
                if let Some(id_a) = stop_a.text("stop_id") {
                    errors.push(
                        ErrorRecord::new(ErrorKind::DuplicateStop, "stops")
                            .with_line(stop_a.line)
                            .with_entity_id(id_a)
                            .with_detail(format!(
                                "within {distance:.0}m of {}",
                                stop_b.text("stop_id").unwrap_or("?")
                            )),
                    );
                }
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

    #[test]
    fn flags_two_stops_a_few_meters_apart() {
        let stops = vec![stop("A", 52.5200, 13.4050), stop("B", 52.52001, 13.40501)];
        let mut errors = ErrorStore::new(100);
        check(&stops, &mut errors);
        assert!(errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::DuplicateStop));
    }

    #[test]
    fn accepts_stops_far_apart() {
        let stops = vec![stop("A", 52.5200, 13.4050), stop("B", 52.6000, 13.5000)];
        let mut errors = ErrorStore::new(100);
        check(&stops, &mut errors);
        assert!(errors.is_empty());
    }
}
