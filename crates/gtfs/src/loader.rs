//! The loader (component C5): walks the schema registry table by table,
//! validates each one's CSV header, coerces every cell, and flushes the
//! resulting rows to a [`Backend`] in batches.
//!
//! Per §7's propagation policy, nothing encountered while reading a single
//! feed's rows is fatal here — a malformed row becomes error records and an
//! absent/null value, never an early return. Only the two things that make
//! the *feed* itself impossible to process (the archive won't open, the
//! backend is unreachable) surface as [`LoadError`].

use std::collections::HashMap;
use std::fmt;

use gtfs_model::schema::TableDescriptor;
use gtfs_model::{Entity, ErrorKind, ErrorRecord, FieldValue, TABLES};

use crate::archive::{Archive, ArchiveError};
use crate::backend::{Backend, BackendError};
use crate::coercion::{self, LineContext};
use crate::error_store::ErrorStore;
use crate::namespace;

#[derive(Debug)]
pub enum LoadError {
    Archive(ArchiveError),
    Backend(BackendError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Archive(e) => write!(f, "{e}"),
            LoadError::Backend(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<ArchiveError> for LoadError {
    fn from(e: ArchiveError) -> Self {
        LoadError::Archive(e)
    }
}

impl From<BackendError> for LoadError {
    fn from(e: BackendError) -> Self {
        LoadError::Backend(e)
    }
}

/// Per-route-type speed ceiling, in km/h, used by the Speed validator. Kept
/// here rather than in the validator module because it is the one piece of
/// pipeline behavior an embedding application is expected to override per
/// deployment (a mountain funicular feed and a high-speed rail feed want
/// very different ceilings).
#[derive(Debug, Clone)]
pub struct SpeedThresholds(pub HashMap<i64, (f64, f64)>);

impl Default for SpeedThresholds {
    fn default() -> Self {
        let mut map = HashMap::new();
        // (min_kmh, max_kmh) per route_type. The minimum is a floor below
        // which a hop is implausibly slow rather than merely unhurried;
        // exact bounds are implementation-tunable (spec.md §9 open question a).
        map.insert(0, (2.0, 100.0)); // tram/streetcar
        map.insert(1, (5.0, 120.0)); // subway/metro
        map.insert(2, (5.0, 300.0)); // rail
        map.insert(3, (2.0, 100.0)); // bus
        map.insert(4, (1.0, 90.0)); // ferry
        map.insert(5, (1.0, 30.0)); // cable tram
        map.insert(6, (1.0, 60.0)); // aerial lift
        map.insert(7, (1.0, 50.0)); // funicular
        map.insert(11, (2.0, 100.0)); // trolleybus
        map.insert(12, (5.0, 150.0)); // monorail
        SpeedThresholds(map)
    }
}

impl SpeedThresholds {
    pub fn max_kmh(&self, route_type: i64) -> f64 {
        self.0.get(&route_type).map(|(_, max)| *max).unwrap_or(100.0)
    }

    pub fn min_kmh(&self, route_type: i64) -> f64 {
        self.0.get(&route_type).map(|(min, _)| *min).unwrap_or(2.0)
    }
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub insert_batch_size: usize,
    pub error_cap_per_class: usize,
    pub speed_thresholds: SpeedThresholds,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            insert_batch_size: 5_000,
            error_cap_per_class: 2_000,
            speed_thresholds: SpeedThresholds::default(),
        }
    }
}

/// What loading one feed produced: the tables that now live in the backend
/// under `namespace`, and whatever the loader itself found wrong with them.
pub struct LoadOutcome {
    pub namespace: String,
    pub tables_loaded: Vec<String>,
    pub errors: ErrorStore,
}

pub async fn load_archive(
    backend: &dyn Backend,
    namespace: &str,
    archive: &mut Archive,
    config: &LoaderConfig,
) -> Result<LoadOutcome, LoadError> {
    backend.create_namespace(namespace).await?;

    let summary = namespace::build_feed_summary(
        namespace.to_owned(),
        archive.fingerprint(),
        chrono::Utc::now(),
        None,
    );
    backend.store_feed_summary(&summary).await?;

    let mut errors = ErrorStore::new(config.error_cap_per_class);
    let mut tables_loaded = Vec::new();

    let known_file_names: Vec<&str> = TABLES.iter().map(|t| t.file_name).collect();
    for nested in archive.nested_tables(&known_file_names) {
        errors.push(ErrorRecord::new(ErrorKind::TableInSubdirectory, nested));
    }

    for table in TABLES {
        log::info!("loader: starting table {}", table.name);
        let result = if table.name == "locations" {
            load_locations_table(backend, namespace, table, archive, config, &mut errors).await
        } else {
            load_table(backend, namespace, table, archive, config, &mut errors).await
        };
        match result {
            Ok(Some(row_count)) => {
                tables_loaded.push(table.name.to_owned());
                if table.required && row_count == 0 {
                    errors.push(ErrorRecord::new(ErrorKind::TableEmpty, table.name));
                }
            }
            Ok(None) => {
                if table.required {
                    errors.push(ErrorRecord::new(ErrorKind::MissingTable, table.name));
                }
            }
            Err(e) => {
                log::warn!("loader: table {} failed to load: {}", table.name, e);
                return Err(e);
            }
        }
        log::info!("loader: finished table {}", table.name);
    }

    Ok(LoadOutcome {
        namespace: namespace.to_owned(),
        tables_loaded,
        errors,
    })
}

/// Returns `Ok(Some(row_count))` if the table's file was present and loaded
/// (`row_count` may be 0), `Ok(None)` if the file was absent.
async fn load_table(
    backend: &dyn Backend,
    namespace: &str,
    table: &TableDescriptor,
    archive: &mut Archive,
    config: &LoaderConfig,
    errors: &mut ErrorStore,
) -> Result<Option<usize>, LoadError> {
    let Some(content) = archive.read_table(table.file_name)? else {
        return Ok(None);
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());

    let header_names: Vec<String> = {
        let headers = reader.headers().map_err(|_| {
            ArchiveError::Encoding {
                file_name: table.file_name.to_owned(),
            }
        })?;
        headers.iter().map(str::to_owned).collect()
    };

    check_header(table, &header_names, errors);

    let mut column_index: HashMap<&str, usize> = HashMap::new();
    for (index, name) in header_names.iter().enumerate() {
        column_index.entry(name.as_str()).or_insert(index);
    }

    let mut batch = Vec::with_capacity(config.insert_batch_size);
    let mut next_id: i64 = 1;
    let mut line: u64 = 1; // header is line 1
    let mut row_count: usize = 0;
    let mut seen_keys: std::collections::HashSet<String> = std::collections::HashSet::new();

    for record in reader.records() {
        line += 1;
        let record = match record {
            Ok(r) => r,
            Err(_) => {
                errors.push(
                    ErrorRecord::new(ErrorKind::WrongNumberOfFields, table.name).with_line(line),
                );
                continue;
            }
        };

        if record.len() != header_names.len() {
            errors.push(
                ErrorRecord::new(ErrorKind::WrongNumberOfFields, table.name).with_line(line),
            );
        }

        let entity_key_field = table.key_fields.first().copied();
        let entity_id = entity_key_field
            .and_then(|f| column_index.get(f).copied())
            .and_then(|idx| record.get(idx))
            .filter(|v| !v.is_empty());

        let ctx = LineContext {
            table: table.name,
            line,
            entity_id,
        };

        let mut entity = Entity::new(next_id, line);
        for field in table.fields {
            let raw = column_index
                .get(field.name)
                .and_then(|&idx| record.get(idx));
            if let Some(value) = coercion::coerce(field, raw, &ctx, errors) {
                entity.set(field.name, value);
            }
        }

        check_duplicate_key(table, &entity, &mut seen_keys, errors);

        next_id += 1;
        row_count += 1;
        batch.push(entity);

        if batch.len() >= config.insert_batch_size {
            let flushed = std::mem::replace(&mut batch, Vec::with_capacity(config.insert_batch_size));
            backend.bulk_copy(namespace, table.name, flushed).await?;
        }
    }

    if !batch.is_empty() {
        backend.bulk_copy(namespace, table.name, batch).await?;
    }

    Ok(Some(row_count))
}

/// Flags a row whose `key_fields` (taken together) repeat an earlier row's,
/// per the registry's "whether uniqueness is enforced" (spec.md §3/§4.1).
/// Skipped when any key field is empty on this row — an absent optional key
/// (e.g. a single-agency feed's blank `agency_id`) isn't a collision.
fn check_duplicate_key(
    table: &TableDescriptor,
    entity: &Entity,
    seen_keys: &mut std::collections::HashSet<String>,
    errors: &mut ErrorStore,
) {
    if table.key_fields.is_empty() {
        return;
    }

    let mut parts = Vec::with_capacity(table.key_fields.len());
    for &field in table.key_fields {
        match entity.get(field) {
            Some(FieldValue::Text(v)) if !v.is_empty() => parts.push(v.clone()),
            Some(FieldValue::Integer(v)) => parts.push(v.to_string()),
            Some(FieldValue::Double(v)) => parts.push(v.to_string()),
            Some(FieldValue::Date(v)) => parts.push(v.to_string()),
            Some(FieldValue::TimeOfDay(v)) => parts.push(v.to_string()),
            Some(FieldValue::Bool(v)) => parts.push(v.to_string()),
            Some(FieldValue::List(v)) => parts.push(v.join(",")),
            _ => return,
        }
    }

    let key = parts.join("\u{1}");
    if !seen_keys.insert(key.clone()) {
        errors.push(
            ErrorRecord::new(ErrorKind::DuplicateKey, table.name)
                .with_line(entity.line)
                .with_bad_value(key),
        );
    }
}

/// `locations.geojson` carries a GeoJSON `FeatureCollection`, not CSV, so it
/// can't go through [`load_table`]'s header/column machinery: one row per
/// `Feature`, keyed by the feature's top-level `id`, with `geometry` kept as
/// opaque JSON.
async fn load_locations_table(
    backend: &dyn Backend,
    namespace: &str,
    table: &TableDescriptor,
    archive: &mut Archive,
    config: &LoaderConfig,
    errors: &mut ErrorStore,
) -> Result<Option<usize>, LoadError> {
    let Some(content) = archive.read_table(table.file_name)? else {
        return Ok(None);
    };

    let parsed: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(_) => {
            errors.push(
                ErrorRecord::new(ErrorKind::IllegalFieldValue, table.name)
                    .with_detail("locations.geojson is not valid JSON"),
            );
            return Ok(Some(0));
        }
    };

    let features = parsed
        .get("features")
        .and_then(|f| f.as_array())
        .cloned()
        .unwrap_or_default();

    let mut batch = Vec::with_capacity(config.insert_batch_size.min(features.len().max(1)));
    let mut next_id: i64 = 1;
    let mut row_count: usize = 0;

    for (index, feature) in features.iter().enumerate() {
        let line = index as u64 + 1;

        let id = feature
            .get("id")
            .and_then(|v| v.as_str().map(str::to_owned).or_else(|| v.as_i64().map(|n| n.to_string())));
        let Some(id) = id else {
            errors.push(
                ErrorRecord::new(ErrorKind::MissingField, table.name)
                    .with_line(line)
                    .with_field("id"),
            );
            continue;
        };

        let Some(geometry) = feature.get("geometry") else {
            errors.push(
                ErrorRecord::new(ErrorKind::MissingField, table.name)
                    .with_line(line)
                    .with_entity_id(id)
                    .with_field("geometry"),
            );
            continue;
        };

        let mut entity = Entity::new(next_id, line);
        entity.set("id", FieldValue::Text(id));
        entity.set("geometry", FieldValue::Text(geometry.to_string()));
        next_id += 1;
        row_count += 1;
        batch.push(entity);

        if batch.len() >= config.insert_batch_size {
            let flushed = std::mem::replace(&mut batch, Vec::with_capacity(config.insert_batch_size));
            backend.bulk_copy(namespace, table.name, flushed).await?;
        }
    }

    if !batch.is_empty() {
        backend.bulk_copy(namespace, table.name, batch).await?;
    }

    Ok(Some(row_count))
}

fn check_header(table: &TableDescriptor, header_names: &[String], errors: &mut ErrorStore) {
    let mut seen = std::collections::HashSet::new();
    for name in header_names {
        if !seen.insert(name.as_str()) {
            errors.push(
                ErrorRecord::new(ErrorKind::DuplicateHeader, table.name).with_field(name.clone()),
            );
        }
        if name.trim() != name || name.is_empty() || name.chars().any(|c| c.is_control()) {
            errors.push(
                ErrorRecord::new(ErrorKind::ColumnNameUnsafe, table.name).with_field(name.clone()),
            );
        }
    }

    for field in table.fields {
        if field.requirement == gtfs_model::schema::Requirement::Required
            && !header_names.iter().any(|h| h == field.name)
        {
            errors.push(
                ErrorRecord::new(ErrorKind::MissingColumn, table.name).with_field(field.name),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::in_memory::InMemoryBackend;

    #[tokio::test]
    async fn loads_a_minimal_agency_table() {
        let backend = InMemoryBackend::new();
        let csv = "agency_name,agency_url,agency_timezone\nTest Agency,https://example.com,Europe/Berlin\n";
        let bytes = crate::archive::tests_support::zip_with(&[("agency.txt", csv)]);
        let mut archive = Archive::open(bytes).unwrap();

        let outcome = load_archive(&backend, "ns1", &mut archive, &LoaderConfig::default())
            .await
            .unwrap();

        assert!(outcome.tables_loaded.contains(&"agency".to_owned()));
        let rows = backend.fetch_all("ns1", "agency").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("agency_name"), Some("Test Agency"));
    }

    #[tokio::test]
    async fn missing_required_table_is_reported() {
        let backend = InMemoryBackend::new();
        let bytes = crate::archive::tests_support::zip_with(&[(
            "agency.txt",
            "agency_name,agency_url,agency_timezone\nA,https://a.example,Europe/Berlin\n",
        )]);
        let mut archive = Archive::open(bytes).unwrap();
        let outcome = load_archive(&backend, "ns2", &mut archive, &LoaderConfig::default())
            .await
            .unwrap();
        assert!(outcome
            .errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::MissingTable && r.entity_type == "stops"));
    }

    #[tokio::test]
    async fn loads_locations_geojson_as_one_row_per_feature() {
        let backend = InMemoryBackend::new();
        let geojson = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","id":"L1","geometry":{"type":"Point","coordinates":[13.4,52.5]},"properties":{}}
        ]}"#;
        let bytes = crate::archive::tests_support::zip_with(&[
            ("agency.txt", "agency_name,agency_url,agency_timezone\nA,https://a.example,Europe/Berlin\n"),
            ("stops.txt", "stop_id,stop_name,stop_lat,stop_lon\nS1,Stop One,52.5,13.4\n"),
            ("routes.txt", "route_id,route_type\nR1,3\n"),
            ("trips.txt", "route_id,service_id,trip_id\nR1,WD,T1\n"),
            ("stop_times.txt", "trip_id,stop_sequence,location_id\nT1,0,L1\n"),
            ("locations.geojson", geojson),
        ]);
        let mut archive = Archive::open(bytes).unwrap();
        let outcome = load_archive(&backend, "ns4", &mut archive, &LoaderConfig::default())
            .await
            .unwrap();

        assert!(outcome.tables_loaded.contains(&"locations".to_owned()));
        let rows = backend.fetch_all("ns4", "locations").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("id"), Some("L1"));
        assert!(rows[0].text("geometry").unwrap().contains("Point"));
    }

    #[tokio::test]
    async fn wrong_field_count_still_checks_required_fields() {
        let backend = InMemoryBackend::new();
        // stop_times header declares 3 columns, the one data row supplies 1.
        let csv = "trip_id,stop_id,stop_sequence\nT1\n";
        let bytes = crate::archive::tests_support::zip_with(&[
            ("agency.txt", "agency_name,agency_url,agency_timezone\nA,https://a.example,Europe/Berlin\n"),
            ("stops.txt", "stop_id,stop_name,stop_lat,stop_lon\nS1,Stop One,52.5,13.4\n"),
            ("routes.txt", "route_id,route_type\nR1,3\n"),
            (
                "trips.txt",
                "route_id,service_id,trip_id\nR1,WD,T1\n",
            ),
            ("stop_times.txt", csv),
        ]);
        let mut archive = Archive::open(bytes).unwrap();
        let outcome = load_archive(&backend, "ns3", &mut archive, &LoaderConfig::default())
            .await
            .unwrap();

        assert!(outcome
            .errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::WrongNumberOfFields && r.entity_type == "stop_times"));
        assert!(outcome
            .errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::MissingField && r.entity_type == "stop_times"));
    }

    #[tokio::test]
    async fn required_table_with_zero_data_rows_is_flagged_empty() {
        let backend = InMemoryBackend::new();
        let bytes = crate::archive::tests_support::zip_with(&[
            ("agency.txt", "agency_name,agency_url,agency_timezone\n"),
            ("stops.txt", "stop_id,stop_name,stop_lat,stop_lon\nS1,Stop One,52.5,13.4\n"),
            ("routes.txt", "route_id,route_type\nR1,3\n"),
            ("trips.txt", "route_id,service_id,trip_id\nR1,WD,T1\n"),
            ("stop_times.txt", "trip_id,stop_id,stop_sequence\nT1,S1,0\n"),
        ]);
        let mut archive = Archive::open(bytes).unwrap();
        let outcome = load_archive(&backend, "ns5", &mut archive, &LoaderConfig::default())
            .await
            .unwrap();

        assert!(outcome.tables_loaded.contains(&"agency".to_owned()));
        assert!(outcome
            .errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::TableEmpty && r.entity_type == "agency"));
    }

    #[tokio::test]
    async fn repeated_key_field_value_is_flagged_as_a_duplicate() {
        let backend = InMemoryBackend::new();
        let bytes = crate::archive::tests_support::zip_with(&[
            ("agency.txt", "agency_name,agency_url,agency_timezone\nA,https://a.example,Europe/Berlin\n"),
            (
                "stops.txt",
                "stop_id,stop_name,stop_lat,stop_lon\nS1,Stop One,52.5,13.4\nS1,Stop One Again,52.6,13.5\n",
            ),
            ("routes.txt", "route_id,route_type\nR1,3\n"),
            ("trips.txt", "route_id,service_id,trip_id\nR1,WD,T1\n"),
            ("stop_times.txt", "trip_id,stop_id,stop_sequence\nT1,S1,0\n"),
        ]);
        let mut archive = Archive::open(bytes).unwrap();
        let outcome = load_archive(&backend, "ns6", &mut archive, &LoaderConfig::default())
            .await
            .unwrap();

        assert!(outcome
            .errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::DuplicateKey && r.entity_type == "stops"));
    }
}
