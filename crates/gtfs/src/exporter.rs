//! Exporter (component C10): streams a namespace's tables back out as a GTFS
//! zip, the inverse of the loader's coercion step. Column order and presence
//! follow the schema registry rather than whatever order a backend happens
//! to return fields in, so two exports of an unchanged feed produce
//! byte-identical CSVs.

use std::fmt;
use std::io::{Cursor, Write};

use gtfs_model::schema::{FieldType, TableDescriptor};
use gtfs_model::{Entity, FieldValue, TABLES};
use zip::write::SimpleFileOptions;

use crate::backend::{Backend, BackendError};

#[derive(Debug)]
pub enum ExportError {
    Backend(BackendError),
    Zip(zip::result::ZipError),
    Io(std::io::Error),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Backend(e) => write!(f, "{e}"),
            ExportError::Zip(e) => write!(f, "failed writing export zip: {e}"),
            ExportError::Io(e) => write!(f, "i/o error writing export: {e}"),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<BackendError> for ExportError {
    fn from(e: BackendError) -> Self {
        ExportError::Backend(e)
    }
}

impl From<zip::result::ZipError> for ExportError {
    fn from(e: zip::result::ZipError) -> Self {
        ExportError::Zip(e)
    }
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        ExportError::Io(e)
    }
}

/// Columns that only make sense inside the editing tool this data model
/// originated from (never part of the GTFS reference spec); omitted unless
/// the caller explicitly asks to keep them, e.g. when exporting a feed for
/// re-import into the same editor rather than for consumption by a rider
/// app or validator.
const EDITOR_ONLY_FIELDS: &[&str] = &["pattern_id"];

#[derive(Debug, Clone, Default)]
pub struct ExportConfig {
    pub include_editor_columns: bool,
}

pub async fn export_namespace(
    backend: &dyn Backend,
    namespace: &str,
    config: &ExportConfig,
) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options = SimpleFileOptions::default();

        for table in TABLES {
            let rows = backend.fetch_all(namespace, table.name).await?;
            if rows.is_empty() {
                continue;
            }

            let bytes = if table.name == "locations" {
                render_locations(&rows)
            } else {
                render_table(table, &rows, config)
            };
            writer.start_file(table.file_name, options)?;
            writer.write_all(&bytes)?;
        }

        writer.finish()?;
    }
    Ok(buf)
}

fn render_table(table: &TableDescriptor, rows: &[Entity], config: &ExportConfig) -> Vec<u8> {
    let fields: Vec<_> = table
        .fields
        .iter()
        .filter(|f| config.include_editor_columns || !EDITOR_ONLY_FIELDS.contains(&f.name))
        .collect();

    let mut out = csv::WriterBuilder::new().from_writer(Vec::new());
    let header: Vec<&str> = fields.iter().map(|f| f.name).collect();
    out.write_record(&header).expect("in-memory csv writer");

    for row in rows {
        let record: Vec<String> = fields
            .iter()
            .map(|f| {
                row.get(f.name)
                    .map(|v| render_value(f.field_type, v))
                    .unwrap_or_default()
            })
            .collect();
        out.write_record(&record).expect("in-memory csv writer");
    }

    out.flush().expect("in-memory csv writer");
    out.into_inner().expect("in-memory csv writer")
}

/// Rebuilds the GeoJSON `FeatureCollection` `locations.geojson` was flattened
/// from at load time, rather than running it through the CSV renderer.
fn render_locations(rows: &[Entity]) -> Vec<u8> {
    let features: Vec<serde_json::Value> = rows
        .iter()
        .filter_map(|row| {
            let id = row.text("id")?;
            let geometry_raw = row.text("geometry")?;
            let geometry: serde_json::Value =
                serde_json::from_str(geometry_raw).unwrap_or(serde_json::Value::Null);
            Some(serde_json::json!({
                "type": "Feature",
                "id": id,
                "geometry": geometry,
                "properties": {},
            }))
        })
        .collect();

    let collection = serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
    });
    serde_json::to_vec(&collection).expect("in-memory json writer")
}

fn render_value(field_type: FieldType, value: &FieldValue) -> String {
    match (field_type, value) {
        (FieldType::Date, FieldValue::Date(d)) => d.format("%Y%m%d").to_string(),
        (FieldType::TimeOfDay, FieldValue::TimeOfDay(seconds)) => format_time_of_day(*seconds),
        (FieldType::IdList, FieldValue::List(items)) => items.join(","),
        (_, FieldValue::Text(s)) => s.clone(),
        (_, FieldValue::Integer(n)) => n.to_string(),
        (_, FieldValue::Double(n)) => n.to_string(),
        (_, FieldValue::Bool(b)) => {
            if *b {
                "1".to_owned()
            } else {
                "0".to_owned()
            }
        }
        (_, other) => format!("{other:?}"),
    }
}

fn format_time_of_day(total_seconds: i64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::in_memory::InMemoryBackend;
    use std::io::Read;

    fn zip_file_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        archive.file_names().map(str::to_owned).collect()
    }

    #[tokio::test]
    async fn exports_only_non_empty_tables() {
        let backend = InMemoryBackend::new();
        backend.create_namespace("ns").await.unwrap();

        let mut agency = Entity::new(1, 2);
        agency.set("agency_name", FieldValue::Text("Test Agency".to_owned()));
        agency.set("agency_url", FieldValue::Text("https://example.com".to_owned()));
        agency.set("agency_timezone", FieldValue::Text("Europe/Berlin".to_owned()));
        backend.bulk_copy("ns", "agency", vec![agency]).await.unwrap();

        let bytes = export_namespace(&backend, "ns", &ExportConfig::default())
            .await
            .unwrap();
        let names = zip_file_names(&bytes);
        assert!(names.contains(&"agency.txt".to_owned()));
        assert!(!names.contains(&"stops.txt".to_owned()));
    }

    #[tokio::test]
    async fn round_trips_a_time_of_day_past_midnight() {
        let backend = InMemoryBackend::new();
        backend.create_namespace("ns").await.unwrap();

        let mut stop_time = Entity::new(1, 2);
        stop_time.set("trip_id", FieldValue::Text("T1".to_owned()));
        stop_time.set("stop_sequence", FieldValue::Integer(0));
        stop_time.set("arrival_time", FieldValue::TimeOfDay(91800));
        stop_time.set("departure_time", FieldValue::TimeOfDay(91800));
        backend
            .bulk_copy("ns", "stop_times", vec![stop_time])
            .await
            .unwrap();

        let bytes = export_namespace(&backend, "ns", &ExportConfig::default())
            .await
            .unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(&bytes)).unwrap();
        let mut content = String::new();
        archive
            .by_name("stop_times.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert!(content.contains("25:30:00"));
    }

    #[tokio::test]
    async fn exports_locations_as_a_geojson_feature_collection() {
        let backend = InMemoryBackend::new();
        backend.create_namespace("ns").await.unwrap();

        let mut location = Entity::new(1, 2);
        location.set("id", FieldValue::Text("L1".to_owned()));
        location.set(
            "geometry",
            FieldValue::Text(r#"{"type":"Point","coordinates":[13.4,52.5]}"#.to_owned()),
        );
        backend
            .bulk_copy("ns", "locations", vec![location])
            .await
            .unwrap();

        let bytes = export_namespace(&backend, "ns", &ExportConfig::default())
            .await
            .unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(&bytes)).unwrap();
        let mut content = String::new();
        archive
            .by_name("locations.geojson")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["features"][0]["id"], "L1");
        assert_eq!(parsed["features"][0]["geometry"]["type"], "Point");
    }

    #[tokio::test]
    async fn suppresses_editor_only_columns_by_default() {
        let backend = InMemoryBackend::new();
        backend.create_namespace("ns").await.unwrap();

        let mut trip = Entity::new(1, 2);
        trip.set("trip_id", FieldValue::Text("T1".to_owned()));
        trip.set("route_id", FieldValue::Text("R1".to_owned()));
        trip.set("service_id", FieldValue::Text("WD".to_owned()));
        trip.set("pattern_id", FieldValue::Text("R1-abc".to_owned()));
        backend.bulk_copy("ns", "trips", vec![trip]).await.unwrap();

        let bytes = export_namespace(&backend, "ns", &ExportConfig::default())
            .await
            .unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(&bytes)).unwrap();
        let mut content = String::new();
        archive
            .by_name("trips.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert!(!content.contains("pattern_id"));
    }
}
