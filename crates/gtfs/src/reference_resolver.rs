//! Referential integrity resolver (component C6): for every field the
//! schema registry marks as a foreign key, checks that each non-null value
//! actually appears as a key value in the table it references.

use gtfs_model::schema::TABLES;
use gtfs_model::{ErrorKind, ErrorRecord};

use crate::backend::Backend;
use crate::error_store::ErrorStore;

/// Fields whose id space is really a tagged union of several tables rather
/// than a single referent. `stop_times.stop_id` is the only one the GTFS-Flex
/// reference defines this way: a stop_time's "where" may be a physical stop,
/// a flex location, or a location group, and the three id spaces are not
/// merged — only the fact that *some* of them contains the value matters.
const COMPOSITE_STOP_REFERENCES: &[(&str, &str)] = &[("stop_times", "stop_id")];

const COMPOSITE_STOP_TABLES: &[(&str, &str)] = &[
    ("stops", "stop_id"),
    ("locations", "id"),
    ("location_groups", "location_group_id"),
];

pub async fn resolve_references(
    backend: &dyn Backend,
    namespace: &str,
    errors: &mut ErrorStore,
) -> Result<(), crate::backend::BackendError> {
    for table in TABLES {
        for field in table.fields {
            let Some(fk) = field.reference else {
                continue;
            };

            if COMPOSITE_STOP_REFERENCES.contains(&(table.name, field.name)) {
                continue;
            }

            let referenced_keys = backend
                .distinct_values(namespace, fk.table, fk.field)
                .await?;

            let rows = backend.fetch_all(namespace, table.name).await?;
            for row in &rows {
                let Some(value) = row.text(field.name) else {
                    continue;
                };
                if !referenced_keys.contains(value) {
                    errors.push(
                        ErrorRecord::new(ErrorKind::ReferentialIntegrity, table.name)
                            .with_line(row.line)
                            .with_field(field.name)
                            .with_bad_value(value)
                            .with_detail(format!("references {}.{}", fk.table, fk.field)),
                    );
                }
            }
        }
    }

    for &(table_name, field_name) in COMPOSITE_STOP_REFERENCES {
        resolve_composite_stop_reference(backend, namespace, table_name, field_name, errors).await?;
    }

    Ok(())
}

/// Checks a composite `stop_id`-shaped field against the union of the three
/// id spaces it may draw from, per the GTFS-Flex tagged-union design: a miss
/// against all three is `MISSING_FOREIGN_TABLE_REFERENCE`, distinct from a
/// miss against a single known referent.
async fn resolve_composite_stop_reference(
    backend: &dyn Backend,
    namespace: &str,
    table_name: &str,
    field_name: &str,
    errors: &mut ErrorStore,
) -> Result<(), crate::backend::BackendError> {
    let mut union = std::collections::HashSet::new();
    for &(referent_table, referent_field) in COMPOSITE_STOP_TABLES {
        union.extend(
            backend
                .distinct_values(namespace, referent_table, referent_field)
                .await?,
        );
    }

    let rows = backend.fetch_all(namespace, table_name).await?;
    for row in &rows {
        let Some(value) = row.text(field_name) else {
            continue;
        };
        if !union.contains(value) {
            errors.push(
                ErrorRecord::new(ErrorKind::MissingForeignTableReference, table_name)
                    .with_line(row.line)
                    .with_field(field_name)
                    .with_bad_value(value),
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::in_memory::InMemoryBackend;
    use gtfs_model::{Entity, FieldValue};

    #[tokio::test]
    async fn flags_a_trip_referencing_a_nonexistent_route() {
        let backend = InMemoryBackend::new();
        backend.create_namespace("ns").await.unwrap();

        let mut route = Entity::new(1, 2);
        route.set("route_id", FieldValue::Text("R1".to_owned()));
        backend.bulk_copy("ns", "routes", vec![route]).await.unwrap();

        let mut trip = Entity::new(1, 2);
        trip.set("route_id", FieldValue::Text("R-missing".to_owned()));
        trip.set("trip_id", FieldValue::Text("T1".to_owned()));
        backend.bulk_copy("ns", "trips", vec![trip]).await.unwrap();

        let mut errors = ErrorStore::new(100);
        resolve_references(&backend, "ns", &mut errors).await.unwrap();

        assert!(errors
            .records()
            .iter()
            .any(|r| r.kind == ErrorKind::ReferentialIntegrity && r.entity_type == "trips"));
    }
}
