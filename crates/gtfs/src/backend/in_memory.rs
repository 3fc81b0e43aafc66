use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use gtfs_model::{Entity, FeedSummary, FieldValue};

use super::{Backend, BackendError, Result};

#[derive(Default)]
struct Namespace {
    tables: HashMap<String, Vec<Entity>>,
}

/// Everything held in a process-local `Mutex`. Good enough for tests and for
/// embedding applications that don't need the feed to outlive the process;
/// nothing here is meant to survive a restart.
#[derive(Default)]
pub struct InMemoryBackend {
    namespaces: Mutex<HashMap<String, Namespace>>,
    feeds: Mutex<HashMap<String, FeedSummary>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn field_value_key(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => s.clone(),
        FieldValue::Integer(v) => v.to_string(),
        FieldValue::Double(v) => v.to_string(),
        FieldValue::Date(v) => v.format("%Y%m%d").to_string(),
        FieldValue::TimeOfDay(v) => v.to_string(),
        FieldValue::Bool(v) => v.to_string(),
        FieldValue::List(items) => items.join(","),
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn create_namespace(&self, namespace: &str) -> Result<()> {
        let mut namespaces = self.namespaces.lock().unwrap();
        namespaces.entry(namespace.to_owned()).or_default();
        Ok(())
    }

    async fn drop_namespace(&self, namespace: &str) -> Result<()> {
        let mut namespaces = self.namespaces.lock().unwrap();
        namespaces.remove(namespace);
        Ok(())
    }

    async fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        let namespaces = self.namespaces.lock().unwrap();
        Ok(namespaces.contains_key(namespace))
    }

    async fn bulk_copy(&self, namespace: &str, table: &str, rows: Vec<Entity>) -> Result<()> {
        let mut namespaces = self.namespaces.lock().unwrap();
        let ns = namespaces
            .get_mut(namespace)
            .ok_or(BackendError::NotFound)?;
        ns.tables.entry(table.to_owned()).or_default().extend(rows);
        Ok(())
    }

    async fn fetch_all(&self, namespace: &str, table: &str) -> Result<Vec<Entity>> {
        let namespaces = self.namespaces.lock().unwrap();
        let ns = namespaces.get(namespace).ok_or(BackendError::NotFound)?;
        Ok(ns.tables.get(table).cloned().unwrap_or_default())
    }

    async fn distinct_values(
        &self,
        namespace: &str,
        table: &str,
        field: &str,
    ) -> Result<HashSet<String>> {
        let namespaces = self.namespaces.lock().unwrap();
        let ns = namespaces.get(namespace).ok_or(BackendError::NotFound)?;
        let values = ns
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| row.get(field))
                    .map(field_value_key)
                    .collect()
            })
            .unwrap_or_default();
        Ok(values)
    }

    async fn snapshot(&self, source: &str, target: &str) -> Result<()> {
        let mut namespaces = self.namespaces.lock().unwrap();
        let source_ns = namespaces.get(source).ok_or(BackendError::NotFound)?;
        let cloned = Namespace {
            tables: source_ns.tables.clone(),
        };
        namespaces.insert(target.to_owned(), cloned);
        Ok(())
    }

    async fn replace_table(&self, namespace: &str, table: &str, rows: Vec<Entity>) -> Result<()> {
        let mut namespaces = self.namespaces.lock().unwrap();
        let ns = namespaces
            .get_mut(namespace)
            .ok_or(BackendError::NotFound)?;
        ns.tables.insert(table.to_owned(), rows);
        Ok(())
    }

    async fn bulk_update_field(
        &self,
        namespace: &str,
        table: &str,
        key_field: &str,
        field: &str,
        updates: &HashMap<String, FieldValue>,
    ) -> Result<()> {
        let mut namespaces = self.namespaces.lock().unwrap();
        let ns = namespaces
            .get_mut(namespace)
            .ok_or(BackendError::NotFound)?;
        let Some(rows) = ns.tables.get_mut(table) else {
            return Ok(());
        };
        for row in rows.iter_mut() {
            let Some(key) = row.text(key_field).map(str::to_owned) else {
                continue;
            };
            if let Some(value) = updates.get(&key) {
                row.set(field, value.clone());
            }
        }
        Ok(())
    }

    async fn store_feed_summary(&self, summary: &FeedSummary) -> Result<()> {
        let mut feeds = self.feeds.lock().unwrap();
        feeds.insert(summary.namespace.clone(), summary.clone());
        Ok(())
    }

    async fn feed_summary(&self, namespace: &str) -> Result<Option<FeedSummary>> {
        let feeds = self.feeds.lock().unwrap();
        Ok(feeds.get(namespace).cloned())
    }

    async fn list_feed_summaries(&self) -> Result<Vec<FeedSummary>> {
        let feeds = self.feeds.lock().unwrap();
        Ok(feeds.values().cloned().collect())
    }

    async fn mark_feed_deleted(&self, namespace: &str) -> Result<()> {
        let mut feeds = self.feeds.lock().unwrap();
        if let Some(summary) = feeds.get_mut(namespace) {
            summary.deleted = true;
        }
        Ok(())
    }
}
