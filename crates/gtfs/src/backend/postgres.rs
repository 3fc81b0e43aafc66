//! A Postgres-backed [`Backend`]. Rows are stored generically — one
//! `entities` table keyed by `(namespace, table_name, id)` with the row's
//! coerced fields serialized to `jsonb` — rather than one physical table per
//! GTFS table. That trade keeps the backend schema-registry agnostic (a new
//! table in `gtfs_model::schema` needs no migration) at the cost of losing
//! native column types; DESIGN.md records this as a deliberate simplification
//! of the teacher's one-table-per-entity `database` crate.

use std::collections::{HashMap, HashSet};
use std::env;
use std::fmt::Write as _;

use async_trait::async_trait;
use gtfs_model::{Entity, FeedSummary, FieldValue};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use super::{Backend, BackendError, Result};

pub struct PgBackendConfig {
    pub username: String,
    pub password: String,
    pub hostname: String,
    pub port: u16,
    pub database: String,
}

impl PgBackendConfig {
    pub fn from_env() -> Option<Self> {
        let username = env::var("GTFS_DATABASE_USER").ok()?;
        let password = env::var("GTFS_DATABASE_PASSWORD").ok()?;
        let hostname = env::var("GTFS_DATABASE_HOST").ok()?;
        let port: u16 = env::var("GTFS_DATABASE_PORT").ok()?.parse().ok()?;
        let database = env::var("GTFS_DATABASE_NAME").ok()?;
        Some(Self {
            username,
            password,
            hostname,
            port,
            database,
        })
    }

    fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.hostname, self.port, self.database
        )
    }
}

pub struct PgBackend {
    pool: PgPool,
}

fn convert_error(why: sqlx::Error) -> BackendError {
    match why {
        sqlx::Error::RowNotFound => BackendError::NotFound,
        other => BackendError::Query(Box::new(other)),
    }
}

impl PgBackend {
    pub async fn connect(config: PgBackendConfig) -> std::result::Result<Self, BackendError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.connection_url())
            .await
            .map_err(|e| BackendError::Connection(Box::new(e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS gtfs_namespaces (
                 namespace TEXT PRIMARY KEY,
                 created_at TIMESTAMPTZ NOT NULL DEFAULT now()
             )",
        )
        .execute(&pool)
        .await
        .map_err(convert_error)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS gtfs_entities (
                 namespace TEXT NOT NULL REFERENCES gtfs_namespaces(namespace) ON DELETE CASCADE,
                 table_name TEXT NOT NULL,
                 id BIGINT NOT NULL,
                 line BIGINT NOT NULL,
                 data JSONB NOT NULL,
                 PRIMARY KEY (namespace, table_name, id)
             )",
        )
        .execute(&pool)
        .await
        .map_err(convert_error)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS gtfs_feeds (
                 namespace TEXT PRIMARY KEY,
                 md5 TEXT NOT NULL,
                 sha1 TEXT NOT NULL,
                 crc_xor BIGINT NOT NULL,
                 loaded_date TIMESTAMPTZ NOT NULL,
                 snapshot_of TEXT,
                 deleted BOOLEAN NOT NULL DEFAULT false
             )",
        )
        .execute(&pool)
        .await
        .map_err(convert_error)?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Backend for PgBackend {
    async fn create_namespace(&self, namespace: &str) -> Result<()> {
        sqlx::query("INSERT INTO gtfs_namespaces (namespace) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(namespace)
            .execute(&self.pool)
            .await
            .map_err(convert_error)?;
        Ok(())
    }

    async fn drop_namespace(&self, namespace: &str) -> Result<()> {
        sqlx::query("DELETE FROM gtfs_namespaces WHERE namespace = $1")
            .bind(namespace)
            .execute(&self.pool)
            .await
            .map_err(convert_error)?;
        Ok(())
    }

    async fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM gtfs_namespaces WHERE namespace = $1")
            .bind(namespace)
            .fetch_optional(&self.pool)
            .await
            .map_err(convert_error)?;
        Ok(row.is_some())
    }

    async fn bulk_copy(&self, namespace: &str, table: &str, rows: Vec<Entity>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        // Hand-rolled multi-row INSERT with positional placeholders, the
        // same shape `database::queries::insert_all` builds for its
        // entity tables.
        let mut query_str = String::from(
            "INSERT INTO gtfs_entities (namespace, table_name, id, line, data) VALUES ",
        );
        let mut placeholder = 1;
        for i in 0..rows.len() {
            if i > 0 {
                query_str.push_str(", ");
            }
            write!(
                &mut query_str,
                "(${}, ${}, ${}, ${}, ${})",
                placeholder,
                placeholder + 1,
                placeholder + 2,
                placeholder + 3,
                placeholder + 4
            )
            .unwrap();
            placeholder += 5;
        }
        query_str.push_str(
            " ON CONFLICT (namespace, table_name, id) DO UPDATE SET line = EXCLUDED.line, data = EXCLUDED.data",
        );

        let mut query = sqlx::query(&query_str);
        for row in &rows {
            let data = serde_json::to_value(&row.fields).map_err(|e| {
                BackendError::Query(Box::new(e))
            })?;
            query = query
                .bind(namespace)
                .bind(table)
                .bind(row.id)
                .bind(row.line as i64)
                .bind(data);
        }
        query.execute(&self.pool).await.map_err(convert_error)?;
        Ok(())
    }

    async fn fetch_all(&self, namespace: &str, table: &str) -> Result<Vec<Entity>> {
        let rows = sqlx::query(
            "SELECT id, line, data FROM gtfs_entities WHERE namespace = $1 AND table_name = $2 ORDER BY id",
        )
        .bind(namespace)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(convert_error)?;

        rows.into_iter()
            .map(|row| {
                let id: i64 = row.try_get("id").map_err(convert_error)?;
                let line: i64 = row.try_get("line").map_err(convert_error)?;
                let data: serde_json::Value = row.try_get("data").map_err(convert_error)?;
                let fields = serde_json::from_value(data)
                    .map_err(|e| BackendError::Query(Box::new(e)))?;
                Ok(Entity {
                    id,
                    line: line as u64,
                    fields,
                })
            })
            .collect()
    }

    async fn distinct_values(
        &self,
        namespace: &str,
        table: &str,
        field: &str,
    ) -> Result<HashSet<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT data -> $3 ->> 'v' AS value FROM gtfs_entities
             WHERE namespace = $1 AND table_name = $2 AND data ? $3",
        )
        .bind(namespace)
        .bind(table)
        .bind(field)
        .fetch_all(&self.pool)
        .await
        .map_err(convert_error)?;

        rows.into_iter()
            .filter_map(|row| row.try_get::<Option<String>, _>("value").transpose())
            .map(|v| v.map_err(convert_error))
            .collect()
    }

    async fn snapshot(&self, source: &str, target: &str) -> Result<()> {
        self.create_namespace(target).await?;
        sqlx::query(
            "INSERT INTO gtfs_entities (namespace, table_name, id, line, data)
             SELECT $2, table_name, id, line, data FROM gtfs_entities WHERE namespace = $1",
        )
        .bind(source)
        .bind(target)
        .execute(&self.pool)
        .await
        .map_err(convert_error)?;
        Ok(())
    }

    async fn replace_table(&self, namespace: &str, table: &str, rows: Vec<Entity>) -> Result<()> {
        sqlx::query("DELETE FROM gtfs_entities WHERE namespace = $1 AND table_name = $2")
            .bind(namespace)
            .bind(table)
            .execute(&self.pool)
            .await
            .map_err(convert_error)?;
        self.bulk_copy(namespace, table, rows).await
    }

    async fn bulk_update_field(
        &self,
        namespace: &str,
        table: &str,
        key_field: &str,
        field: &str,
        updates: &HashMap<String, FieldValue>,
    ) -> Result<()> {
        // Mirrors the "temp-table + bulk-copy + join" shape §4.6/§9 call for:
        // stage the updates in a scratch table, then join once instead of
        // issuing one `UPDATE ... WHERE id = $n` per trip.
        sqlx::query(
            "CREATE TEMP TABLE IF NOT EXISTS gtfs_field_updates (
                 key_value TEXT PRIMARY KEY,
                 new_value JSONB NOT NULL
             ) ON COMMIT DROP",
        )
        .execute(&self.pool)
        .await
        .map_err(convert_error)?;
        sqlx::query("TRUNCATE gtfs_field_updates")
            .execute(&self.pool)
            .await
            .map_err(convert_error)?;

        for (key, value) in updates {
            let json = serde_json::to_value(value).map_err(|e| BackendError::Query(Box::new(e)))?;
            sqlx::query(
                "INSERT INTO gtfs_field_updates (key_value, new_value) VALUES ($1, $2)
                 ON CONFLICT (key_value) DO UPDATE SET new_value = EXCLUDED.new_value",
            )
            .bind(key)
            .bind(json)
            .execute(&self.pool)
            .await
            .map_err(convert_error)?;
        }

        sqlx::query(
            "UPDATE gtfs_entities e
             SET data = jsonb_set(e.data, ARRAY[$3], u.new_value)
             FROM gtfs_field_updates u
             WHERE e.namespace = $1 AND e.table_name = $2
               AND e.data -> $4 ->> 'v' = u.key_value",
        )
        .bind(namespace)
        .bind(table)
        .bind(field)
        .bind(key_field)
        .execute(&self.pool)
        .await
        .map_err(convert_error)?;
        Ok(())
    }

    async fn store_feed_summary(&self, summary: &FeedSummary) -> Result<()> {
        sqlx::query(
            "INSERT INTO gtfs_feeds (namespace, md5, sha1, crc_xor, loaded_date, snapshot_of, deleted)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (namespace) DO UPDATE SET
                 md5 = EXCLUDED.md5, sha1 = EXCLUDED.sha1, crc_xor = EXCLUDED.crc_xor,
                 loaded_date = EXCLUDED.loaded_date, snapshot_of = EXCLUDED.snapshot_of,
                 deleted = EXCLUDED.deleted",
        )
        .bind(&summary.namespace)
        .bind(&summary.md5)
        .bind(&summary.sha1)
        .bind(summary.crc_xor as i64)
        .bind(summary.loaded_date)
        .bind(&summary.snapshot_of)
        .bind(summary.deleted)
        .execute(&self.pool)
        .await
        .map_err(convert_error)?;
        Ok(())
    }

    async fn feed_summary(&self, namespace: &str) -> Result<Option<FeedSummary>> {
        let row = sqlx::query(
            "SELECT namespace, md5, sha1, crc_xor, loaded_date, snapshot_of, deleted
             FROM gtfs_feeds WHERE namespace = $1",
        )
        .bind(namespace)
        .fetch_optional(&self.pool)
        .await
        .map_err(convert_error)?;
        row.map(row_to_feed_summary).transpose()
    }

    async fn list_feed_summaries(&self) -> Result<Vec<FeedSummary>> {
        let rows = sqlx::query(
            "SELECT namespace, md5, sha1, crc_xor, loaded_date, snapshot_of, deleted FROM gtfs_feeds",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(convert_error)?;
        rows.into_iter().map(row_to_feed_summary).collect()
    }

    async fn mark_feed_deleted(&self, namespace: &str) -> Result<()> {
        sqlx::query("UPDATE gtfs_feeds SET deleted = true WHERE namespace = $1")
            .bind(namespace)
            .execute(&self.pool)
            .await
            .map_err(convert_error)?;
        Ok(())
    }
}

fn row_to_feed_summary(row: sqlx::postgres::PgRow) -> Result<FeedSummary> {
    let crc_xor: i64 = row.try_get("crc_xor").map_err(convert_error)?;
    Ok(FeedSummary {
        namespace: row.try_get("namespace").map_err(convert_error)?,
        md5: row.try_get("md5").map_err(convert_error)?,
        sha1: row.try_get("sha1").map_err(convert_error)?,
        crc_xor: crc_xor as u32,
        loaded_date: row.try_get("loaded_date").map_err(convert_error)?,
        snapshot_of: row.try_get("snapshot_of").map_err(convert_error)?,
        deleted: row.try_get("deleted").map_err(convert_error)?,
    })
}
