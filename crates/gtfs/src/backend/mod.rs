//! The storage seam: everything downstream of coercion (loader output,
//! referential integrity resolver, pattern finder, validators, exporter)
//! talks to a feed only through this trait, never directly to a concrete
//! store. `InMemoryBackend` is the default and what the test suite uses;
//! `postgres::PgBackend` is the same contract against a real database,
//! gated behind the `postgres` feature the way the teacher's own database
//! access is split into its own crate.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use std::collections::HashMap;
use std::error;
use std::fmt;

use async_trait::async_trait;
use gtfs_model::{Entity, FeedSummary, FieldValue};

#[derive(Debug)]
pub enum BackendError {
    NotFound,
    Connection(Box<dyn error::Error + Send + Sync>),
    Query(Box<dyn error::Error + Send + Sync>),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NotFound => write!(f, "not found"),
            BackendError::Connection(e) => write!(f, "backend connection failed: {e}"),
            BackendError::Query(e) => write!(f, "backend query failed: {e}"),
        }
    }
}

impl error::Error for BackendError {}

pub type Result<T> = std::result::Result<T, BackendError>;

/// A relational namespace holding one loaded (or snapshotted) feed's tables,
/// keyed the way `public_transport::database`'s `GtfsDatabase` keys its
/// per-entity tables, generalized to an arbitrary table name since this
/// crate's table set is schema-registry-driven rather than fixed at compile
/// time.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn create_namespace(&self, namespace: &str) -> Result<()>;

    async fn drop_namespace(&self, namespace: &str) -> Result<()>;

    async fn namespace_exists(&self, namespace: &str) -> Result<bool>;

    /// Append rows to `table` within `namespace`. Called once per loader
    /// flush (see `LoaderConfig::insert_batch_size`); backends are free to
    /// batch this however suits them (a single multi-row `INSERT` for
    /// Postgres, a `Vec::extend` for the in-memory backend).
    async fn bulk_copy(&self, namespace: &str, table: &str, rows: Vec<Entity>) -> Result<()>;

    async fn fetch_all(&self, namespace: &str, table: &str) -> Result<Vec<Entity>>;

    /// All distinct values of `field` across every row of `table`, used by
    /// the referential integrity resolver to check membership without
    /// pulling full rows across the wire for every foreign key check.
    async fn distinct_values(
        &self,
        namespace: &str,
        table: &str,
        field: &str,
    ) -> Result<std::collections::HashSet<String>>;

    /// Copy every table of `source` into a freshly created `target`
    /// namespace. Used to implement feed snapshots (§5's "snapshot_of").
    async fn snapshot(&self, source: &str, target: &str) -> Result<()>;

    /// Overwrite every row of `table` with `rows`. Used by the validator
    /// pipeline to (re-)materialize derived tables (`patterns`,
    /// `pattern_stops`, `service_dates`, `service_durations`, `errors`) —
    /// tables that are computed wholesale from already-loaded state rather
    /// than streamed row by row like the loader's `bulk_copy`.
    async fn replace_table(&self, namespace: &str, table: &str, rows: Vec<Entity>) -> Result<()>;

    /// Set `field` on every row of `table` whose `key_field` matches a key
    /// present in `updates`, in one pass. This is the "temp-table + bulk-copy
    /// + join" update §4.6 and §9 call for — the pattern finder uses it to
    /// stamp `pattern_id` onto `trips` without issuing one `UPDATE` per trip.
    async fn bulk_update_field(
        &self,
        namespace: &str,
        table: &str,
        key_field: &str,
        field: &str,
        updates: &HashMap<String, FieldValue>,
    ) -> Result<()>;

    /// Insert or replace the `feeds` bookkeeping row for `namespace`.
    async fn store_feed_summary(&self, summary: &FeedSummary) -> Result<()>;

    async fn feed_summary(&self, namespace: &str) -> Result<Option<FeedSummary>>;

    async fn list_feed_summaries(&self) -> Result<Vec<FeedSummary>>;

    /// Soft-delete: flips `feeds.deleted` without dropping the namespace's
    /// own tables, per §3's "delete marks the feed summary and drops the
    /// schema atomically" lifecycle note — callers that want the schema gone
    /// too call `drop_namespace` alongside this.
    async fn mark_feed_deleted(&self, namespace: &str) -> Result<()>;
}
