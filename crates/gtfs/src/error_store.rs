use std::collections::HashMap;

use gtfs_model::{ErrorKind, ErrorRecord, Severity};

/// Accumulates [`ErrorRecord`]s during a load or validation run.
///
/// Per §7's propagation policy, nothing that reaches this store aborts the
/// pipeline — it is purely a sink. The only thing the store enforces itself
/// is the per-(table, kind) cap: once a semantic validator has logged
/// `cap` instances of the same finding against the same table, further
/// instances are counted but not retained, so one systemic problem (every
/// trip in the feed is too fast) doesn't dominate memory or the report.
#[derive(Debug, Default)]
pub struct ErrorStore {
    records: Vec<ErrorRecord>,
    counts: HashMap<(String, ErrorKindKey), usize>,
    cap_per_class: usize,
}

/// `ErrorKind` is `Copy` but not `Hash`; this newtype just borrows its
/// discriminant via `Debug` formatting, which is stable for a fieldless-ish
/// enum and cheap enough for a counting map that only grows to the number of
/// distinct (table, kind) pairs actually seen.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ErrorKindKey(String);

impl From<ErrorKind> for ErrorKindKey {
    fn from(kind: ErrorKind) -> Self {
        ErrorKindKey(format!("{:?}", kind))
    }
}

impl ErrorStore {
    pub fn new(cap_per_class: usize) -> Self {
        Self {
            records: Vec::new(),
            counts: HashMap::new(),
            cap_per_class,
        }
    }

    pub fn push(&mut self, record: ErrorRecord) {
        let key = (record.entity_type.clone(), record.kind.into());
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        if *count <= self.cap_per_class {
            self.records.push(record);
        }
    }

    pub fn count(&self, entity_type: &str, kind: ErrorKind) -> usize {
        self.counts
            .get(&(entity_type.to_owned(), kind.into()))
            .copied()
            .unwrap_or(0)
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn high_severity_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.severity == Severity::High)
            .count()
    }

    pub fn into_records(self) -> Vec<ErrorRecord> {
        self.records
    }

    /// Stable-sorts by `(entity_type, line, kind)` and collapses exact
    /// repeats of `(kind, entity_type, line, entity_id)` — the persisted
    /// order a report or a test assertion can rely on, independent of which
    /// validator happened to run first.
    pub fn into_sorted_records(mut self) -> Vec<ErrorRecord> {
        self.records.sort_by(|a, b| {
            a.entity_type
                .cmp(&b.entity_type)
                .then(a.line.cmp(&b.line))
                .then_with(|| format!("{:?}", a.kind).cmp(&format!("{:?}", b.kind)))
        });
        self.records.dedup_by(|a, b| {
            a.kind == b.kind
                && a.entity_type == b.entity_type
                && a.line == b.line
                && a.entity_id == b.entity_id
        });
        self.records
    }
}
