//! Tables the validator pipeline writes itself, rather than rows read
//! straight out of the archive: patterns, expanded service dates, and the
//! per-feed bookkeeping row in the `feeds` table.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One stop, or one flex location/location-group, visited by a pattern, in
/// visit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PatternHalt {
    Stop {
        stop_id: String,
        pickup_type: i64,
        drop_off_type: i64,
    },
    Location {
        location_id: String,
    },
    LocationGroup {
        location_group_id: String,
    },
}

/// A pattern is the set of trips on a route that visit the same sequence of
/// stops/locations with the same pickup/drop-off behavior. `pattern_id` is a
/// deterministic hash of that sequence, so re-running the pattern finder on
/// an unchanged feed reassigns the same ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub pattern_id: String,
    pub route_id: String,
    pub name: String,
    pub direction_id: Option<i64>,
    pub trip_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternStop {
    pub pattern_id: String,
    pub stop_sequence: i64,
    pub halt: PatternHalt,
    /// Time elapsed since the previous halt's departure (or, between two
    /// flex halts, always `0`). `None` when either operand was missing on
    /// the representative trip (GTFS's `INT_MISSING` propagation, §4.6).
    pub default_travel_time: Option<i64>,
    /// Time spent waiting at this halt before departing, `None` under the
    /// same missing-operand rule.
    pub default_dwell_time: Option<i64>,
}

/// One calendar day on which a given `service_id` runs, after folding
/// `calendar.txt`'s day-of-week bitmask with `calendar_dates.txt`'s
/// exceptions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ServiceDate {
    pub service_id_index: u32,
    pub date: NaiveDate,
}

/// Total scheduled revenue time, in seconds, that a service_id operates on a
/// given calendar date, broken out per GTFS `route_type`. Used by the
/// plausibility checks and exposed to embedding applications for reporting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ServiceDuration {
    pub service_id_index: u32,
    pub date: NaiveDate,
    pub route_type: i64,
    pub duration_seconds: i64,
}

/// The row `feeds` carries about a single loaded (or snapshotted) feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSummary {
    pub namespace: String,
    pub md5: String,
    pub sha1: String,
    /// XOR of the CRC-32 of every entry in the archive, order independent;
    /// used to detect "same bytes, different zip layout" duplicates cheaply.
    pub crc_xor: u32,
    pub loaded_date: chrono::DateTime<chrono::Utc>,
    pub snapshot_of: Option<String>,
    pub deleted: bool,
}
