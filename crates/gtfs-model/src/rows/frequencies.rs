use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i64)]
pub enum ExactTimes {
    FrequencyBased = 0,
    ScheduleBased = 1,
}

/// Headway-based service for a trip: the trip's own `stop_times.txt` rows
/// give the relative offsets, this table gives the repeat interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frequency {
    pub trip_id: String,
    #[serde(with = "utility::serde::duration")]
    pub start_time: Duration,
    #[serde(with = "utility::serde::duration")]
    pub end_time: Duration,
    pub headway_secs: i64,
    pub exact_times: Option<ExactTimes>,
}
