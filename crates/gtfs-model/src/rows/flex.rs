use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i64)]
pub enum BookingType {
    RealTime = 0,
    SameDay = 1,
    PriorDays = 2,
}

/// A named set of rules governing when riders may book demand-responsive
/// service. Referenced from `stop_times.txt` via `pickup_booking_rule_id` /
/// `drop_off_booking_rule_id` in the full Flex extension; this crate models
/// the rule itself and leaves that stop_times linkage as a plain `Id` field
/// the Flex validator resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRule {
    pub booking_rule_id: String,
    pub booking_type: BookingType,
    pub prior_notice_duration_min: Option<i64>,
    pub prior_notice_duration_max: Option<i64>,
    pub prior_notice_last_day: Option<i64>,
    #[serde(default, with = "duration_opt")]
    pub prior_notice_last_time: Option<Duration>,
    pub prior_notice_start_day: Option<i64>,
    #[serde(default, with = "duration_opt")]
    pub prior_notice_start_time: Option<Duration>,
    pub prior_notice_service_id: Option<String>,
    pub message: Option<String>,
    pub pickup_message: Option<String>,
    pub drop_off_message: Option<String>,
    pub phone_number: Option<String>,
    pub info_url: Option<String>,
    pub booking_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationGroup {
    pub location_group_id: String,
    pub location_group_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationGroupStop {
    pub location_group_id: String,
    pub stop_id: String,
}

/// One GeoJSON `Feature` from `locations.geojson`. Geometry is kept opaque:
/// this crate validates that a referenced `location_id` exists, not that the
/// polygon itself is well-formed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub geometry: serde_json::Value,
}

mod duration_opt {
    use chrono::Duration;
    use serde::{Deserializer, Serializer};
    use utility::serde::duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration::serialize_option(value, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        duration::deserialize_option(deserializer)
    }
}
