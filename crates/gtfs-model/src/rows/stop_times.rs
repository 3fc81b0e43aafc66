use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i64)]
pub enum PickupDropOffType {
    RegularlyScheduled = 0,
    NoPickupOrDropOff = 1,
    PhoneAgency = 2,
    CoordinateWithDriver = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i64)]
pub enum Timepoint {
    Approximate = 0,
    Exact = 1,
}

/// One visit of a trip to a stop (or, for GTFS-Flex, a location / location
/// group). Exactly one of `stop_id`, `location_id`, `location_group_id` is
/// set per §4.8's conditional-requirement rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopTime {
    pub trip_id: String,
    #[serde(default, with = "duration_option")]
    pub arrival_time: Option<Duration>,
    #[serde(default, with = "duration_option")]
    pub departure_time: Option<Duration>,
    pub stop_id: Option<String>,
    pub location_group_id: Option<String>,
    pub location_id: Option<String>,
    pub stop_sequence: i64,
    pub stop_headsign: Option<String>,
    #[serde(default, with = "duration_option")]
    pub start_pickup_drop_off_window: Option<Duration>,
    #[serde(default, with = "duration_option")]
    pub end_pickup_drop_off_window: Option<Duration>,
    pub pickup_type: Option<PickupDropOffType>,
    pub drop_off_type: Option<PickupDropOffType>,
    pub shape_dist_traveled: Option<f64>,
    pub timepoint: Option<Timepoint>,
}

mod duration_option {
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
