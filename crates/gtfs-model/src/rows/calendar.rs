use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utility::serde::date_time::deserialize_yyyymmdd;

/// The day-of-week service pattern for a `service_id`. Presence of a row
/// here is itself meaningful even when every weekday flag is 0: the service
/// may still run via `calendar_dates.txt` additions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calendar {
    pub service_id: String,
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
    pub sunday: bool,
    #[serde(deserialize_with = "deserialize_yyyymmdd")]
    pub start_date: NaiveDate,
    #[serde(deserialize_with = "deserialize_yyyymmdd")]
    pub end_date: NaiveDate,
}
