use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use utility::serde::date_time::deserialize_yyyymmdd;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i64)]
pub enum ExceptionType {
    Added = 1,
    Removed = 2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarDate {
    pub service_id: String,
    #[serde(deserialize_with = "deserialize_yyyymmdd")]
    pub date: NaiveDate,
    pub exception_type: ExceptionType,
}
