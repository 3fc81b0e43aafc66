use serde::{Deserialize, Serialize};

/// A transit operator. `agency_id` is optional only when the feed has a
/// single agency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agency {
    pub agency_id: Option<String>,
    pub agency_name: String,
    pub agency_url: String,
    pub agency_timezone: String,
    pub agency_lang: Option<String>,
    pub agency_phone: Option<String>,
    pub agency_fare_url: Option<String>,
    pub agency_email: Option<String>,
}
