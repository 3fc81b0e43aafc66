use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i64)]
pub enum PaymentMethod {
    OnBoard = 0,
    BeforeBoarding = 1,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FareAttribute {
    pub fare_id: String,
    pub price: f64,
    pub currency_type: String,
    pub payment_method: PaymentMethod,
    pub transfers: Option<i64>,
    pub agency_id: Option<String>,
    pub transfer_duration: Option<i64>,
}

/// Links a fare to the routes/zones it applies to. A fare with no rule row
/// at all applies network-wide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FareRule {
    pub fare_id: String,
    pub route_id: Option<String>,
    pub origin_id: Option<String>,
    pub destination_id: Option<String>,
    pub contains_id: Option<String>,
}
