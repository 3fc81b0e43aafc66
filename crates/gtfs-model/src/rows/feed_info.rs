use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// At most one row. Publisher metadata for the feed as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedInfo {
    pub feed_publisher_name: String,
    pub feed_publisher_url: String,
    pub feed_lang: String,
    pub default_lang: Option<String>,
    #[serde(default, deserialize_with = "deserialize_yyyymmdd_option")]
    pub feed_start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_yyyymmdd_option")]
    pub feed_end_date: Option<NaiveDate>,
    pub feed_version: Option<String>,
    pub feed_contact_email: Option<String>,
    pub feed_contact_url: Option<String>,
}

fn deserialize_yyyymmdd_option<'de, D>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(s) if !s.is_empty() => NaiveDate::parse_from_str(&s, "%Y%m%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}
