//! Per-field parse/validate functions (component C4).
//!
//! Each function takes the raw string from a CSV cell and either returns a
//! coerced [`FieldValue`] or pushes a format-level [`ErrorKind`] onto the
//! caller's [`ErrorStore`] and returns `None`. A `None` result always means
//! "this column is NULL for this row" to the rest of the pipeline, whether
//! that's because the cell was empty or because it failed to parse — the
//! loader doesn't distinguish the two once coercion is done, which mirrors
//! how a SQL `NULL` behaves either way downstream.

use chrono::NaiveDate;
use gtfs_model::schema::{FieldDescriptor, FieldType, Requirement};
use gtfs_model::{ErrorKind, ErrorRecord, FieldValue};

use crate::error_store::ErrorStore;

/// Everything downstream coercion needs to know about the row a value came
/// from, so error records are self-describing without the caller having to
/// thread table/line/entity-id through every call site.
pub struct LineContext<'a> {
    pub table: &'a str,
    pub line: u64,
    pub entity_id: Option<&'a str>,
}

impl<'a> LineContext<'a> {
    fn error(&self, kind: ErrorKind) -> ErrorRecord {
        let mut record = ErrorRecord::new(kind, self.table).with_line(self.line);
        if let Some(id) = self.entity_id {
            record = record.with_entity_id(id);
        }
        record
    }
}

/// Coerce one raw cell according to `field`'s declared semantic type.
///
/// `raw` is `None` when the column was entirely absent from the header (in
/// which case requiredness is the only thing checked) and `Some("")` when
/// the column exists but the cell was blank — both are treated as "no
/// value" for the purposes of requiredness, but only a present-and-wrong
/// value produces a format error.
pub fn coerce(
    field: &FieldDescriptor,
    raw: Option<&str>,
    ctx: &LineContext,
    errors: &mut ErrorStore,
) -> Option<FieldValue> {
    let trimmed = raw.map(str::trim).unwrap_or("");

    if trimmed.is_empty() {
        if field.requirement == Requirement::Required {
            errors.push(
                ctx.error(ErrorKind::MissingField)
                    .with_field(field.name),
            );
        }
        return None;
    }

    match parse_typed(field.field_type, trimmed) {
        Ok(value) => Some(value),
        Err(kind) => {
            errors.push(
                ctx.error(kind)
                    .with_field(field.name)
                    .with_bad_value(trimmed),
            );
            None
        }
    }
}

fn parse_typed(field_type: FieldType, raw: &str) -> Result<FieldValue, ErrorKind> {
    match field_type {
        FieldType::ShortText | FieldType::LongText | FieldType::Id => {
            Ok(FieldValue::Text(raw.to_owned()))
        }
        FieldType::IdList => Ok(FieldValue::List(
            raw.split(',').map(|s| s.trim().to_owned()).collect(),
        )),
        FieldType::Integer => raw
            .parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|_| ErrorKind::IntegerFormat),
        FieldType::Double => raw
            .parse::<f64>()
            .map(FieldValue::Double)
            .map_err(|_| ErrorKind::DoubleFormat),
        FieldType::Date => NaiveDate::parse_from_str(raw, "%Y%m%d")
            .map(FieldValue::Date)
            .map_err(|_| ErrorKind::DateFormat),
        FieldType::TimeOfDay => parse_time_of_day(raw)
            .map(FieldValue::TimeOfDay)
            .ok_or(ErrorKind::TimeFormat),
        FieldType::Color => parse_color(raw)
            .map(FieldValue::Text)
            .ok_or(ErrorKind::ColorFormat),
        FieldType::Url => {
            if raw.starts_with("http://") || raw.starts_with("https://") {
                Ok(FieldValue::Text(raw.to_owned()))
            } else {
                Err(ErrorKind::UrlFormat)
            }
        }
        FieldType::Email => {
            if raw.contains('@') && !raw.starts_with('@') && !raw.ends_with('@') {
                Ok(FieldValue::Text(raw.to_owned()))
            } else {
                Err(ErrorKind::EmailFormat)
            }
        }
        FieldType::LanguageCode => {
            if raw.len() >= 2 && raw.is_ascii() {
                Ok(FieldValue::Text(raw.to_lowercase()))
            } else {
                Err(ErrorKind::LanguageFormat)
            }
        }
        FieldType::CurrencyCode => {
            if raw.len() == 3 && raw.chars().all(|c| c.is_ascii_alphabetic()) {
                Ok(FieldValue::Text(raw.to_uppercase()))
            } else {
                Err(ErrorKind::CurrencyFormat)
            }
        }
        FieldType::Timezone => {
            if raw.contains('/') {
                Ok(FieldValue::Text(raw.to_owned()))
            } else {
                Err(ErrorKind::TimezoneFormat)
            }
        }
        FieldType::Latitude => raw
            .parse::<f64>()
            .ok()
            .filter(|v| (-90.0..=90.0).contains(v))
            .map(FieldValue::Double)
            .ok_or(ErrorKind::CoordinateOutOfRange),
        FieldType::Longitude => raw
            .parse::<f64>()
            .ok()
            .filter(|v| (-180.0..=180.0).contains(v))
            .map(FieldValue::Double)
            .ok_or(ErrorKind::CoordinateOutOfRange),
        FieldType::EnumCode(allowed) => raw
            .parse::<i64>()
            .ok()
            .filter(|v| allowed.contains(v))
            .map(FieldValue::Integer)
            .ok_or(ErrorKind::EnumValueUnexpected),
        FieldType::Json => serde_json::from_str::<serde_json::Value>(raw)
            .map(|v| FieldValue::Text(v.to_string()))
            .map_err(|_| ErrorKind::IllegalFieldValue),
    }
}

/// `H:MM:SS` or `HH:MM:SS`, hours unbounded so service past midnight (e.g.
/// `25:30:00`) parses as 91800 seconds.
fn parse_time_of_day(raw: &str) -> Option<i64> {
    let mut parts = raw.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: i64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !(0..60).contains(&minutes) || !(0..60).contains(&seconds) {
        return None;
    }
    Some(hours * 3600 + minutes * 60 + seconds)
}

/// `RRGGBB`, no leading `#`, per the GTFS reference.
fn parse_color(raw: &str) -> Option<String> {
    if raw.len() == 6 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(raw.to_uppercase())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_of_day_allows_overflow_past_midnight() {
        assert_eq!(parse_time_of_day("25:30:00"), Some(91800));
        assert_eq!(parse_time_of_day("08:15:00"), Some(29700));
        assert_eq!(parse_time_of_day("08:60:00"), None);
        assert_eq!(parse_time_of_day("not-a-time"), None);
    }

    #[test]
    fn color_requires_six_hex_digits_no_hash() {
        assert_eq!(parse_color("FF8800"), Some("FF8800".to_owned()));
        assert_eq!(parse_color("#FF8800"), None);
        assert_eq!(parse_color("FF88"), None);
    }

    #[test]
    fn missing_required_field_is_reported_once() {
        let field = FieldDescriptor {
            name: "stop_id",
            field_type: FieldType::Id,
            requirement: Requirement::Required,
            reference: None,
        };
        let ctx = LineContext {
            table: "stops",
            line: 4,
            entity_id: None,
        };
        let mut errors = ErrorStore::new(10);
        assert!(coerce(&field, Some(""), &ctx, &mut errors).is_none());
        assert_eq!(errors.count("stops", ErrorKind::MissingField), 1);
    }

    #[test]
    fn json_field_rejects_malformed_geometry() {
        let field = FieldDescriptor {
            name: "geometry",
            field_type: FieldType::Json,
            requirement: Requirement::Required,
            reference: None,
        };
        let ctx = LineContext {
            table: "locations",
            line: 2,
            entity_id: None,
        };
        let mut errors = ErrorStore::new(10);
        assert!(coerce(&field, Some("{not json"), &ctx, &mut errors).is_none());
        assert_eq!(errors.count("locations", ErrorKind::IllegalFieldValue), 1);

        let mut errors = ErrorStore::new(10);
        let value = coerce(
            &field,
            Some("{\"type\":\"Point\",\"coordinates\":[1,2]}"),
            &ctx,
            &mut errors,
        );
        assert!(value.is_some());
        assert!(errors.is_empty());
    }

    #[test]
    fn latitude_out_of_range_is_a_coordinate_error_not_a_format_error() {
        let field = FieldDescriptor {
            name: "stop_lat",
            field_type: FieldType::Latitude,
            requirement: Requirement::Required,
            reference: None,
        };
        let ctx = LineContext {
            table: "stops",
            line: 1,
            entity_id: None,
        };
        let mut errors = ErrorStore::new(10);
        assert!(coerce(&field, Some("95.0"), &ctx, &mut errors).is_none());
        assert_eq!(errors.count("stops", ErrorKind::CoordinateOutOfRange), 1);
    }
}
