use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single coerced field value, as produced by the loader's per-field
/// parsers. `None` in an [`Entity`]'s field map means the column was absent
/// or empty; it is distinct from e.g. `Text(String::new())`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Double(f64),
    Date(NaiveDate),
    /// Seconds since midnight of the service day. May exceed 86400 for
    /// service that runs past midnight.
    TimeOfDay(i64),
    Bool(bool),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            FieldValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_time_of_day(&self) -> Option<i64> {
        match self {
            FieldValue::TimeOfDay(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// A loaded row, tagged with the source line number it came from and a
/// namespace-local monotonic id assigned by the loader.
///
/// The field map is keyed by column name rather than position: columns can
/// appear in any order in the source file, and extension columns the schema
/// registry doesn't know about are simply never inserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub line: u64,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Entity {
    pub fn new(id: i64, line: u64) -> Self {
        Self {
            id,
            line,
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    pub fn integer(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(FieldValue::as_integer)
    }

    pub fn double(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(FieldValue::as_double)
    }

    pub fn date(&self, field: &str) -> Option<NaiveDate> {
        self.get(field).and_then(FieldValue::as_date)
    }

    pub fn time_of_day(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(FieldValue::as_time_of_day)
    }

    pub fn set(&mut self, field: &str, value: FieldValue) {
        self.fields.insert(field.to_owned(), value);
    }
}
