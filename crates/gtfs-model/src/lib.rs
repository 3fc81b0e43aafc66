//! Schema registry and typed row definitions for GTFS/GTFS-Flex feeds.
//!
//! This crate is pure data: field/table descriptors plus the structs they
//! describe. It has no I/O and no opinion on where a feed's bytes came from
//! or where its rows end up — that's `gtfs`.

pub mod derived;
pub mod errors;
pub mod rows;
pub mod schema;
pub mod value;

pub use derived::{FeedSummary, Pattern, PatternHalt, PatternStop, ServiceDate, ServiceDuration};
pub use errors::{ErrorKind, ErrorRecord, Severity};
pub use schema::{FieldDescriptor, FieldType, ForeignKey, Requirement, TableDescriptor, TABLES};
pub use value::{Entity, FieldValue};
