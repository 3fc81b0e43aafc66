//! Typed row structs, one module per GTFS/GTFS-Flex table. These are the
//! ergonomic projection of an [`crate::value::Entity`] the loader hands to
//! the pattern finder, the validators, and the exporter — the generic
//! `Entity`/`FieldValue` representation is what actually gets validated and
//! stored; these structs are a convenience view over already-coerced data.

pub mod agency;
pub mod attributions;
pub mod calendar;
pub mod calendar_dates;
pub mod fares;
pub mod feed_info;
pub mod flex;
pub mod frequencies;
pub mod routes;
pub mod shapes;
pub mod stop_times;
pub mod stops;
pub mod transfers;
pub mod trips;

pub use agency::Agency;
pub use attributions::{Attribution, Translation};
pub use calendar::Calendar;
pub use calendar_dates::CalendarDate;
pub use fares::{FareAttribute, FareRule};
pub use feed_info::FeedInfo;
pub use flex::{BookingRule, Location, LocationGroup, LocationGroupStop};
pub use frequencies::Frequency;
pub use routes::Route;
pub use shapes::ShapePoint;
pub use stop_times::StopTime;
pub use stops::Stop;
pub use transfers::Transfer;
pub use trips::Trip;
