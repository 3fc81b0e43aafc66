use serde::{Deserialize, Serialize};

/// How much a given error kind should worry a feed publisher. Mirrors the
/// severity grouping conveyal-style GTFS validators use: `Low` findings are
/// informational, `High` findings typically mean a consumer will misbehave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Every distinct condition the loader and validator pipeline can report.
/// Grouped the way the narrative spec groups them: format, structure,
/// referential, semantic, heuristic, flex, engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    // -- format: a single field failed to parse as its declared type --
    DateFormat,
    TimeFormat,
    IntegerFormat,
    DoubleFormat,
    ColorFormat,
    UrlFormat,
    EmailFormat,
    LanguageFormat,
    CurrencyFormat,
    TimezoneFormat,
    CoordinateOutOfRange,
    EnumValueUnexpected,
    /// A value that parses as its nominal type but is otherwise invalid,
    /// e.g. a `locations.geojson` feature's `geometry` that isn't valid JSON.
    IllegalFieldValue,
    MissingField,

    // -- structure: the row or file doesn't match the table's shape --
    WrongNumberOfFields,
    DuplicateHeader,
    ColumnNameUnsafe,
    MissingColumn,
    MissingTable,
    TableEmpty,
    DuplicateKey,
    TableInSubdirectory,

    // -- referential: a foreign key doesn't resolve --
    ReferentialIntegrity,
    /// A field referencing a tagged union of tables (e.g. `stop_times.stop_id`
    /// against `stops`/`locations`/`location_groups`) matched none of them.
    MissingForeignTableReference,

    // -- semantic: rows parse and resolve but contradict GTFS or physics --
    TripTimesOutOfOrder,
    TripTimesMissing,
    ShapeDistTraveledDecreasing,
    TravelTooFast,
    TravelTooSlow,
    /// A hop whose speed couldn't be checked because one of its two stops is
    /// a flex location/location-group without fixed coordinates.
    TripSpeedNotValidated,
    ReversedTripShape,
    ServiceNeverActive,
    ServiceUnused,
    TripNeverActive,
    DateNoServiceActive,
    OverlappingTripsInBlock,
    DuplicateStop,
    ConditionallyRequiredFieldMissing,
    /// A stop never appears in any `stop_times` or `transfers` row.
    StopUnused,
    /// A route has no trips referencing it.
    RouteUnused,

    // -- heuristic: naming and authoring-quality nudges --
    RouteShortAndLongNameEqual,
    RouteShortNameTooLong,
    RouteLongNameContainsShortName,
    RouteDescriptionSameAsName,
    StopDescriptionSameAsName,
    TripHeadsignContainsRouteName,
    TripHeadsignShouldDescribeDestinationOrWaypoints,
    PatternNameNotUnique,

    // -- flex: GTFS-Flex specific conformance --
    FlexBookingRuleUnresolved,
    FlexLocationGroupEmpty,
    FlexStopTimeMissingLocation,
    FlexWindowEndBeforeStart,
    FlexPriorNoticeInconsistent,
    /// `booking_type = 0` (real-time booking) forbids `prior_notice_duration_max`
    /// — there is no advance window to bound when booking happens on the spot.
    FlexForbiddenPriorNoticeDurationMax,

    // -- engine --
    ValidatorFailed,
    Other,
}

impl ErrorKind {
    pub fn severity(self) -> Severity {
        use ErrorKind::*;
        match self {
            DateFormat | TimeFormat | IntegerFormat | DoubleFormat | ColorFormat
            | UrlFormat | EmailFormat | LanguageFormat | CurrencyFormat
            | TimezoneFormat | EnumValueUnexpected | IllegalFieldValue => Severity::Low,

            MissingField | CoordinateOutOfRange | WrongNumberOfFields
            | DuplicateHeader | ColumnNameUnsafe | MissingColumn | DuplicateKey => {
                Severity::Medium
            }

            MissingTable | TableEmpty | TableInSubdirectory => Severity::High,

            ReferentialIntegrity | MissingForeignTableReference => Severity::High,

            TripTimesOutOfOrder | TripTimesMissing | ReversedTripShape => {
                Severity::High
            }
            ShapeDistTraveledDecreasing | OverlappingTripsInBlock
            | ConditionallyRequiredFieldMissing => Severity::Medium,
            TravelTooFast | TravelTooSlow => Severity::Medium,
            TripSpeedNotValidated => Severity::Low,
            ServiceNeverActive | ServiceUnused | TripNeverActive
            | DateNoServiceActive => Severity::Low,
            DuplicateStop => Severity::Low,
            StopUnused | RouteUnused => Severity::Low,

            RouteShortAndLongNameEqual
            | RouteShortNameTooLong
            | RouteLongNameContainsShortName
            | RouteDescriptionSameAsName
            | StopDescriptionSameAsName
            | TripHeadsignContainsRouteName
            | TripHeadsignShouldDescribeDestinationOrWaypoints
            | PatternNameNotUnique => Severity::Low,

            FlexBookingRuleUnresolved
            | FlexLocationGroupEmpty
            | FlexStopTimeMissingLocation
            | FlexWindowEndBeforeStart
            | FlexPriorNoticeInconsistent
            | FlexForbiddenPriorNoticeDurationMax => Severity::Medium,

            ValidatorFailed | Other => Severity::High,
        }
    }
}

/// One finding, scoped to a single entity/line where possible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub entity_type: String,
    pub line: Option<u64>,
    pub entity_id: Option<String>,
    pub field: Option<String>,
    pub bad_value: Option<String>,
    pub detail: Option<String>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, entity_type: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            entity_type: entity_type.into(),
            line: None,
            entity_id: None,
            field: None,
            bad_value: None,
            detail: None,
        }
    }

    pub fn with_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_bad_value(mut self, bad_value: impl Into<String>) -> Self {
        self.bad_value = Some(bad_value.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_errors_outrank_format_errors() {
        assert!(ErrorKind::MissingTable.severity() > ErrorKind::DateFormat.severity());
    }
}
