//! Declarative description of the tables and fields this crate understands.
//!
//! The loader (in `gtfs`) walks this registry to validate CSV headers before
//! it ever looks at a row, to decide load order (parent tables before the
//! children that reference them) and to hand the per-field coercion
//! functions the semantic type they need to parse against. It is data, not
//! behavior: parsing and validation logic live in `gtfs::coercion`.

/// The semantic type of a field, used to pick a parser and, eventually, a
/// Postgres column type for the exporter/backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    ShortText,
    LongText,
    Integer,
    Double,
    Date,
    TimeOfDay,
    Color,
    Url,
    Email,
    LanguageCode,
    CurrencyCode,
    Latitude,
    Longitude,
    Timezone,
    /// An integer field restricted to a fixed, named set of codes.
    EnumCode(&'static [i64]),
    /// An opaque identifier used as this table's key or referenced by
    /// another table's foreign key.
    Id,
    /// Comma-separated list of identifiers (only used by a couple of flex
    /// fields, e.g. `locations_id` grouping extensions).
    IdList,
    /// Arbitrary JSON, stored as its minified text form. Only `locations.id`'s
    /// `geometry` uses this today (a GeoJSON `Geometry` object); this crate
    /// validates that it parses, not that it is a well-formed polygon.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional,
    /// Required only under a condition spelled out by a semantic validator
    /// (e.g. `stops.zone_id` when `fare_rules.txt` is present).
    ConditionallyRequired,
}

/// A field that is expected to match a key field in another table.
#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    pub table: &'static str,
    pub field: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub field_type: FieldType,
    pub requirement: Requirement,
    pub reference: Option<ForeignKey>,
}

const fn required(name: &'static str, field_type: FieldType) -> FieldDescriptor {
    FieldDescriptor {
        name,
        field_type,
        requirement: Requirement::Required,
        reference: None,
    }
}

const fn optional(name: &'static str, field_type: FieldType) -> FieldDescriptor {
    FieldDescriptor {
        name,
        field_type,
        requirement: Requirement::Optional,
        reference: None,
    }
}

const fn conditional(name: &'static str, field_type: FieldType) -> FieldDescriptor {
    FieldDescriptor {
        name,
        field_type,
        requirement: Requirement::ConditionallyRequired,
        reference: None,
    }
}

const fn references(
    mut field: FieldDescriptor,
    table: &'static str,
    key: &'static str,
) -> FieldDescriptor {
    field.reference = Some(ForeignKey { table, field: key });
    field
}

#[derive(Debug, Clone, Copy)]
pub struct TableDescriptor {
    pub name: &'static str,
    /// File name within the archive, including `.txt`/`.geojson`.
    pub file_name: &'static str,
    pub fields: &'static [FieldDescriptor],
    /// The field (or fields) that uniquely identify a row within the table,
    /// in file order. Empty for tables with no natural key (e.g. shapes,
    /// which are keyed by `(shape_id, shape_pt_sequence)`).
    pub key_fields: &'static [&'static str],
    /// Whether a table with zero rows or a missing file is itself an error.
    pub required: bool,
}

const ROUTE_TYPES: &[i64] = &[0, 1, 2, 3, 4, 5, 6, 7, 11, 12];
const LOCATION_TYPES: &[i64] = &[0, 1, 2, 3, 4];
const WHEELCHAIR_BOARDING: &[i64] = &[0, 1, 2];
const PICKUP_DROP_OFF_TYPE: &[i64] = &[0, 1, 2, 3];
const TIMEPOINT: &[i64] = &[0, 1];
const DIRECTION_ID: &[i64] = &[0, 1];
const WHEELCHAIR_ACCESSIBLE: &[i64] = &[0, 1, 2];
const BIKES_ALLOWED: &[i64] = &[0, 1, 2];
const EXCEPTION_TYPE: &[i64] = &[1, 2];
const SERVICE_AVAILABILITY: &[i64] = &[0, 1];
const PAYMENT_METHOD: &[i64] = &[0, 1];
const TRANSFERS_COUNT: &[i64] = &[0, 1, 2];
const TRANSFER_TYPE: &[i64] = &[0, 1, 2, 3];
const EXACT_TIMES: &[i64] = &[0, 1];

const AGENCY_FIELDS: &[FieldDescriptor] = &[
    optional("agency_id", FieldType::Id),
    required("agency_name", FieldType::ShortText),
    required("agency_url", FieldType::Url),
    required("agency_timezone", FieldType::Timezone),
    optional("agency_lang", FieldType::LanguageCode),
    optional("agency_phone", FieldType::ShortText),
    optional("agency_fare_url", FieldType::Url),
    optional("agency_email", FieldType::Email),
];

const STOPS_FIELDS: &[FieldDescriptor] = &[
    required("stop_id", FieldType::Id),
    optional("stop_code", FieldType::ShortText),
    conditional("stop_name", FieldType::ShortText),
    optional("stop_desc", FieldType::LongText),
    conditional("stop_lat", FieldType::Latitude),
    conditional("stop_lon", FieldType::Longitude),
    optional("zone_id", FieldType::Id),
    optional("stop_url", FieldType::Url),
    optional("location_type", FieldType::EnumCode(LOCATION_TYPES)),
    optional("parent_station", FieldType::Id),
    optional("stop_timezone", FieldType::Timezone),
    optional(
        "wheelchair_boarding",
        FieldType::EnumCode(WHEELCHAIR_BOARDING),
    ),
    optional("level_id", FieldType::Id),
    optional("platform_code", FieldType::ShortText),
];

const ROUTES_FIELDS: &[FieldDescriptor] = &[
    required("route_id", FieldType::Id),
    references(optional("agency_id", FieldType::Id), "agency", "agency_id"),
    conditional("route_short_name", FieldType::ShortText),
    conditional("route_long_name", FieldType::ShortText),
    optional("route_desc", FieldType::LongText),
    required("route_type", FieldType::EnumCode(ROUTE_TYPES)),
    optional("route_url", FieldType::Url),
    optional("route_color", FieldType::Color),
    optional("route_text_color", FieldType::Color),
    optional("route_sort_order", FieldType::Integer),
];

const TRIPS_FIELDS: &[FieldDescriptor] = &[
    references(required("route_id", FieldType::Id), "routes", "route_id"),
    required("service_id", FieldType::Id),
    required("trip_id", FieldType::Id),
    optional("trip_headsign", FieldType::ShortText),
    optional("trip_short_name", FieldType::ShortText),
    optional("direction_id", FieldType::EnumCode(DIRECTION_ID)),
    optional("block_id", FieldType::Id),
    optional("shape_id", FieldType::Id),
    optional(
        "wheelchair_accessible",
        FieldType::EnumCode(WHEELCHAIR_ACCESSIBLE),
    ),
    optional("bikes_allowed", FieldType::EnumCode(BIKES_ALLOWED)),
    // Not a GTFS input column — the pattern finder (C7) stamps this onto
    // every trip row after load, via a bulk key-joined update rather than a
    // per-row `UPDATE` (§4.6, §9).
    optional("pattern_id", FieldType::Id),
];

const STOP_TIMES_FIELDS: &[FieldDescriptor] = &[
    references(required("trip_id", FieldType::Id), "trips", "trip_id"),
    conditional("arrival_time", FieldType::TimeOfDay),
    conditional("departure_time", FieldType::TimeOfDay),
    references(
        conditional("stop_id", FieldType::Id),
        "stops",
        "stop_id",
    ),
    optional("location_group_id", FieldType::Id),
    optional("location_id", FieldType::Id),
    required("stop_sequence", FieldType::Integer),
    optional("stop_headsign", FieldType::ShortText),
    optional("start_pickup_drop_off_window", FieldType::TimeOfDay),
    optional("end_pickup_drop_off_window", FieldType::TimeOfDay),
    optional("pickup_type", FieldType::EnumCode(PICKUP_DROP_OFF_TYPE)),
    optional("drop_off_type", FieldType::EnumCode(PICKUP_DROP_OFF_TYPE)),
    optional("shape_dist_traveled", FieldType::Double),
    optional("timepoint", FieldType::EnumCode(TIMEPOINT)),
];

const CALENDAR_FIELDS: &[FieldDescriptor] = &[
    required("service_id", FieldType::Id),
    required("monday", FieldType::EnumCode(SERVICE_AVAILABILITY)),
    required("tuesday", FieldType::EnumCode(SERVICE_AVAILABILITY)),
    required("wednesday", FieldType::EnumCode(SERVICE_AVAILABILITY)),
    required("thursday", FieldType::EnumCode(SERVICE_AVAILABILITY)),
    required("friday", FieldType::EnumCode(SERVICE_AVAILABILITY)),
    required("saturday", FieldType::EnumCode(SERVICE_AVAILABILITY)),
    required("sunday", FieldType::EnumCode(SERVICE_AVAILABILITY)),
    required("start_date", FieldType::Date),
    required("end_date", FieldType::Date),
];

const CALENDAR_DATES_FIELDS: &[FieldDescriptor] = &[
    required("service_id", FieldType::Id),
    required("date", FieldType::Date),
    required("exception_type", FieldType::EnumCode(EXCEPTION_TYPE)),
];

const SHAPES_FIELDS: &[FieldDescriptor] = &[
    required("shape_id", FieldType::Id),
    required("shape_pt_lat", FieldType::Latitude),
    required("shape_pt_lon", FieldType::Longitude),
    required("shape_pt_sequence", FieldType::Integer),
    optional("shape_dist_traveled", FieldType::Double),
];

const FREQUENCIES_FIELDS: &[FieldDescriptor] = &[
    required("trip_id", FieldType::Id),
    required("start_time", FieldType::TimeOfDay),
    required("end_time", FieldType::TimeOfDay),
    required("headway_secs", FieldType::Integer),
    optional("exact_times", FieldType::EnumCode(EXACT_TIMES)),
];

const TRANSFERS_FIELDS: &[FieldDescriptor] = &[
    optional("from_stop_id", FieldType::Id),
    optional("to_stop_id", FieldType::Id),
    optional("from_route_id", FieldType::Id),
    optional("to_route_id", FieldType::Id),
    optional("from_trip_id", FieldType::Id),
    optional("to_trip_id", FieldType::Id),
    required("transfer_type", FieldType::EnumCode(TRANSFER_TYPE)),
    optional("min_transfer_time", FieldType::Integer),
];

const FARE_ATTRIBUTES_FIELDS: &[FieldDescriptor] = &[
    required("fare_id", FieldType::Id),
    required("price", FieldType::Double),
    required("currency_type", FieldType::CurrencyCode),
    required("payment_method", FieldType::EnumCode(PAYMENT_METHOD)),
    required("transfers", FieldType::EnumCode(TRANSFERS_COUNT)),
    optional("agency_id", FieldType::Id),
    optional("transfer_duration", FieldType::Integer),
];

const FARE_RULES_FIELDS: &[FieldDescriptor] = &[
    references(required("fare_id", FieldType::Id), "fare_attributes", "fare_id"),
    references(optional("route_id", FieldType::Id), "routes", "route_id"),
    optional("origin_id", FieldType::Id),
    optional("destination_id", FieldType::Id),
    optional("contains_id", FieldType::Id),
];

const FEED_INFO_FIELDS: &[FieldDescriptor] = &[
    required("feed_publisher_name", FieldType::ShortText),
    required("feed_publisher_url", FieldType::Url),
    required("feed_lang", FieldType::LanguageCode),
    optional("default_lang", FieldType::LanguageCode),
    optional("feed_start_date", FieldType::Date),
    optional("feed_end_date", FieldType::Date),
    optional("feed_version", FieldType::ShortText),
    optional("feed_contact_email", FieldType::Email),
    optional("feed_contact_url", FieldType::Url),
];

const ATTRIBUTIONS_FIELDS: &[FieldDescriptor] = &[
    optional("attribution_id", FieldType::Id),
    optional("agency_id", FieldType::Id),
    optional("route_id", FieldType::Id),
    optional("trip_id", FieldType::Id),
    required("organization_name", FieldType::ShortText),
    optional("is_producer", FieldType::EnumCode(&[0, 1])),
    optional("is_operator", FieldType::EnumCode(&[0, 1])),
    optional("is_authority", FieldType::EnumCode(&[0, 1])),
    optional("attribution_url", FieldType::Url),
    optional("attribution_email", FieldType::Email),
    optional("attribution_phone", FieldType::ShortText),
];

const TRANSLATIONS_FIELDS: &[FieldDescriptor] = &[
    required("table_name", FieldType::ShortText),
    required("field_name", FieldType::ShortText),
    required("language", FieldType::LanguageCode),
    required("translation", FieldType::ShortText),
    optional("record_id", FieldType::Id),
    optional("record_sub_id", FieldType::Id),
    optional("field_value", FieldType::ShortText),
];

const BOOKING_RULES_FIELDS: &[FieldDescriptor] = &[
    required("booking_rule_id", FieldType::Id),
    required("booking_type", FieldType::EnumCode(&[0, 1, 2])),
    optional("prior_notice_duration_min", FieldType::Integer),
    optional("prior_notice_duration_max", FieldType::Integer),
    optional("prior_notice_last_day", FieldType::Integer),
    optional("prior_notice_last_time", FieldType::TimeOfDay),
    optional("prior_notice_start_day", FieldType::Integer),
    optional("prior_notice_start_time", FieldType::TimeOfDay),
    optional("prior_notice_service_id", FieldType::Id),
    optional("message", FieldType::ShortText),
    optional("pickup_message", FieldType::ShortText),
    optional("drop_off_message", FieldType::ShortText),
    optional("phone_number", FieldType::ShortText),
    optional("info_url", FieldType::Url),
    optional("booking_url", FieldType::Url),
];

const LOCATION_GROUPS_FIELDS: &[FieldDescriptor] = &[
    required("location_group_id", FieldType::Id),
    optional("location_group_name", FieldType::ShortText),
];

const LOCATION_GROUP_STOPS_FIELDS: &[FieldDescriptor] = &[
    references(
        required("location_group_id", FieldType::Id),
        "location_groups",
        "location_group_id",
    ),
    references(required("stop_id", FieldType::Id), "stops", "stop_id"),
];

/// `locations.geojson` is not a CSV table: one row per GeoJSON `Feature`,
/// with the feature's `id` as the key and its `geometry` object carried
/// through verbatim. The loader has a dedicated code path for this file;
/// it still goes through the schema registry so the exporter, reference
/// resolver and header/table-presence checks all see it uniformly.
const LOCATIONS_FIELDS: &[FieldDescriptor] = &[
    required("id", FieldType::Id),
    required("geometry", FieldType::Json),
];

pub const TABLE_AGENCY: TableDescriptor = TableDescriptor {
    name: "agency",
    file_name: "agency.txt",
    fields: AGENCY_FIELDS,
    key_fields: &["agency_id"],
    required: true,
};

pub const TABLE_STOPS: TableDescriptor = TableDescriptor {
    name: "stops",
    file_name: "stops.txt",
    fields: STOPS_FIELDS,
    key_fields: &["stop_id"],
    required: true,
};

pub const TABLE_ROUTES: TableDescriptor = TableDescriptor {
    name: "routes",
    file_name: "routes.txt",
    fields: ROUTES_FIELDS,
    key_fields: &["route_id"],
    required: true,
};

pub const TABLE_TRIPS: TableDescriptor = TableDescriptor {
    name: "trips",
    file_name: "trips.txt",
    fields: TRIPS_FIELDS,
    key_fields: &["trip_id"],
    required: true,
};

pub const TABLE_STOP_TIMES: TableDescriptor = TableDescriptor {
    name: "stop_times",
    file_name: "stop_times.txt",
    fields: STOP_TIMES_FIELDS,
    key_fields: &["trip_id", "stop_sequence"],
    required: true,
};

pub const TABLE_CALENDAR: TableDescriptor = TableDescriptor {
    name: "calendar",
    file_name: "calendar.txt",
    fields: CALENDAR_FIELDS,
    key_fields: &["service_id"],
    required: false,
};

pub const TABLE_CALENDAR_DATES: TableDescriptor = TableDescriptor {
    name: "calendar_dates",
    file_name: "calendar_dates.txt",
    fields: CALENDAR_DATES_FIELDS,
    key_fields: &["service_id", "date"],
    required: false,
};

pub const TABLE_SHAPES: TableDescriptor = TableDescriptor {
    name: "shapes",
    file_name: "shapes.txt",
    fields: SHAPES_FIELDS,
    key_fields: &["shape_id", "shape_pt_sequence"],
    required: false,
};

pub const TABLE_FREQUENCIES: TableDescriptor = TableDescriptor {
    name: "frequencies",
    file_name: "frequencies.txt",
    fields: FREQUENCIES_FIELDS,
    key_fields: &["trip_id", "start_time"],
    required: false,
};

pub const TABLE_TRANSFERS: TableDescriptor = TableDescriptor {
    name: "transfers",
    file_name: "transfers.txt",
    fields: TRANSFERS_FIELDS,
    key_fields: &[],
    required: false,
};

pub const TABLE_FARE_ATTRIBUTES: TableDescriptor = TableDescriptor {
    name: "fare_attributes",
    file_name: "fare_attributes.txt",
    fields: FARE_ATTRIBUTES_FIELDS,
    key_fields: &["fare_id"],
    required: false,
};

pub const TABLE_FARE_RULES: TableDescriptor = TableDescriptor {
    name: "fare_rules",
    file_name: "fare_rules.txt",
    fields: FARE_RULES_FIELDS,
    key_fields: &[],
    required: false,
};

pub const TABLE_FEED_INFO: TableDescriptor = TableDescriptor {
    name: "feed_info",
    file_name: "feed_info.txt",
    fields: FEED_INFO_FIELDS,
    key_fields: &[],
    required: false,
};

pub const TABLE_ATTRIBUTIONS: TableDescriptor = TableDescriptor {
    name: "attributions",
    file_name: "attributions.txt",
    fields: ATTRIBUTIONS_FIELDS,
    key_fields: &[],
    required: false,
};

pub const TABLE_TRANSLATIONS: TableDescriptor = TableDescriptor {
    name: "translations",
    file_name: "translations.txt",
    fields: TRANSLATIONS_FIELDS,
    key_fields: &[],
    required: false,
};

pub const TABLE_BOOKING_RULES: TableDescriptor = TableDescriptor {
    name: "booking_rules",
    file_name: "booking_rules.txt",
    fields: BOOKING_RULES_FIELDS,
    key_fields: &["booking_rule_id"],
    required: false,
};

pub const TABLE_LOCATION_GROUPS: TableDescriptor = TableDescriptor {
    name: "location_groups",
    file_name: "location_groups.txt",
    fields: LOCATION_GROUPS_FIELDS,
    key_fields: &["location_group_id"],
    required: false,
};

pub const TABLE_LOCATION_GROUP_STOPS: TableDescriptor = TableDescriptor {
    name: "location_group_stops",
    file_name: "location_group_stops.txt",
    fields: LOCATION_GROUP_STOPS_FIELDS,
    key_fields: &[],
    required: false,
};

pub const TABLE_LOCATIONS: TableDescriptor = TableDescriptor {
    name: "locations",
    file_name: "locations.geojson",
    fields: LOCATIONS_FIELDS,
    key_fields: &["id"],
    required: false,
};

/// Every table the loader knows how to read, in the order the loader should
/// load them so that a referenced table is always populated before the
/// table that references it.
pub const TABLES: &[TableDescriptor] = &[
    TABLE_AGENCY,
    TABLE_STOPS,
    TABLE_ROUTES,
    TABLE_CALENDAR,
    TABLE_CALENDAR_DATES,
    TABLE_SHAPES,
    TABLE_TRIPS,
    TABLE_STOP_TIMES,
    TABLE_FREQUENCIES,
    TABLE_TRANSFERS,
    TABLE_FARE_ATTRIBUTES,
    TABLE_FARE_RULES,
    TABLE_FEED_INFO,
    TABLE_ATTRIBUTIONS,
    TABLE_TRANSLATIONS,
    TABLE_BOOKING_RULES,
    TABLE_LOCATION_GROUPS,
    TABLE_LOCATION_GROUP_STOPS,
    TABLE_LOCATIONS,
];

pub fn table_by_name(name: &str) -> Option<&'static TableDescriptor> {
    TABLES.iter().find(|t| t.name == name)
}

pub fn field_by_name<'a>(
    table: &'a TableDescriptor,
    name: &str,
) -> Option<&'a FieldDescriptor> {
    table.fields.iter().find(|f| f.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_is_reachable_by_name() {
        for table in TABLES {
            assert_eq!(table_by_name(table.name).map(|t| t.name), Some(table.name));
        }
    }

    #[test]
    fn stop_times_key_is_composite() {
        assert_eq!(TABLE_STOP_TIMES.key_fields, &["trip_id", "stop_sequence"]);
    }
}
