use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// Canonical `pub_date` layout, e.g. `Mon, 02 Jan 2006 15:04:05 -0700`.
pub const RFC1123Z: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Layouts ending in a zone abbreviation (`MST`, `GMT`). The day name is
/// stripped before matching, so none of the layouts carry `%a`.
const NAMED_ZONE_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S", // RFC1123
    "%d %b %y %H:%M",    // RFC822
];

/// Layouts ending in a numeric offset, tried after the named ones.
const NUMERIC_ZONE_FORMATS: &[&str] = &[
    "%d %b %y %H:%M %z",    // RFC822Z
    "%d %b %Y %H:%M:%S %z", // RFC1123Z
    "%Y-%m-%d %H:%M:%S %z",
    "%d %b %y %H:%M:%S %z", // two-digit year
    "%Y-%m-%dT%H:%M:%S%z",
];

fn zone_offset(abbr: &str) -> Option<FixedOffset> {
    let hours = match abbr.to_ascii_uppercase().as_str() {
        "GMT" | "UT" | "UTC" | "Z" => 0,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        // unknown abbreviations are read as UTC
        other if other.chars().all(|c| c.is_ascii_alphabetic()) => 0,
        _ => return None,
    };
    FixedOffset::east_opt(hours * 3600)
}

/// `%Y` accepts fewer than four digits, so `06` would otherwise become year 6.
fn four_digit_year(dt: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    (dt.year() >= 1000).then_some(dt)
}

fn parse_named_zone(value: &str, format: &str) -> Option<DateTime<FixedOffset>> {
    let (rest, zone) = value.rsplit_once(' ')?;
    let offset = zone_offset(zone)?;
    let naive = NaiveDateTime::parse_from_str(rest.trim_end(), format).ok()?;
    offset.from_local_datetime(&naive).single().and_then(four_digit_year)
}

/// Drop a leading `Mon, ` so a wrong day name does not reject the date.
fn strip_weekday(value: &str) -> &str {
    match value.split_once(',') {
        Some((day, rest)) if !day.is_empty() && day.chars().all(|c| c.is_ascii_alphabetic()) => {
            rest.trim_start()
        }
        _ => value,
    }
}

/// Resolve a feed date through the known layouts, first match wins.
pub fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let dated = strip_weekday(value);

    NAMED_ZONE_FORMATS
        .iter()
        .find_map(|format| parse_named_zone(dated, format))
        .or_else(|| {
            NUMERIC_ZONE_FORMATS
                .iter()
                .find_map(|format| DateTime::parse_from_str(dated, format).ok().and_then(four_digit_year))
        })
        .or_else(|| DateTime::parse_from_rfc3339(value).ok())
}

/// Timestamp hook handed to the feed parser.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    parse_date(value).map(|dt| dt.with_timezone(&Utc))
}
