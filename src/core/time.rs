use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Parses backend timestamps. Offset-less ISO-8601 values are taken as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }

    let with_fraction = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"
    );
    let without_fraction = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let spaced = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

    PrimitiveDateTime::parse(raw, &with_fraction)
        .or_else(|_| PrimitiveDateTime::parse(raw, &without_fraction))
        .or_else(|_| PrimitiveDateTime::parse(raw, &spaced))
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

/// `dd/MM`, used for chart ticks.
pub(crate) fn format_day_month(value: OffsetDateTime) -> String {
    let format = format_description!("[day]/[month]");
    value.format(&format).unwrap_or_default()
}

/// `MM/dd`, used in the history sidebar.
pub(crate) fn format_month_day(value: OffsetDateTime) -> String {
    let format = format_description!("[month]/[day]");
    value.format(&format).unwrap_or_default()
}

/// `hh:mm AM`, used in the history sidebar.
pub(crate) fn format_clock(value: OffsetDateTime) -> String {
    let format = format_description!("[hour repr:12]:[minute] [period]");
    value.format(&format).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Time, UtcOffset};

    fn sample() -> OffsetDateTime {
        let date = Date::from_calendar_date(2025, time::Month::January, 2).unwrap();
        let time = Time::from_hms(14, 5, 30).unwrap();
        PrimitiveDateTime::new(date, time).assume_utc()
    }

    #[test]
    fn parse_timestamp_accepts_rfc3339() {
        let parsed = parse_timestamp("2025-01-02T17:05:30+03:00").expect("parsed");
        assert_eq!(parsed.to_offset(UtcOffset::UTC), sample());
    }

    #[test]
    fn parse_timestamp_assumes_utc_for_naive_values() {
        assert_eq!(parse_timestamp("2025-01-02T14:05:30"), Some(sample()));
        assert_eq!(parse_timestamp("2025-01-02 14:05:30"), Some(sample()));
        let fractional = parse_timestamp("2025-01-02T14:05:30.123456").expect("fraction");
        assert_eq!(fractional.date(), sample().date());
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn short_formats() {
        assert_eq!(format_day_month(sample()), "02/01");
        assert_eq!(format_month_day(sample()), "01/02");
        assert_eq!(format_clock(sample()), "02:05 PM");
    }
}
