use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Parses the accepted spellings of a boolean.
pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Parses `raw` with a strftime `layout`.
///
/// Layouts carrying an offset are normalized to UTC, date-only layouts yield midnight.
pub(crate) fn parse_time(raw: &str, layout: &str) -> Option<NaiveDateTime> {
    if let Ok(date_time) = DateTime::parse_from_str(raw, layout) {
        return Some(date_time.naive_utc());
    }

    if let Ok(date_time) = NaiveDateTime::parse_from_str(raw, layout) {
        return Some(date_time);
    }

    NaiveDate::parse_from_str(raw, layout).ok().and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::{parse_bool, parse_time};
    use chrono::NaiveDate;

    #[test]
    fn test_parse_bool() {
        for raw in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(raw), Some(true), "{raw}");
        }
        for raw in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(raw), Some(false), "{raw}");
        }
        for raw in ["", "yes", "tRUE", "2"] {
            assert_eq!(parse_bool(raw), None, "{raw}");
        }
    }

    #[test]
    fn test_parse_date_time() {
        let expected = NaiveDate::from_ymd_opt(2006, 1, 2).unwrap().and_hms_opt(15, 4, 0).unwrap();
        assert_eq!(parse_time("2006-01-02 15:04", "%Y-%m-%d %H:%M"), Some(expected));
    }

    #[test]
    fn test_parse_date_only() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(parse_time("29/02/2024", "%d/%m/%Y"), Some(expected));
    }

    #[test]
    fn test_parse_with_offset() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(10, 0, 0).unwrap();
        assert_eq!(parse_time("2024-05-01T12:00:00+02:00", "%Y-%m-%dT%H:%M:%S%:z"), Some(expected));
    }

    #[test]
    fn test_parse_mismatch() {
        assert_eq!(parse_time("2024-05-01", "%d/%m/%Y"), None);
        assert_eq!(parse_time("2024-02-30", "%Y-%m-%d"), None);
    }
}
