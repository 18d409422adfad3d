//! Date/datetime checks for `date` and `datetime` leaves.
//!
//! Formats are written with moment-style tokens (`YYYY-MM-DD HH:mm:ss`) and
//! translated once into a `chrono` pattern. A value is accepted when it
//! parses (under the format, or as an ISO-8601 date/time) and the result,
//! formatted back with the format and re-parsed, keeps its UTC offset.
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat {
    source: String,
    pattern: String,
    has_date: bool,
    has_time: bool,
    has_offset: bool,
}

// Longest tokens first so `YYYY` wins over `YY`.
const TOKENS: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("YY", "%y"),
    ("MMMM", "%B"),
    ("MMM", "%b"),
    ("MM", "%m"),
    ("M", "%m"),
    ("DD", "%d"),
    ("D", "%d"),
    ("HH", "%H"),
    ("H", "%H"),
    ("hh", "%I"),
    ("h", "%I"),
    ("mm", "%M"),
    ("m", "%M"),
    ("ss", "%S"),
    ("s", "%S"),
    ("SSS", "%3f"),
    // two-digit `SS` reads as seconds, matching the historical default
    ("SS", "%S"),
    ("A", "%p"),
    ("a", "%P"),
    ("ZZ", "%z"),
    ("Z", "%:z"),
];

impl DateFormat {
    pub fn new(source: &str) -> Self {
        let mut pattern = String::new();
        let (mut has_date, mut has_time, mut has_offset) = (false, false, false);
        let mut rest = source;
        'outer: while !rest.is_empty() {
            if let Some(stripped) = rest.strip_prefix('[') {
                // `[literal]` passes through untouched
                let end = stripped.find(']').unwrap_or(stripped.len());
                push_literal(&mut pattern, &stripped[..end]);
                rest = stripped.get(end + 1..).unwrap_or("");
                continue;
            }
            for (token, chrono_spec) in TOKENS {
                if let Some(after) = rest.strip_prefix(token) {
                    pattern.push_str(chrono_spec);
                    match token.chars().next() {
                        Some('Y' | 'M' | 'D') => has_date = true,
                        Some('Z') => has_offset = true,
                        _ => has_time = true,
                    }
                    rest = after;
                    continue 'outer;
                }
            }
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                push_literal(&mut pattern, &c.to_string());
            }
            rest = chars.as_str();
        }
        Self { source: source.to_string(), pattern, has_date, has_time, has_offset }
    }

    /// The moment-style format this was built from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The translated `chrono` format string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn accepts(&self, text: &str) -> bool {
        let Some(parsed) = self.parse_strict(text).or_else(|| parse_iso(text)) else {
            return false;
        };
        let rendered = parsed.format(&self.pattern).to_string();
        // formats without an offset token read back in the value's own zone
        match self.parse_strict(&rendered) {
            Some(again) if self.has_offset => again.offset() == parsed.offset(),
            Some(_) => true,
            None => false,
        }
    }

    fn parse_strict(&self, text: &str) -> Option<DateTime<FixedOffset>> {
        let utc = Utc.fix();
        if self.has_offset {
            return DateTime::parse_from_str(text, &self.pattern).ok();
        }
        if self.has_date && self.has_time {
            return NaiveDateTime::parse_from_str(text, &self.pattern)
                .ok()
                .and_then(|n| utc.from_local_datetime(&n).single());
        }
        if self.has_date {
            return NaiveDate::parse_from_str(text, &self.pattern)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .and_then(|n| utc.from_local_datetime(&n).single());
        }
        if self.has_time {
            let t = NaiveTime::parse_from_str(text, &self.pattern).ok()?;
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
            return utc.from_local_datetime(&epoch.and_time(t)).single();
        }
        None
    }
}

fn push_literal(pattern: &mut String, lit: &str) {
    for c in lit.chars() {
        if c == '%' {
            pattern.push_str("%%");
        } else {
            pattern.push(c);
        }
    }
}

fn parse_iso(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    let utc = Utc.fix();
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(n) = NaiveDateTime::parse_from_str(text, fmt) {
            return utc.from_local_datetime(&n).single();
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|n| utc.from_local_datetime(&n).single())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_moment_tokens() {
        assert_eq!(DateFormat::new("YYYY-MM-DD").pattern(), "%Y-%m-%d");
        assert_eq!(DateFormat::new("YYYY-MM-DD HH:mm:SS").pattern(), "%Y-%m-%d %H:%M:%S");
        assert_eq!(DateFormat::new("YYYY/MM/DD[T]HH:mm Z").pattern(), "%Y/%m/%dT%H:%M %:z");
        assert_eq!(DateFormat::new("DD%").pattern(), "%d%%");
    }

    #[test]
    fn calendar_validity() {
        let f = DateFormat::new("YYYY-MM-DD");
        assert!(f.accepts("2024-02-29"));
        assert!(!f.accepts("2024-02-30"));
        assert!(!f.accepts("2023-02-29"));
        assert!(!f.accepts("yesterday"));
    }

    #[test]
    fn datetime_default_format() {
        let f = DateFormat::new("YYYY-MM-DD HH:mm:SS");
        assert!(f.accepts("2024-01-31 23:59:59"));
        assert!(f.accepts("2024-01-31T10:00:00Z"));
        assert!(!f.accepts("2024-01-31 24:00:00"));
    }

    #[test]
    fn custom_format_and_offsets() {
        let f = DateFormat::new("YYYY/MM/DD");
        assert!(f.accepts("2024/03/01"));
        assert!(f.accepts("2024-03-01"));

        let f = DateFormat::new("YYYY-MM-DD HH:mm Z");
        assert!(f.accepts("2024-03-01 10:30 +09:00"));
        assert_eq!(f.source(), "YYYY-MM-DD HH:mm Z");
    }

    #[test]
    fn iso_values_keep_their_own_offset() {
        let datetime = DateFormat::new("YYYY-MM-DD HH:mm:SS");
        let date = DateFormat::new("YYYY-MM-DD");
        for text in ["2024-01-31T10:00:00+09:00", "2024-01-31T10:00:00-05:30", "2024-01-31T10:00:00Z"] {
            assert!(datetime.accepts(text), "{text}");
            assert!(date.accepts(text), "{text}");
        }
        assert!(!datetime.accepts("2024-01-31T25:00:00+09:00"));
    }

    #[test]
    fn time_only_formats() {
        let f = DateFormat::new("HH:mm");
        assert!(f.accepts("09:15"));
        assert!(!f.accepts("25:15"));
    }
}
