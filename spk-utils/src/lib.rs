//! Shared utility functions for seispick crates.

/// Timestamp helpers for the layouts used by the location programs and the
/// event XML documents.
pub mod dates {
    use crate::error::DateError;
    use chrono::{
        DateTime, DurationRound, NaiveDate, NaiveDateTime, TimeDelta, Utc,
    };

    /// ISO-8601 layout written into event documents (no zone suffix, microseconds).
    pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

    /// Offset a timestamp by a (possibly fractional) number of seconds,
    /// keeping microsecond precision.
    pub fn offset_seconds(start: &DateTime<Utc>, seconds: f64) -> DateTime<Utc> {
        *start + TimeDelta::microseconds((seconds * 1e6).round() as i64)
    }

    /// Signed number of seconds from `earlier` to `later`.
    pub fn seconds_between(later: &DateTime<Utc>, earlier: &DateTime<Utc>) -> f64 {
        let delta = *later - *earlier;
        match delta.num_microseconds() {
            Some(us) => us as f64 / 1e6,
            None => delta.num_milliseconds() as f64 / 1e3,
        }
    }

    /// Build a timestamp from broken-down fields. `seconds` may carry a
    /// fraction and may exceed 59.
    pub fn from_parts(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        seconds: f64,
    ) -> Option<DateTime<Utc>> {
        let base = NaiveDate::from_ymd_opt(year, month, day)?
            .and_hms_opt(hour, minute, 0)?
            .and_utc();
        Some(offset_seconds(&base, seconds))
    }

    /// Format as ISO-8601 with microseconds, e.g. `2009-12-27T10:52:59.425000`.
    pub fn format_iso(dt: &DateTime<Utc>) -> String {
        dt.format(ISO_FORMAT).to_string()
    }

    /// Parse ISO-8601 with or without fraction and with or without a zone.
    pub fn parse_iso(s: &str) -> Result<DateTime<Utc>, DateError> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }
        let naive = s.strip_suffix('Z').unwrap_or(s);
        NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|n| n.and_utc())
            .map_err(|e| DateError(format!("{}: {}", s, e)))
    }

    /// Round to the nearest multiple of `millis` milliseconds.
    pub fn round_millis(dt: &DateTime<Utc>, millis: i64) -> DateTime<Utc> {
        dt.duration_round(TimeDelta::milliseconds(millis))
            .unwrap_or(*dt)
    }

    /// `YYYY MM DD HH MM SS.sss`, the phase timestamp layout of 3dloc.
    pub fn format_3dloc(dt: &DateTime<Utc>) -> String {
        let rounded = round_millis(dt, 1);
        format!(
            "{}.{:03}",
            rounded.format("%Y %m %d %H %M %S"),
            rounded.timestamp_subsec_millis()
        )
    }

    /// `yymmddHHMMSS.ss`, the P arrival layout of hyp2000 phase files.
    pub fn format_hyp2000(dt: &DateTime<Utc>) -> String {
        let rounded = round_millis(dt, 10);
        format!(
            "{}.{:02}",
            rounded.format("%y%m%d%H%M%S"),
            rounded.timestamp_subsec_millis() / 10
        )
    }

    /// `HHMMSS.ss`, the S arrival layout of hyp2000 phase files.
    pub fn format_hyp2000_time(dt: &DateTime<Utc>) -> String {
        let rounded = round_millis(dt, 10);
        format!(
            "{}.{:02}",
            rounded.format("%H%M%S"),
            rounded.timestamp_subsec_millis() / 10
        )
    }

}

/// Fixed-column field access for the report formats of the location programs.
///
/// Column ranges are zero-based and end-exclusive. Lines shorter than the
/// requested range yield whatever part of the range exists, so a truncated
/// line reads as blank fields instead of failing.
pub mod columns {
    use std::str::FromStr;

    /// Raw text in `[start, end)`.
    pub fn field(line: &str, start: usize, end: usize) -> &str {
        let len = line.len();
        let start = start.min(len);
        let end = end.min(len);
        line.get(start..end).unwrap_or("")
    }

    /// Character at `idx`, if any.
    pub fn char_at(line: &str, idx: usize) -> Option<char> {
        line.get(idx..).and_then(|rest| rest.chars().next())
    }

    /// Trimmed field parsed as `T`; blank or malformed fields are `None`.
    pub fn parse_field<T: FromStr>(line: &str, start: usize, end: usize) -> Option<T> {
        let text = field(line, start, end).trim();
        if text.is_empty() {
            return None;
        }
        text.parse::<T>().ok()
    }

}

/// Error types
pub mod error {
    use std::fmt;

    #[derive(Debug)]
    pub struct DateError(pub String);

    impl fmt::Display for DateError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Date error: {}", self.0)
        }
    }

    impl std::error::Error for DateError {}
}
