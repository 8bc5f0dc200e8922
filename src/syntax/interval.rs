//! Interval string parsing.
//!
//! Converts Graphite interval specs ("5min", "-1h", "1h30min") into signed
//! seconds. The caller supplies the sign to assume when the string carries
//! none, so a look-back window defaults negative while an offset may
//! default positive.

use crate::errors::EngineError;

const SECOND: i64 = 1;
const MINUTE: i64 = 60;
const HOUR: i64 = 3600;
const DAY: i64 = 86_400;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

/// Parses an interval string into signed seconds.
///
/// Accepts one or more `<digits><unit>` groups, which are summed
/// ("1h30min" is 5400). A trailing bare digit group counts as seconds.
/// An explicit leading `+`/`-` overrides `default_sign`.
pub fn parse_interval(text: &str, default_sign: i64) -> Result<i64, EngineError> {
    let trimmed = text.trim();
    let (sign, body) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (default_sign, trimmed),
    };
    let sign = if sign < 0 { -1 } else { 1 };

    if body.is_empty() {
        return Err(invalid(text));
    }

    let mut total: i64 = 0;
    let mut rest = body;
    while !rest.is_empty() {
        let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits_len == 0 {
            return Err(invalid(text));
        }
        let amount: i64 = rest[..digits_len].parse().map_err(|_| invalid(text))?;
        rest = &rest[digits_len..];

        let unit_len = rest.bytes().take_while(u8::is_ascii_alphabetic).count();
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        total += amount * unit_seconds(unit).ok_or_else(|| invalid(text))?;
    }

    Ok(sign * total)
}

fn unit_seconds(unit: &str) -> Option<i64> {
    match unit {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Some(SECOND),
        "m" | "min" | "mins" | "minute" | "minutes" => Some(MINUTE),
        "h" | "hour" | "hours" => Some(HOUR),
        "d" | "day" | "days" => Some(DAY),
        "w" | "week" | "weeks" => Some(WEEK),
        "mon" | "month" | "months" => Some(MONTH),
        "y" | "year" | "years" => Some(YEAR),
        _ => None,
    }
}

fn invalid(text: &str) -> EngineError {
    EngineError::InvalidInterval {
        text: text.to_string(),
    }
}
