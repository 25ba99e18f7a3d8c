//! Free-form timecode parsing for manifest duration fields.

/// Default segment length substituted whenever a row's duration parses to
/// a non-positive value.
pub const DEFAULT_SEGMENT_SECS: f64 = 3.0;

/// Parses a duration string into seconds.
///
/// Accepts plain seconds (`"12"`, `"12.5"`) and colon timecodes (`"1:30"`,
/// `"1:02:03"`, right-aligned, so the last part is always seconds). All
/// malformed input degrades to `0.0`; callers substitute
/// [`DEFAULT_SEGMENT_SECS`] when the result is not positive.
pub fn parse_duration(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }

    if s.contains(':') {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() == 2 || parts.len() == 3 {
            let mults = [3600.0, 60.0, 1.0];
            let offset = mults.len() - parts.len();
            let mut total = 0.0;
            let mut ok = true;
            for (part, mult) in parts.iter().zip(&mults[offset..]) {
                match part.trim().parse::<f64>() {
                    Ok(v) => total += v * mult,
                    Err(_) => {
                        ok = false;
                        break;
                    }
                }
            }
            if ok {
                return total;
            }
        }
        // Fall through to the plain float attempt, matching the lenient
        // behavior expected for hand-typed manifest fields.
    }

    s.parse::<f64>().unwrap_or(0.0)
}

/// Applies the non-positive fallback rule on top of [`parse_duration`].
pub fn parse_duration_or_default(s: &str) -> f64 {
    let v = parse_duration(s);
    if v > 0.0 { v } else { DEFAULT_SEGMENT_SECS }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_seconds() {
        assert_eq!(parse_duration("12"), 12.0);
        assert_eq!(parse_duration("12.5"), 12.5);
        assert_eq!(parse_duration("  7 "), 7.0);
    }

    #[test]
    fn colon_timecodes() {
        assert_eq!(parse_duration("1:30"), 90.0);
        assert_eq!(parse_duration("0:05"), 5.0);
        assert_eq!(parse_duration("1:02:03"), 3723.0);
        assert_eq!(parse_duration("0:00:01.5"), 1.5);
    }

    #[test]
    fn malformed_input_degrades_to_zero() {
        assert_eq!(parse_duration(""), 0.0);
        assert_eq!(parse_duration("   "), 0.0);
        assert_eq!(parse_duration("abc"), 0.0);
        assert_eq!(parse_duration("1:2:3:4"), 0.0);
        assert_eq!(parse_duration("x:30"), 0.0);
    }

    #[test]
    fn default_substitution() {
        assert_eq!(parse_duration_or_default(""), DEFAULT_SEGMENT_SECS);
        assert_eq!(parse_duration_or_default("-4"), DEFAULT_SEGMENT_SECS);
        assert_eq!(parse_duration_or_default("0"), DEFAULT_SEGMENT_SECS);
        assert_eq!(parse_duration_or_default("2.5"), 2.5);
    }
}
