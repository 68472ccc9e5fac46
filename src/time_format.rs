//! Human time strings for the transport readout and loop-bound editing.

/// Format seconds as `m:ss`. Non-finite and negative values show as `0:00`.
pub fn format_time(seconds: f64) -> String {
    let safe = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let minutes = (safe / 60.0).floor() as u64;
    let secs = (safe % 60.0).floor() as u64;
    format!("{}:{:02}", minutes, secs)
}

/// Parse user-entered time: `ss`, `m:ss` or `h:mm:ss`.
///
/// Fields may be fractional. Returns `None` for empty text, empty or
/// non-numeric fields, negative values, or more than three fields.
pub fn parse_time_input(value: &str) -> Option<f64> {
    let text = value.trim();
    if text.is_empty() {
        return None;
    }

    if !text.contains(':') {
        return parse_field(text);
    }

    let fields = text
        .split(':')
        .map(|part| parse_field(part.trim()))
        .collect::<Option<Vec<f64>>>()?;

    match fields.as_slice() {
        [minutes, seconds] => Some(minutes * 60.0 + seconds),
        [hours, minutes, seconds] => Some(hours * 3600.0 + minutes * 60.0 + seconds),
        _ => None,
    }
}

fn parse_field(text: &str) -> Option<f64> {
    if text.is_empty() {
        return None;
    }
    let value: f64 = text.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65.0), "1:05");
        assert_eq!(format_time(59.99), "0:59");
        assert_eq!(format_time(3600.0), "60:00");
        assert_eq!(format_time(-3.0), "0:00");
        assert_eq!(format_time(f64::NAN), "0:00");
    }

    #[test]
    fn test_parse_accepts_all_forms() {
        assert_eq!(parse_time_input("65"), Some(65.0));
        assert_eq!(parse_time_input("1:05"), Some(65.0));
        assert_eq!(parse_time_input(" 0:00 "), Some(0.0));
        assert_eq!(parse_time_input("1:00:30"), Some(3630.0));
        assert_eq!(parse_time_input("1.5"), Some(1.5));
        assert_eq!(parse_time_input("0: 30"), Some(30.0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_time_input("abc"), None);
        assert_eq!(parse_time_input("-5"), None);
        assert_eq!(parse_time_input("1:2:3:4"), None);
        assert_eq!(parse_time_input(""), None);
        assert_eq!(parse_time_input("1:"), None);
        assert_eq!(parse_time_input("1:-2"), None);
        assert_eq!(parse_time_input("inf"), None);
    }

    #[test]
    fn test_format_of_parse_is_canonical() {
        for (input, canonical) in [("1:05", "1:05"), ("65", "1:05"), ("0:00", "0:00"), ("0:7", "0:07")] {
            let parsed = parse_time_input(input).unwrap();
            assert_eq!(format_time(parsed), canonical, "input {input}");
        }
    }
}
