//! Priority Field Value parsing (RFC 9218 Section 4).
//!
//! The value is a structured field dictionary such as `u=2, i`. Only the
//! urgency parameter `u` is interpreted; other keys are ignored.

/// Urgency of a request that carries no valid `u` parameter.
pub const DEFAULT_URGENCY: u8 = 3;

/// Lowest priority urgency.
pub const MAX_URGENCY: u8 = 7;

/// Returns the urgency in a Priority Field Value, or [`DEFAULT_URGENCY`]
/// if `u` is absent or not an integer in `0..=7`.
///
/// Dictionary keys repeat with last-wins semantics, so a trailing invalid
/// `u` resets the urgency to the default.
///
/// ```rust
/// use h3wire_http::priority::parse_urgency;
///
/// assert_eq!(parse_urgency("u=1, i"), 1);
/// assert_eq!(parse_urgency("i"), 3);
/// assert_eq!(parse_urgency("u=9"), 3);
/// ```
pub fn parse_urgency(field_value: &str) -> u8 {
    let mut urgency = None;

    for member in field_value.split(',') {
        // Parameters follow the member value after ';'.
        let member = member.split(';').next().unwrap_or_default();
        let member = member.trim_matches(|c| c == ' ' || c == '\t');
        let (key, value) = match member.split_once('=') {
            Some((key, value)) => (key, Some(value)),
            None => (member, None),
        };
        if key != "u" {
            continue;
        }
        urgency = value
            .and_then(|v| v.parse::<u8>().ok())
            .filter(|&u| u <= MAX_URGENCY);
    }

    urgency.unwrap_or(DEFAULT_URGENCY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_values() {
        for u in 0..=MAX_URGENCY {
            assert_eq!(parse_urgency(&format!("u={u}")), u);
        }
    }

    #[test]
    fn test_default_urgency() {
        assert_eq!(parse_urgency(""), DEFAULT_URGENCY);
        assert_eq!(parse_urgency("i"), DEFAULT_URGENCY);
        assert_eq!(parse_urgency("u=8"), DEFAULT_URGENCY);
        assert_eq!(parse_urgency("u=-1"), DEFAULT_URGENCY);
        assert_eq!(parse_urgency("u=abc"), DEFAULT_URGENCY);
        assert_eq!(parse_urgency("u"), DEFAULT_URGENCY);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        assert_eq!(parse_urgency("foo=bar, u=5, i"), 5);
        assert_eq!(parse_urgency("\tu=0 ,x=1"), 0);
        assert_eq!(parse_urgency("u=2;p=1"), 2);
    }

    #[test]
    fn test_last_occurrence_wins() {
        assert_eq!(parse_urgency("u=1, u=6"), 6);
        assert_eq!(parse_urgency("u=1, u=9"), DEFAULT_URGENCY);
    }
}
