//! Best-effort field scanner for model output.
//!
//! Language models are asked for JSON but routinely answer with prose,
//! fences, trailing commas or truncated objects. Instead of a conformant
//! parser this module scans for one field at a time:
//!
//! - the **first** occurrence of the quoted key wins
//! - strings run to the next unescaped double quote after the key's colon
//! - numbers are the longest run of digits, `.` and `-` after the colon
//!
//! Absent and malformed fields are indistinguishable: strings come back as
//! `None`, numbers as `0.0`. Nested braces inside values, unicode escapes and
//! keys outside the intended object are not handled.

/// Narrow interface over field extraction so a tolerant or streaming parser
/// can replace the scanner without touching the decoder.
pub trait FieldSource {
    /// Returns the string value of `key`, if one can be found.
    fn string_field(&self, blob: &str, key: &str) -> Option<String>;

    /// Returns the numeric value of `key`, or `0.0`.
    fn number_field(&self, blob: &str, key: &str) -> f64;
}

/// The scanning implementation of [`FieldSource`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanExtractor;

impl FieldSource for ScanExtractor {
    fn string_field(&self, blob: &str, key: &str) -> Option<String> {
        extract_string(blob, key)
    }

    fn number_field(&self, blob: &str, key: &str) -> f64 {
        extract_number(blob, key)
    }
}

/// Byte offset just past the colon that follows the first `"key"`.
fn value_start(blob: &str, key: &str) -> Option<usize> {
    let pattern = format!("\"{}\"", key);
    let key_idx = blob.find(&pattern)?;
    let after_key = key_idx + pattern.len();
    let colon = blob[after_key..].find(':')? + after_key;
    Some(colon + 1)
}

/// Extracts the string value of `key` from a JSON-like blob.
///
/// A quote preceded by a backslash does not end the string. The simple
/// escapes `\"`, `\\`, `\/`, `\n` and `\t` are decoded; anything else is
/// kept as written. Returns `None` if the key, colon or a terminated string
/// cannot be found.
pub fn extract_string(blob: &str, key: &str) -> Option<String> {
    let start = value_start(blob, key)?;
    let quote_start = blob[start..].find('"')? + start;

    let mut out = String::new();
    let mut chars = blob[quote_start + 1..].chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(out),
            '\\' => match chars.next() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some('/') => out.push('/'),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => return None,
            },
            _ => out.push(c),
        }
    }

    // Unterminated string
    None
}

/// Extracts the numeric value of `key` from a JSON-like blob.
///
/// Leading whitespace after the colon is skipped. Quoted numbers, exponents
/// and anything that does not parse as a finite `f64` yield `0.0`.
pub fn extract_number(blob: &str, key: &str) -> f64 {
    let Some(start) = value_start(blob, key) else {
        return 0.0;
    };

    let rest = blob[start..].trim_start_matches(|c: char| matches!(c, ' ' | '\t' | '\r' | '\n'));
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(rest.len());

    match rest[..end].parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_fields() {
        let blob = r#"{"name": "collapsed_wall", "forward": 4.5, "up": -1}"#;

        assert_eq!(extract_string(blob, "name").as_deref(), Some("collapsed_wall"));
        assert_eq!(extract_number(blob, "forward"), 4.5);
        assert_eq!(extract_number(blob, "up"), -1.0);
    }

    #[test]
    fn test_missing_fields_default() {
        let blob = r#"{"name": "x"}"#;

        assert_eq!(extract_string(blob, "label"), None);
        assert_eq!(extract_number(blob, "forward"), 0.0);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let blob = r#"{"right": 1.5, "right": 9}"#;
        assert_eq!(extract_number(blob, "right"), 1.5);
    }

    #[test]
    fn test_escaped_quote_does_not_terminate() {
        let blob = r#"{"name": "the \"red\" door", "forward": 2}"#;
        assert_eq!(extract_string(blob, "name").as_deref(), Some("the \"red\" door"));
    }

    #[test]
    fn test_escaped_backslash_before_closing_quote() {
        let blob = r#"{"name": "dir\\", "up": 1}"#;
        assert_eq!(extract_string(blob, "name").as_deref(), Some("dir\\"));
    }

    #[test]
    fn test_unicode_escape_kept_verbatim() {
        let blob = r#"{"name": "caf\u00e9"}"#;
        assert_eq!(extract_string(blob, "name").as_deref(), Some("caf\\u00e9"));
    }

    #[test]
    fn test_unterminated_string_is_none() {
        let blob = r#"{"name": "half"#;
        assert_eq!(extract_string(blob, "name"), None);
    }

    #[test]
    fn test_number_skips_whitespace_and_newlines() {
        let blob = "{\"forward\":\n\t  7.25,}";
        assert_eq!(extract_number(blob, "forward"), 7.25);
    }

    #[test]
    fn test_quoted_number_is_zero() {
        let blob = r#"{"forward": "3"}"#;
        assert_eq!(extract_number(blob, "forward"), 0.0);
    }

    #[test]
    fn test_garbage_number_is_zero() {
        assert_eq!(extract_number(r#"{"up": -}"#, "up"), 0.0);
        assert_eq!(extract_number(r#"{"up": 1.2.3}"#, "up"), 0.0);
        assert_eq!(extract_number(r#"{"up": }"#, "up"), 0.0);
    }

    #[test]
    fn test_exponent_truncates_to_mantissa() {
        assert_eq!(extract_number(r#"{"up": 2e3}"#, "up"), 2.0);
    }

    #[test]
    fn test_overflowing_number_is_zero() {
        let huge = format!(r#"{{"up": {}}}"#, "9".repeat(400));
        assert_eq!(extract_number(&huge, "up"), 0.0);
    }

    #[test]
    fn test_scan_extractor_delegates() {
        let source = ScanExtractor;
        let blob = r#"{"name": "a", "priority": 3}"#;

        assert_eq!(source.string_field(blob, "name").as_deref(), Some("a"));
        assert_eq!(source.number_field(blob, "priority"), 3.0);
    }
}
