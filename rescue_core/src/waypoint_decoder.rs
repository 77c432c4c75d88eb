//! Waypoint Decoder - turns a language-model reply into candidate waypoints.
//!
//! The model is asked for a JSON array of objects shaped like
//! `{"name": str, "forward": m, "right": m, "up": m, "priority": int}`.
//! What actually comes back is treated as untrusted text:
//!
//! 1. A markdown code fence, if present, is unwrapped (first fence only)
//! 2. The outermost `[` ... `]` span is located; no span means no candidates
//! 3. Object blocks are cut as `{` up to the *first* following `}`
//! 4. Each block is scanned field by field and defaulted
//!
//! Step 3 is not brace-balanced: an object whose values contain `}` is cut
//! short and its remaining fields read as defaults. The schema we request
//! never nests, so this is accepted rather than papered over.

use serde::{Deserialize, Serialize};

use crate::text_extract::{FieldSource, ScanExtractor};

const FENCE: &str = "```";

/// One waypoint suggestion, still relative to the drone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointCandidate {
    /// Model-chosen label, or `waypoint_<index>`
    pub name: String,

    /// Meters along the drone's facing direction
    pub forward: f64,

    /// Meters to the drone's right
    pub right: f64,

    /// Meters along world up
    pub up: f64,

    /// 1 is most important; defaults to 1-based insertion order
    pub priority: i32,
}

/// Decodes model replies using a pluggable [`FieldSource`].
#[derive(Debug, Clone, Default)]
pub struct WaypointDecoder<F: FieldSource = ScanExtractor> {
    fields: F,
}

impl WaypointDecoder<ScanExtractor> {
    /// Creates a decoder backed by the scanning extractor.
    pub fn new() -> Self {
        Self {
            fields: ScanExtractor,
        }
    }
}

impl<F: FieldSource> WaypointDecoder<F> {
    /// Creates a decoder backed by a custom field source.
    pub fn with_fields(fields: F) -> Self {
        Self { fields }
    }

    /// Decodes every object block inside the reply's outermost array.
    ///
    /// Returns an empty list when no array can be found. An empty list is a
    /// normal outcome; the caller decides what to fly instead.
    pub fn decode(&self, response: &str) -> Vec<WaypointCandidate> {
        let mut results = Vec::new();

        let text = strip_code_fence(response);
        let Some(body) = array_body(text) else {
            return results;
        };

        let mut search_from = 0;
        while search_from < body.len() {
            let Some(obj_start) = body[search_from..].find('{').map(|i| i + search_from) else {
                break;
            };
            // Truncated object: nothing more to read
            let Some(obj_end) = body[obj_start..].find('}').map(|i| i + obj_start) else {
                break;
            };

            let block = &body[obj_start..=obj_end];
            search_from = obj_end + 1;

            results.push(self.candidate_from_block(block, results.len()));
        }

        results
    }

    fn candidate_from_block(&self, block: &str, index: usize) -> WaypointCandidate {
        let name = match self.fields.string_field(block, "name") {
            Some(name) if !name.is_empty() => name,
            _ => format!("waypoint_{}", index),
        };

        // `as` saturates and truncates toward zero
        let priority = match self.fields.number_field(block, "priority") as i32 {
            0 => index as i32 + 1,
            p => p,
        };

        WaypointCandidate {
            name,
            forward: self.fields.number_field(block, "forward"),
            right: self.fields.number_field(block, "right"),
            up: self.fields.number_field(block, "up"),
            priority,
        }
    }
}

/// Decodes a reply with the default scanning extractor.
pub fn decode(response: &str) -> Vec<WaypointCandidate> {
    WaypointDecoder::new().decode(response)
}

/// Returns the content of the first fenced block, or the whole text.
///
/// The info string (` ```json `) is skipped when a line break follows it
/// before the next fence. A missing closing fence runs to the end.
fn strip_code_fence(text: &str) -> &str {
    let Some(fence_start) = text.find(FENCE) else {
        return text;
    };

    let after_marker = fence_start + FENCE.len();
    let next_fence = text[after_marker..].find(FENCE).map(|i| i + after_marker);
    let content_start = match text[after_marker..].find('\n').map(|i| i + after_marker) {
        Some(newline) if next_fence.map_or(true, |f| newline < f) => newline + 1,
        _ => after_marker,
    };

    let content_end = text[content_start..]
        .find(FENCE)
        .map(|i| i + content_start)
        .unwrap_or(text.len());

    text[content_start..content_end].trim()
}

/// Text strictly between the first `[` and the last `]`.
fn array_body(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(&text[start + 1..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_WAYPOINTS: &str = r#"[{"name":"a","forward":2,"right":0,"up":1,"priority":1},{"name":"b","forward":5,"right":-1,"up":0,"priority":2}]"#;

    #[test]
    fn test_decode_well_formed_array() {
        let candidates = decode(TWO_WAYPOINTS);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name, "a");
        assert_eq!(candidates[0].forward, 2.0);
        assert_eq!(candidates[0].up, 1.0);
        assert_eq!(candidates[1].name, "b");
        assert_eq!(candidates[1].forward, 5.0);
        assert_eq!(candidates[1].right, -1.0);
        assert_eq!(candidates[1].up, 0.0);
        assert_eq!(candidates[1].priority, 2);
    }

    #[test]
    fn test_fenced_reply_decodes_identically() {
        let fenced = format!("Here you go:\n```json\n{}\n```\nStay safe!", TWO_WAYPOINTS);
        assert_eq!(decode(&fenced), decode(TWO_WAYPOINTS));
    }

    #[test]
    fn test_unclosed_fence_runs_to_end() {
        let fenced = format!("```\n{}", TWO_WAYPOINTS);
        assert_eq!(decode(&fenced).len(), 2);
    }

    #[test]
    fn test_single_line_fence() {
        let fenced = format!("```{}```", TWO_WAYPOINTS);
        assert_eq!(decode(&fenced), decode(TWO_WAYPOINTS));
    }

    #[test]
    fn test_malformed_object_does_not_hide_valid_one() {
        let reply = r#"[{"name": "broken", "forward": }, {"name":"b","forward":5,"right":-1,"up":0,"priority":2}]"#;
        let candidates = decode(reply);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].forward, 0.0);
        assert_eq!(candidates[1].name, "b");
        assert_eq!(candidates[1].forward, 5.0);
    }

    #[test]
    fn test_missing_array_is_empty() {
        assert!(decode(r#"{"name":"a","forward":2}"#).is_empty());
        assert!(decode("I could not find anything useful.").is_empty());
        assert!(decode("] backwards [").is_empty());
        assert!(decode("").is_empty());
    }

    #[test]
    fn test_truncated_reply_without_closing_bracket_is_empty() {
        let reply = r#"[{"name":"a","forward":2}, {"name":"b", "forw"#;
        assert!(decode(reply).is_empty());
    }

    #[test]
    fn test_truncated_last_object_is_dropped() {
        let reply = r#"[{"name":"a","forward":2}, {"name":"b" ]"#;
        let candidates = decode(reply);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "a");
    }

    #[test]
    fn test_defaults_for_name_and_priority() {
        let reply = r#"[{"forward": 1}, {"name": "", "priority": 0}, {"name": "c", "priority": 7}]"#;
        let candidates = decode(reply);

        assert_eq!(candidates[0].name, "waypoint_0");
        assert_eq!(candidates[0].priority, 1);
        assert_eq!(candidates[1].name, "waypoint_1");
        assert_eq!(candidates[1].priority, 2);
        assert_eq!(candidates[2].priority, 7);
    }

    #[test]
    fn test_fractional_priority_truncates() {
        let candidates = decode(r#"[{"name": "x", "priority": 2.9}]"#);
        assert_eq!(candidates[0].priority, 2);
    }

    #[test]
    fn test_empty_array_is_empty() {
        assert!(decode("[]").is_empty());
        assert!(decode("[ ]").is_empty());
    }

    #[test]
    fn test_nested_braces_cut_object_short() {
        // Known limitation: the block ends at the first closing brace
        let reply = r#"[{"name":"a","meta":{"k":1},"forward":2}]"#;
        let candidates = decode(reply);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "a");
        assert_eq!(candidates[0].forward, 0.0);
    }

    struct UpperNames;

    impl FieldSource for UpperNames {
        fn string_field(&self, blob: &str, key: &str) -> Option<String> {
            crate::text_extract::extract_string(blob, key).map(|s| s.to_uppercase())
        }

        fn number_field(&self, blob: &str, key: &str) -> f64 {
            crate::text_extract::extract_number(blob, key)
        }
    }

    #[test]
    fn test_custom_field_source() {
        let decoder = WaypointDecoder::with_fields(UpperNames);
        let candidates = decoder.decode(TWO_WAYPOINTS);
        assert_eq!(candidates[0].name, "A");
    }
}
