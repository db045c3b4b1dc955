//! Reasoning text extraction from streamed chat-completion payloads
//!
//! Providers that speak the OpenAI streaming wire shape disagree on where
//! in-progress reasoning goes. The payloads we care about look like
//! `{"choices":[{"delta":{"reasoning":"..."}}]}`, with the field name varying.

use serde_json::Value;

/// Delta fields that may carry reasoning text, in priority order.
pub const REASONING_FIELDS: [&str; 3] = ["reasoning", "reasoning_details", "thinking"];

/// Extract reasoning text from an untrusted streamed payload.
///
/// Looks at `choices[0].delta` and picks the first of [`REASONING_FIELDS`]
/// whose value is set (not null, `false`, `0` or `""`). The pick is final: if
/// that value is not a string the result is `None`, later fields are not
/// consulted. Any other shape mismatch also yields `None`.
///
/// The returned text is never empty.
#[must_use]
pub fn extract_reasoning_text(payload: &Value) -> Option<&str> {
    let delta = payload.as_object()?.get("choices")?.get(0)?.get("delta")?;

    REASONING_FIELDS
        .iter()
        .filter_map(|field| delta.get(field))
        .find(|value| is_set(value))?
        .as_str()
}

/// Loose "has a value" check matching how providers fill optional fields.
fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_structure_is_absent() {
        assert_eq!(extract_reasoning_text(&json!({})), None);
        assert_eq!(extract_reasoning_text(&json!({ "choices": [] })), None);
        assert_eq!(extract_reasoning_text(&json!({ "choices": [{}] })), None);
        assert_eq!(
            extract_reasoning_text(&json!({ "choices": [{ "delta": null }] })),
            None
        );
    }

    #[test]
    fn test_non_object_payloads_are_absent() {
        assert_eq!(extract_reasoning_text(&Value::Null), None);
        assert_eq!(extract_reasoning_text(&json!("reasoning")), None);
        assert_eq!(extract_reasoning_text(&json!(42)), None);
        assert_eq!(extract_reasoning_text(&json!([{ "choices": [] }])), None);
        assert_eq!(
            extract_reasoning_text(&json!({ "choices": { "0": { "delta": { "reasoning": "x" } } } })),
            None
        );
        assert_eq!(
            extract_reasoning_text(&json!({ "choices": ["delta"] })),
            None
        );
    }

    #[test]
    fn test_extracts_reasoning() {
        let payload = json!({ "choices": [{ "delta": { "reasoning": "thinking..." } }] });
        assert_eq!(extract_reasoning_text(&payload), Some("thinking..."));
    }

    #[test]
    fn test_extracts_alternate_fields() {
        let details = json!({ "choices": [{ "delta": { "reasoning_details": "step 1" } }] });
        assert_eq!(extract_reasoning_text(&details), Some("step 1"));

        let thinking = json!({ "choices": [{ "delta": { "thinking": "hmm" } }] });
        assert_eq!(extract_reasoning_text(&thinking), Some("hmm"));
    }

    #[test]
    fn test_field_priority() {
        let payload = json!({
            "choices": [{ "delta": { "thinking": "B", "reasoning": "A" } }]
        });
        assert_eq!(extract_reasoning_text(&payload), Some("A"));

        let payload = json!({
            "choices": [{ "delta": { "thinking": "B", "reasoning_details": "C" } }]
        });
        assert_eq!(extract_reasoning_text(&payload), Some("C"));
    }

    #[test]
    fn test_empty_fields_fall_through() {
        let payload = json!({
            "choices": [{ "delta": { "reasoning": "", "reasoning_details": null, "thinking": "B" } }]
        });
        assert_eq!(extract_reasoning_text(&payload), Some("B"));

        let payload = json!({ "choices": [{ "delta": { "reasoning": "" } }] });
        assert_eq!(extract_reasoning_text(&payload), None);
    }

    #[test]
    fn test_non_string_field_is_absent() {
        let payload = json!({ "choices": [{ "delta": { "reasoning": 123 } }] });
        assert_eq!(extract_reasoning_text(&payload), None);

        // The first set field decides, even when a later one is a string.
        let payload = json!({
            "choices": [{ "delta": { "reasoning_details": [{ "type": "reasoning.text" }], "thinking": "B" } }]
        });
        assert_eq!(extract_reasoning_text(&payload), None);
    }

    #[test]
    fn test_content_only_is_absent() {
        let payload = json!({ "choices": [{ "delta": { "content": "Hello" } }] });
        assert_eq!(extract_reasoning_text(&payload), None);
    }

    #[test]
    fn test_only_first_choice_is_inspected() {
        let payload = json!({
            "choices": [
                { "delta": { "content": "Hi" } },
                { "delta": { "reasoning": "second" } }
            ]
        });
        assert_eq!(extract_reasoning_text(&payload), None);
    }
}
