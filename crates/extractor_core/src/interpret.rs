//! crates/extractor_core/src/interpret.rs
//!
//! Resolves the accumulated stream transcript into the value that gets
//! persisted. Steps flagged for structured output get a strict JSON parse
//! with a raw-content fallback; everything else is wrapped as raw content.
//! Pure, no I/O, and never fails; invalid model output is expected.

use serde_json::{json, Value};

/// How the final value was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// The transcript parsed as the expected JSON document.
    Structured,
    /// Structured output was expected but the transcript was not valid JSON;
    /// it was wrapped as raw content instead.
    FallbackWrapped,
    /// Free-text step; the transcript is always wrapped.
    Raw,
}

/// An interpreted step result.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpreted {
    pub value: Value,
    pub kind: ResultKind,
}

/// Interprets a completed transcript according to the step's
/// structured-output flag.
pub fn interpret(expects_json: bool, transcript: &str) -> Interpreted {
    if expects_json {
        match serde_json::from_str::<Value>(transcript) {
            Ok(value) => Interpreted {
                value,
                kind: ResultKind::Structured,
            },
            Err(_) => Interpreted {
                value: wrap_content(transcript),
                kind: ResultKind::FallbackWrapped,
            },
        }
    } else {
        Interpreted {
            value: wrap_content(transcript),
            kind: ResultKind::Raw,
        }
    }
}

/// The `{ "content": <raw> }` wrapper used for free text and parse fallbacks.
fn wrap_content(transcript: &str) -> Value {
    json!({ "content": transcript })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_json_parses_when_structured_output_is_expected() {
        let interpreted = interpret(true, r#"{"pillars": [1, 2, 3]}"#);
        assert_eq!(interpreted.kind, ResultKind::Structured);
        assert_eq!(interpreted.value, json!({"pillars": [1, 2, 3]}));
    }

    #[test]
    fn invalid_json_falls_back_to_wrapped_content_without_panicking() {
        let interpreted = interpret(true, "not json");
        assert_eq!(interpreted.kind, ResultKind::FallbackWrapped);
        assert_eq!(interpreted.value, json!({"content": "not json"}));
    }

    #[test]
    fn free_text_steps_always_wrap() {
        // Even a transcript that happens to be valid JSON stays wrapped.
        let interpreted = interpret(false, r#"{"looks": "structured"}"#);
        assert_eq!(interpreted.kind, ResultKind::Raw);
        assert_eq!(
            interpreted.value,
            json!({"content": "{\"looks\": \"structured\"}"})
        );
    }

    #[test]
    fn empty_transcripts_are_tolerated() {
        let interpreted = interpret(true, "");
        assert_eq!(interpreted.kind, ResultKind::FallbackWrapped);
        assert_eq!(interpreted.value, json!({"content": ""}));
    }
}
