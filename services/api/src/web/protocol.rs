//! services/api/src/web/protocol.rs
//!
//! Wire framing for the step-run stream. Each event is serialized as one
//! `data: <json>` record, the same line-oriented framing the upstream
//! uses, so the client parses both ends of the relay identically.

use extractor_core::domain::StreamEvent;

/// Frames one event for the chunked response body.
pub fn frame(event: &StreamEvent) -> String {
    let payload = serde_json::to_string(event).unwrap();
    format!("data: {payload}\n\n")
}
