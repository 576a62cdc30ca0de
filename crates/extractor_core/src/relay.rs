//! crates/extractor_core/src/relay.rs
//!
//! Bridges the upstream completion byte stream onto the client-facing event
//! channel. The upstream delivers newline-delimited `data: <json>` records in
//! arbitrary-sized chunks (a logical line may arrive split across any number
//! of chunks), terminated by a literal `[DONE]` sentinel. The relay reassembles
//! lines, forwards each text delta as a `processing` event, and accumulates
//! the full transcript for the caller to interpret and persist.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt;
use tokio::sync::mpsc;

use crate::domain::StreamEvent;

/// Prefix of every payload-bearing upstream line.
const DATA_PREFIX: &str = "data: ";

/// Literal sentinel marking upstream stream completion.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Fatal conditions for one streamed step run. All of them funnel into a
/// single terminal `error` event emitted by the caller; there is no retry at
/// this layer.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("upstream stream failed: {0}")]
    Upstream(String),
    #[error("upstream stream ended before the completion sentinel")]
    Truncated,
    #[error("client disconnected before the stream completed")]
    SinkClosed,
}

/// Consumes `upstream` until the `[DONE]` sentinel, emitting one `processing`
/// event per parsed delta and returning the accumulated transcript.
///
/// Line reassembly buffers the partial tail of each chunk and splits on `\n`
/// only, so a multi-byte character cut across chunks is never decoded early.
/// Payloads that fail to parse as JSON are skipped silently; a payload whose
/// shape lacks `choices[0].delta.content` contributes an empty delta but
/// still produces a `processing` event. Once the sentinel is seen, any bytes
/// still buffered are dropped unprocessed.
///
/// A failed event send means the receiving side went away; the upstream read
/// is abandoned and `SinkClosed` returned. The sender itself stays with the
/// caller, which closes the channel exactly once after the terminal event.
pub async fn relay<S, E>(
    mut upstream: S,
    events: &mpsc::Sender<StreamEvent>,
) -> Result<String, RelayError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: fmt::Display,
{
    let mut pending: Vec<u8> = Vec::new();
    let mut transcript = String::new();

    while let Some(chunk) = upstream.next().await {
        let chunk = chunk.map_err(|e| RelayError::Upstream(e.to_string()))?;
        pending.extend_from_slice(&chunk);

        // Drain every complete line; the unterminated tail stays buffered.
        while let Some(newline) = pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line[..newline]);

            let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
                continue;
            };
            if payload == DONE_SENTINEL {
                return Ok(transcript);
            }

            let Ok(envelope) = serde_json::from_str::<serde_json::Value>(payload) else {
                // Malformed upstream lines are expected noise, not failures.
                continue;
            };
            let delta = envelope
                .pointer("/choices/0/delta/content")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            transcript.push_str(delta);

            if events.send(StreamEvent::processing(delta)).await.is_err() {
                return Err(RelayError::SinkClosed);
            }
        }
    }

    Err(RelayError::Truncated)
}
