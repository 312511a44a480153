use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::AgentApiError;
use crate::events::{
    ChunkPayload, ErrorEventPayload, StreamEvent, ToolCallPayload, ToolResultPayload,
};

/// Incremental decoder for `event:`/`data:` framed message streams.
///
/// Chunks may split a logical frame at any byte offset; the decoder buffers
/// undelivered bytes and only interprets complete lines. One decoder serves
/// exactly one stream and is dropped when that stream ends.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    active_event: Option<String>,
    saw_terminal: bool,
}

impl FrameDecoder {
    /// Feed one raw chunk and drain every event completed by it.
    ///
    /// Malformed JSON in a `data:` line is fatal: the error propagates and
    /// the decoder must not be fed again.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<StreamEvent>, AgentApiError> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(split) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(0..=split).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            self.decode_line(line.trim_end_matches('\r'), &mut events)?;
        }

        Ok(events)
    }

    /// Validate stream shutdown after the last chunk has been fed.
    ///
    /// A connection that closes without an explicit `complete` or `error`
    /// event is an abnormal termination.
    pub fn finish(&self) -> Result<(), AgentApiError> {
        if self.saw_terminal {
            Ok(())
        } else {
            Err(AgentApiError::StreamEndedEarly)
        }
    }

    /// Returns true once a `complete` or `error` event has been decoded.
    #[must_use]
    pub fn saw_terminal(&self) -> bool {
        self.saw_terminal
    }

    fn decode_line(
        &mut self,
        line: &str,
        out: &mut Vec<StreamEvent>,
    ) -> Result<(), AgentApiError> {
        // Blank lines separate frames; the active event type persists until
        // the next `event:` line replaces it.
        if line.is_empty() {
            return Ok(());
        }

        if let Some(name) = line.strip_prefix("event:") {
            self.active_event = Some(name.trim().to_owned());
            return Ok(());
        }

        if let Some(payload) = line.strip_prefix("data:") {
            let payload = payload.trim();
            if payload.is_empty() {
                return Ok(());
            }

            let Some(event_type) = self.active_event.clone() else {
                return Err(AgentApiError::MalformedFrame(
                    "data line before any event line".to_owned(),
                ));
            };

            match decode_event(&event_type, payload)? {
                Some(event) => {
                    if event.is_terminal() {
                        self.saw_terminal = true;
                    }
                    out.push(event);
                }
                None => warn!(%event_type, "skipping unrecognized stream event"),
            }
            return Ok(());
        }

        // Comment lines and unknown fields are tolerated for wire
        // forward-compatibility.
        Ok(())
    }
}

fn decode_event(event_type: &str, payload: &str) -> Result<Option<StreamEvent>, AgentApiError> {
    let event = match event_type {
        "chunk" => {
            let ChunkPayload { text } = parse_payload(payload)?;
            StreamEvent::Chunk { text }
        }
        "tool_call" => {
            let decoded: ToolCallPayload = parse_payload(payload)?;
            StreamEvent::ToolCall {
                tool_call_id: decoded.tool_call_id,
                tool_name: decoded.tool_name,
                input: decoded.input,
            }
        }
        "tool_result" => {
            let decoded: ToolResultPayload = parse_payload(payload)?;
            StreamEvent::ToolResult {
                tool_call_id: decoded.tool_call_id,
                output: decoded.output,
            }
        }
        "complete" => {
            // The payload carries no required fields but must still be JSON.
            let _: serde_json::Value = parse_payload(payload)?;
            StreamEvent::Complete
        }
        "error" => {
            let decoded: ErrorEventPayload = parse_payload(payload)?;
            StreamEvent::Error {
                message: decoded.message,
            }
        }
        _ => return Ok(None),
    };

    Ok(Some(event))
}

fn parse_payload<T: DeserializeOwned>(payload: &str) -> Result<T, AgentApiError> {
    serde_json::from_str(payload)
        .map_err(|error| AgentApiError::MalformedFrame(format!("invalid JSON data line: {error}")))
}
