//! MessagePack envelope codec for buffered events.
//!
//! The host pipeline buffers events between flushes; `format` hands it one
//! encoded `[routing_key, timestamp, record]` envelope per event, and a
//! chunk presented to `write` is those envelopes back to back.

use std::io::Cursor;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode event envelope: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode event envelope: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// One routed record as produced by the upstream pipeline.
///
/// Immutable once decoded; lives for a single flush cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub routing_key: String,
    pub timestamp: i64,
    pub record: Value,
}

impl Event {
    pub fn new(routing_key: impl Into<String>, timestamp: i64, record: Value) -> Self {
        Self {
            routing_key: routing_key.into(),
            timestamp,
            record,
        }
    }

    /// Serialize as a compact MessagePack array `[routing_key, timestamp, record]`.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(rmp_serde::to_vec(self)?)
    }
}

/// Decode back-to-back envelopes until the end of the chunk.
pub fn decode_batch(chunk: &[u8]) -> Result<Vec<Event>, CodecError> {
    let mut cursor = Cursor::new(chunk);
    let mut events = Vec::new();
    while (cursor.position() as usize) < chunk.len() {
        let event = Event::deserialize(&mut rmp_serde::Deserializer::new(&mut cursor))?;
        events.push(event);
    }
    Ok(events)
}
