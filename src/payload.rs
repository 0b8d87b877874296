//! Serializes a grouped batch into wire payloads.
//!
//! Serialization is pure: no I/O happens here, and the choice between the
//! two wire formats is made once at configuration time.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::grouper::GroupedBatch;

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("failed to encode payload JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
#[error("unknown payload mode: {0} (expected \"per-collection\" or \"aggregate\")")]
pub struct PayloadModeError(String);

/// Wire format toward the ingestion API.
///
/// `PerCollection` is the default: one request per destination, credential
/// as a query parameter. `Aggregate` is kept for compatibility with the
/// older API version that takes every destination in a single request
/// authenticated by header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadMode {
    Aggregate,
    PerCollection,
}

impl PayloadMode {
    pub fn parse(raw: &str) -> Result<Self, PayloadModeError> {
        match raw {
            "" | "per-collection" => Ok(PayloadMode::PerCollection),
            "aggregate" => Ok(PayloadMode::Aggregate),
            other => Err(PayloadModeError(other.to_owned())),
        }
    }
}

impl fmt::Display for PayloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadMode::Aggregate => write!(f, "aggregate"),
            PayloadMode::PerCollection => write!(f, "per-collection"),
        }
    }
}

/// One HTTP request's worth of serialized records.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub tag: String,
    pub time: i64,
    /// JSON request body, kept verbatim for diagnostics on rejection.
    pub body: String,
    pub events: usize,
}

/// Build the payloads one flush will deliver. An empty grouped batch
/// yields no payloads.
pub fn build(mode: PayloadMode, grouped: &GroupedBatch) -> Result<Vec<Payload>, SerializeError> {
    match mode {
        PayloadMode::Aggregate => {
            let (Some(tag), Some(time)) = (grouped.first_tag(), grouped.first_time()) else {
                return Ok(Vec::new());
            };

            // The older API takes every destination in one request,
            // labelled by the first destination seen.
            let mut doc = Map::new();
            for (tag, collection) in grouped.iter() {
                doc.insert(tag.to_owned(), Value::Array(collection.records.clone()));
            }
            let body = serde_json::to_string(&Value::Object(doc))?;

            Ok(vec![Payload {
                tag: tag.to_owned(),
                time,
                body,
                events: grouped.len(),
            }])
        }
        PayloadMode::PerCollection => grouped
            .iter()
            .map(|(tag, collection)| {
                let body = serde_json::to_string(&collection.records)?;
                Ok(Payload {
                    tag: tag.to_owned(),
                    time: collection.time,
                    body,
                    events: collection.records.len(),
                })
            })
            .collect(),
    }
}
