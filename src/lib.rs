//! Buffered event forwarder for a Keen-style analytics ingestion API.
//!
//! The host log pipeline owns buffering, flush scheduling, and retry
//! cadence. This crate owns one flush: decode a buffered chunk of
//! `[routing_key, timestamp, record]` envelopes, group the records by
//! destination collection (the last dot-separated segment of the routing
//! key), serialize them for the configured wire format, and POST them to
//! the ingestion API with the project credential.
//!
//! The host drives the forwarder through three operations:
//! [`Forwarder::new`] (configure), [`Forwarder::format`] (encode one event
//! for buffering), and [`Forwarder::write`] (flush one chunk). `write`
//! returns an error only for network-level failures, which the host is
//! expected to retry; every other failure is logged, handed to the
//! [`DiscardHook`], and the chunk is dropped.

pub mod client;
pub mod config;
pub mod event;
pub mod flush;
pub mod grouper;
pub mod payload;

#[cfg(test)]
mod testing;

pub use client::{Deliver, DeliveryError, KeenClient, TransportError};
pub use config::{Config, ConfigError};
pub use event::{CodecError, Event, decode_batch};
pub use flush::{DiscardHook, FlushError, FlushOutcome, Forwarder, LogDiscard};
pub use grouper::{GroupError, GroupedBatch};
pub use payload::{Payload, PayloadMode, PayloadModeError, SerializeError};
