//! Per-flush orchestration: decode, group, serialize, deliver.

use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::client::{Deliver, DeliveryError, KeenClient, TransportError};
use crate::config::{Config, ConfigError};
use crate::event::{self, CodecError, Event};
use crate::grouper::{self, GroupError};
use crate::payload::{self, PayloadMode, SerializeError};

/// Terminal outcome of one flush, as seen by the host scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Every payload was accepted; the batch is durably delivered.
    Consumed,
    /// A non-retryable failure was logged and the batch dropped.
    Discarded,
}

/// Everything that ends a flush without consuming the batch but is not
/// worth retrying. Transport failures never land here — they propagate
/// out of `write` so the host re-attempts the whole flush.
#[derive(Debug, Error)]
pub enum FlushError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Group(#[from] GroupError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error(transparent)]
    Delivery(DeliveryError),
}

impl FlushError {
    pub fn class(&self) -> &'static str {
        match self {
            FlushError::Codec(_) => "CodecError",
            FlushError::Group(_) => "GroupError",
            FlushError::Serialize(_) => "SerializeError",
            FlushError::Delivery(_) => "DeliveryError",
        }
    }
}

/// Sink for batches dropped on non-retryable failures. Swap in a
/// dead-letter implementation if silent loss on misconfiguration is not
/// acceptable for the deployment.
pub trait DiscardHook {
    fn on_discard(&self, error: &FlushError, events: usize);
}

/// Default hook: log the error class and message, then drop the batch.
pub struct LogDiscard;

impl DiscardHook for LogDiscard {
    fn on_discard(&self, error: &FlushError, events: usize) {
        error!(
            class = error.class(),
            %error,
            events,
            "dropping batch after non-retryable failure"
        );
    }
}

/// The flush entry point the host pipeline drives.
///
/// Generic over the delivery seam and the discard sink; production use is
/// `Forwarder::new`, which wires in [`KeenClient`] and [`LogDiscard`].
pub struct Forwarder<D = KeenClient, H = LogDiscard> {
    client: D,
    mode: PayloadMode,
    discard: H,
}

impl Forwarder {
    /// Build the forwarder from host configuration.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let client = KeenClient::new(&config)?;
        info!(project_id = %config.project_id, mode = %config.mode, "keen forwarder connected");
        if config.debug {
            info!("keen debug logging enabled");
        }
        Ok(Self {
            client,
            mode: config.mode,
            discard: LogDiscard,
        })
    }
}

impl<D: Deliver, H: DiscardHook> Forwarder<D, H> {
    /// Assemble from explicit parts, e.g. a host harness that injects its
    /// own delivery client or dead-letter sink.
    pub fn from_parts(client: D, mode: PayloadMode, discard: H) -> Self {
        Self {
            client,
            mode,
            discard,
        }
    }

    /// Replace the discard sink.
    pub fn with_discard_hook<H2: DiscardHook>(self, discard: H2) -> Forwarder<D, H2> {
        Forwarder {
            client: self.client,
            mode: self.mode,
            discard,
        }
    }

    /// Encode one event for the host's buffer.
    pub fn format(
        &self,
        routing_key: &str,
        timestamp: i64,
        record: Value,
    ) -> Result<Vec<u8>, CodecError> {
        Event::new(routing_key, timestamp, record).encode()
    }

    /// Flush one buffered chunk.
    ///
    /// A transport failure propagates unchanged and the events are not
    /// consumed; the host retries the whole chunk later. Every other
    /// failure is handed to the discard hook and the chunk is dropped. In
    /// per-collection mode a rejected destination does not stop delivery
    /// to the remaining destinations.
    pub async fn write(&self, chunk: &[u8]) -> Result<FlushOutcome, TransportError> {
        let events = match event::decode_batch(chunk) {
            Ok(events) => events,
            Err(err) => return Ok(self.discarded(err.into(), 0)),
        };
        let total = events.len();
        if total == 0 {
            return Ok(FlushOutcome::Consumed);
        }

        let grouped = match grouper::group(events) {
            Ok(grouped) => grouped,
            Err(err) => return Ok(self.discarded(err.into(), total)),
        };
        let payloads = match payload::build(self.mode, &grouped) {
            Ok(payloads) => payloads,
            Err(err) => return Ok(self.discarded(err.into(), total)),
        };

        let mut rejected: Option<DeliveryError> = None;
        for payload in &payloads {
            match self.client.deliver(payload).await {
                Ok(()) => {}
                Err(DeliveryError::Transport(err)) => {
                    warn!(tag = %payload.tag, %err, "transport failure, leaving batch for retry");
                    return Err(err);
                }
                Err(err) => {
                    // Other destinations may still be accepted.
                    warn!(tag = %payload.tag, %err, "payload rejected");
                    rejected.get_or_insert(err);
                }
            }
        }

        match rejected {
            Some(err) => Ok(self.discarded(FlushError::Delivery(err), total)),
            None => Ok(FlushOutcome::Consumed),
        }
    }

    fn discarded(&self, error: FlushError, events: usize) -> FlushOutcome {
        self.discard.on_discard(&error, events);
        FlushOutcome::Discarded
    }
}
