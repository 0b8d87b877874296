//! Test doubles for the delivery seam and the discard sink.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::StatusCode;
use url::Url;

use crate::client::{Deliver, DeliveryError, TransportError};
use crate::config::Config;
use crate::flush::{DiscardHook, FlushError};
use crate::payload::{Payload, PayloadMode};

pub fn dummy_config() -> Config {
    Config {
        project_id: "proj".to_owned(),
        write_key: "secret".to_owned(),
        api_url: Url::parse("http://localhost:8080/3.0/projects").unwrap(),
        debug: false,
        verbose_tags: Default::default(),
        mode: PayloadMode::PerCollection,
        timeout: Duration::from_millis(100),
        verify_tls: true,
    }
}

/// Accepts everything and records what was sent.
#[derive(Default)]
pub struct RecordingDelivery {
    pub sent: Mutex<Vec<Payload>>,
}

impl Deliver for RecordingDelivery {
    async fn deliver(&self, payload: &Payload) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

/// Rejects every payload with the given status.
pub struct RejectingDelivery {
    pub status: StatusCode,
}

impl Deliver for RejectingDelivery {
    async fn deliver(&self, payload: &Payload) -> Result<(), DeliveryError> {
        Err(DeliveryError::Rejected {
            status: self.status,
            body: "simulated rejection".to_owned(),
            request: payload.body.clone(),
        })
    }
}

/// Rejects one destination, accepts the rest, and records every attempt.
pub struct RejectTag {
    reject: &'static str,
    pub attempted: Mutex<Vec<String>>,
}

impl RejectTag {
    pub fn new(reject: &'static str) -> Self {
        Self {
            reject,
            attempted: Mutex::new(Vec::new()),
        }
    }
}

impl Deliver for RejectTag {
    async fn deliver(&self, payload: &Payload) -> Result<(), DeliveryError> {
        self.attempted.lock().unwrap().push(payload.tag.clone());
        if payload.tag == self.reject {
            Err(DeliveryError::Rejected {
                status: StatusCode::BAD_REQUEST,
                body: "simulated rejection".to_owned(),
                request: payload.body.clone(),
            })
        } else {
            Ok(())
        }
    }
}

/// Produces a real transport error by dialing a port that was just closed.
pub struct DisconnectedDelivery;

impl Deliver for DisconnectedDelivery {
    async fn deliver(&self, _payload: &Payload) -> Result<(), DeliveryError> {
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = reqwest::Client::new()
            .get(format!("http://127.0.0.1:{port}/"))
            .send()
            .await
            .expect_err("connection to a closed port must fail");
        Err(TransportError::from(err).into())
    }
}

/// Counts discards and remembers the last error class.
#[derive(Default)]
pub struct CountingDiscard {
    count: AtomicUsize,
    last_class: Mutex<Option<&'static str>>,
}

impl CountingDiscard {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn last_class(&self) -> Option<&'static str> {
        *self.last_class.lock().unwrap()
    }
}

impl DiscardHook for CountingDiscard {
    fn on_discard(&self, error: &FlushError, _events: usize) {
        self.count.fetch_add(1, Ordering::SeqCst);
        *self.last_class.lock().unwrap() = Some(error.class());
    }
}
