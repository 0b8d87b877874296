//! HTTPS delivery to the ingestion API.

use std::collections::HashSet;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::config::Config;
use crate::payload::{Payload, PayloadMode};

const CLIENT_ID: &str = concat!("keen-forwarder/", env!("CARGO_PKG_VERSION"));

/// Network-level failure: timeout, refused connection, DNS. Always
/// propagated to the host scheduler so the flush is retried.
#[derive(Debug, Error)]
#[error("network failure delivering to ingestion API: {0}")]
pub struct TransportError(#[from] reqwest::Error);

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The API answered with something other than 201. Carries the
    /// original request body so a rejected payload can be replayed by hand.
    #[error("ingestion API rejected payload: status {status}, body {body:?}, request {request}")]
    Rejected {
        status: StatusCode,
        body: String,
        request: String,
    },
}

/// The delivery seam. The flush orchestrator is generic over this so tests
/// can substitute canned outcomes for the real HTTP client.
#[allow(async_fn_in_trait)]
pub trait Deliver {
    async fn deliver(&self, payload: &Payload) -> Result<(), DeliveryError>;
}

/// Lives as long as the host worker does. Holds only immutable credential
/// and logging configuration, so one instance is safe to share across
/// concurrently scheduled flushes.
pub struct KeenClient {
    http: reqwest::Client,
    api_url: Url,
    project_id: String,
    write_key: String,
    mode: PayloadMode,
    debug: bool,
    verbose_tags: HashSet<String>,
}

impl KeenClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            project_id: config.project_id.clone(),
            write_key: config.write_key.clone(),
            mode: config.mode,
            debug: config.debug,
            verbose_tags: config.verbose_tags.clone(),
        })
    }

    fn verbose(&self, tag: &str) -> bool {
        self.debug || self.verbose_tags.contains(tag)
    }

    /// Endpoint for one payload. Built segment by segment so that a
    /// destination containing URL metacharacters is percent-encoded rather
    /// than rerouting the request. The per-collection credential is added
    /// as a query parameter by `deliver`, not here.
    fn endpoint(&self, tag: &str) -> Url {
        let mut url = self.api_url.clone();
        {
            // Config rejects cannot-be-a-base API URLs.
            let mut segments = url
                .path_segments_mut()
                .expect("api_url is validated as a base URL");
            segments
                .pop_if_empty()
                .push(&self.project_id)
                .push("events");
            if self.mode == PayloadMode::PerCollection {
                segments.push(tag);
            }
        }
        url
    }
}

impl Deliver for KeenClient {
    async fn deliver(&self, payload: &Payload) -> Result<(), DeliveryError> {
        let verbose = self.verbose(&payload.tag);
        if verbose {
            info!(
                tag = %payload.tag,
                time = payload.time,
                events = payload.events,
                "processing payload"
            );
        }

        let mut req = self
            .http
            .post(self.endpoint(&payload.tag))
            .header("accept", "application/json")
            .header("content-type", "application/json")
            .header("user-agent", CLIENT_ID);

        req = match self.mode {
            PayloadMode::Aggregate => req.header("authorization", &self.write_key),
            PayloadMode::PerCollection => req.query(&[("api_key", self.write_key.as_str())]),
        };

        let resp = req
            .body(payload.body.clone())
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = resp.status();
        if status != StatusCode::CREATED {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_owned());
            return Err(DeliveryError::Rejected {
                status,
                body,
                request: payload.body.clone(),
            });
        }

        if verbose {
            info!(
                tag = %payload.tag,
                time = payload.time,
                events = payload.events,
                "payload accepted"
            );
        }
        Ok(())
    }
}
