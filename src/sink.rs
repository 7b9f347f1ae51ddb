//! Delivery of recognized text to the downstream HTTP endpoint.

use crate::defaults;
use crate::error::{Result, VoxrelayError};
use reqwest::StatusCode;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

/// Trait for handing a finished transcript to its consumer.
///
/// Delivery is best-effort: implementations report success or failure through
/// the return value and must not panic or retry on their own.
pub trait ResultSink: Send + Sync {
    /// Deliver one transcript. Returns `true` only when the consumer
    /// acknowledged it.
    fn deliver(&self, text: &str) -> bool;
}

/// Wire format for a delivered transcript
#[derive(Debug, Serialize)]
struct SpeechResult<'a> {
    text: &'a str,
}

/// Sink that POSTs transcripts as JSON to a fixed HTTP endpoint.
///
/// The endpoint is `http://<host>:3000/speech-result` and a delivery counts
/// as acknowledged only on HTTP 200 exactly. Any other status, and any
/// transport error, is reported as a failed delivery and logged; the
/// transcript itself is dropped.
pub struct HttpResultSink {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpResultSink {
    /// Create a sink targeting the standard endpoint on `host`.
    pub fn new(host: &str) -> Result<Self> {
        Self::with_url(format!(
            "http://{}:{}{}",
            host,
            defaults::API_PORT,
            defaults::API_ROUTE
        ))
    }

    fn with_url(url: String) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(defaults::DELIVERY_TIMEOUT_SECS))
            .build()
            .map_err(|e| VoxrelayError::Delivery {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, url })
    }
}

impl ResultSink for HttpResultSink {
    fn deliver(&self, text: &str) -> bool {
        let payload = SpeechResult { text };

        match self.client.post(&self.url).json(&payload).send() {
            Ok(response) if response.status() == StatusCode::OK => {
                info!("Delivered transcript ({} bytes)", text.len());
                true
            }
            Ok(response) => {
                warn!("Delivery rejected with status {}", response.status());
                false
            }
            Err(e) => {
                warn!("Delivery failed: {}", e);
                false
            }
        }
    }
}

/// Sink for testing that records every transcript handed to it.
#[derive(Debug)]
pub struct CollectingSink {
    delivered: Mutex<Vec<String>>,
    outcome: bool,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            outcome: true,
        }
    }

    /// Configure the sink to report every delivery as failed.
    pub fn with_failure(mut self) -> Self {
        self.outcome = false;
        self
    }

    /// Transcripts received so far, in delivery order.
    pub fn delivered(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of transcripts received so far.
    pub fn delivery_count(&self) -> usize {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for CollectingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultSink for CollectingSink {
    fn deliver(&self, text: &str) -> bool {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
        self.outcome
    }
}
