//! HTTP transport to the ingest endpoint: success is HTTP 200/201/202, all
//! other statuses and all request-building/network errors are failures that
//! route the batch to the spool. One in-flight request at a time keeps
//! spool-before-live ordering trivial (spec §9) - no concurrent sends, no
//! per-request retry loop (the spool itself is the retry mechanism).

use std::time::Duration;

use thiserror::Error;

use crate::event::Batch;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport error contacting ingest endpoint: {0}")]
    Request(#[from] reqwest::Error),
    #[error("ingest endpoint rejected batch with status {status}: {body_prefix}")]
    Rejected { status: u16, body_prefix: String },
}

/// Thin wrapper around a pooled blocking client, grounded on the teacher's
/// `http_client()` builder (explicit connect + overall timeouts, reused
/// across calls rather than built per request).
pub struct IngestClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_token: Option<String>,
}

impl IngestClient {
    pub fn new(
        endpoint: String,
        api_token: Option<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client, endpoint, api_token })
    }

    /// POSTs a batch. A success status is one of {200, 201, 202}; anything
    /// else, or any transport-level failure, is returned as an error so the
    /// caller can route the batch to the spool.
    pub fn send(&self, batch: &Batch) -> Result<(), TransportError> {
        let mut req = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(batch);

        if let Some(token) = &self.api_token {
            req = req.bearer_auth(token);
        }

        let resp = req.send()?;
        let status = resp.status();
        if matches!(status.as_u16(), 200 | 201 | 202) {
            return Ok(());
        }

        let body_prefix: String = resp
            .text()
            .unwrap_or_default()
            .chars()
            .take(200)
            .collect();
        Err(TransportError::Rejected { status: status.as_u16(), body_prefix })
    }
}
