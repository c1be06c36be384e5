//! Byte transport to a delivery target.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error_handling::types::TransportError;

use super::presign::UploadTarget;

/// Observer a transport invokes as payload bytes are confirmed sent.
pub type ProgressObserver<'a> = &'a (dyn Fn(u64) + Send + Sync);

#[async_trait]
pub trait ChunkTransport: Send + Sync {
    /// Transmits the chunk payload to the delivery target. Any non-success
    /// response, timeout or transport error is a failure; the retry policy
    /// above this layer does not care which.
    async fn send(
        &self,
        target: &UploadTarget,
        content_type: &str,
        payload: Bytes,
        on_progress: ProgressObserver<'_>,
    ) -> Result<(), TransportError>;
}

/// PUT-style HTTP transport; success is any 2xx response.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ChunkTransport for HttpTransport {
    async fn send(
        &self,
        target: &UploadTarget,
        content_type: &str,
        payload: Bytes,
        on_progress: ProgressObserver<'_>,
    ) -> Result<(), TransportError> {
        let total = payload.len() as u64;
        let response = self
            .client
            .put(&target.target_url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::TimedOut
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        // The whole body went out in one request; report it in one step.
        on_progress(total);
        Ok(())
    }
}
