//! Client for the external presign collaborator.
//!
//! Given a logical chunk identity, the presign service returns a
//! time-limited upload target. Everything about how the backend signs URLs
//! is its own business; any failure to produce a target is treated
//! uniformly by the scheduler as a target-acquisition failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::configuration::types::ApiSettings;
use crate::error_handling::types::PresignError;

/// A short-lived, externally issued delivery target for one chunk.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub target_url: String,
    pub remote_key: String,
    pub expires_in_secs: u64,
}

#[async_trait]
pub trait PresignService: Send + Sync {
    /// Requests a delivery target for the chunk identified by
    /// `(session_id, seq)`.
    async fn request_target(
        &self,
        session_id: &str,
        seq: u32,
        content_type: &str,
    ) -> Result<UploadTarget, PresignError>;
}

#[derive(Debug, Serialize)]
struct PresignRequest<'a> {
    session_id: &'a str,
    sequence_number: u32,
    content_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct PresignResponse {
    upload_url: String,
    object_key: String,
    expires_in: u64,
}

/// HTTP implementation speaking to the presign endpoint with an optional
/// bearer credential.
pub struct HttpPresignService {
    client: reqwest::Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpPresignService {
    pub fn new(settings: &ApiSettings, timeout: Duration) -> Result<Self, PresignError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PresignError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: settings.presign_endpoint.clone(),
            bearer_token: settings.bearer_token.clone(),
        })
    }
}

#[async_trait]
impl PresignService for HttpPresignService {
    async fn request_target(
        &self,
        session_id: &str,
        seq: u32,
        content_type: &str,
    ) -> Result<UploadTarget, PresignError> {
        let mut request = self.client.post(&self.endpoint).json(&PresignRequest {
            session_id,
            sequence_number: seq,
            content_type,
        });
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PresignError::Network(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            let body: PresignResponse = response
                .json()
                .await
                .map_err(|e| PresignError::BadResponse(e.to_string()))?;
            Ok(UploadTarget {
                target_url: body.upload_url,
                remote_key: body.object_key,
                expires_in_secs: body.expires_in,
            })
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(PresignError::Unauthorized)
        } else if status.is_client_error() {
            Err(PresignError::InvalidRequest(format!(
                "status {}",
                status.as_u16()
            )))
        } else {
            Err(PresignError::Network(format!("status {}", status.as_u16())))
        }
    }
}
