use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::UploadConfig;

/// Result of the single upload attempt for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UploadOutcome {
    Success,
    /// The request never got a response (DNS, refused, timeout, ...)
    NetworkFailure(String),
    /// The collector answered but reported errors, or a non-success status
    ServerRejected {
        status: u16,
        errors: Vec<serde_json::Value>,
    },
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success)
    }
}

#[derive(Debug, Deserialize)]
struct CollectorResponse {
    #[serde(default)]
    errors: Option<Vec<serde_json::Value>>,
}

/// Posts serialized sessions to the collector. One attempt, no retry.
#[derive(Clone)]
pub struct Uploader {
    client: reqwest::Client,
    endpoint: String,
}

impl Uploader {
    pub fn new(cfg: &UploadConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(concat!("drive_recorder/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Uploader {
            client,
            endpoint: cfg.endpoint.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn upload(&self, body: Vec<u8>) -> UploadOutcome {
        let size = body.len();
        info!("uploading {} KB to {}", size / 1024, self.endpoint);

        let response = match self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                error!("upload to {} failed: {}", self.endpoint, e);
                return UploadOutcome::NetworkFailure(e.to_string());
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                error!("failed to read collector response: {}", e);
                return UploadOutcome::NetworkFailure(e.to_string());
            }
        };

        let outcome = classify(status.as_u16(), &text);
        match &outcome {
            UploadOutcome::Success => info!("upload of {} bytes accepted", size),
            UploadOutcome::ServerRejected { status, errors } => {
                warn!("collector rejected upload (status {}): {:?}", status, errors)
            }
            UploadOutcome::NetworkFailure(_) => {}
        }
        outcome
    }
}

/// Map a collector response to an outcome. A success status is rejected only
/// by a non-empty `errors` array; a body that is not JSON is accepted.
fn classify(status: u16, body: &str) -> UploadOutcome {
    let errors = match serde_json::from_str::<CollectorResponse>(body) {
        Ok(resp) => resp.errors.unwrap_or_default(),
        Err(e) => {
            if (200..300).contains(&status) {
                warn!("collector response is not a JSON object ({}), treating as accepted", e);
            }
            Vec::new()
        }
    };

    if !(200..300).contains(&status) || !errors.is_empty() {
        return UploadOutcome::ServerRejected { status, errors };
    }
    UploadOutcome::Success
}
