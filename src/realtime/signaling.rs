//! SDP offer/answer exchange with the voice provider.

use std::time::Duration;

use tracing::Instrument;

use crate::error::{ClientError, Result};
use crate::observability::redact::RedactedString;

/// Posts SDP offers to the provider's realtime endpoint.
#[derive(Debug, Clone)]
pub struct Signaling {
    http: reqwest::Client,
    provider_url: String,
    model: String,
}

impl Signaling {
    /// # Errors
    ///
    /// `ClientError::Config` when the HTTP client cannot be built.
    pub fn new(provider_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build signaling client: {e}")))?;
        Ok(Self {
            http,
            provider_url: provider_url.into(),
            model: model.into(),
        })
    }

    /// `<provider_url>?model=<model>`.
    pub fn offer_url(&self) -> String {
        format!("{}?model={}", self.provider_url, urlencoding::encode(&self.model))
    }

    /// Send `offer` and return the provider's SDP answer.
    ///
    /// # Errors
    ///
    /// `ClientError::Realtime` for transport failures and non-success statuses.
    pub async fn exchange(&self, offer: &str, credential: &RedactedString) -> Result<String> {
        let span = crate::api_request_span!("POST", "realtime/sdp");
        async {
            let response = self
                .http
                .post(self.offer_url())
                .bearer_auth(credential.as_str())
                .header(reqwest::header::CONTENT_TYPE, "application/sdp")
                .body(offer.to_string())
                .send()
                .await
                .map_err(|e| ClientError::Realtime(format!("connection failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ClientError::Realtime(format!(
                    "connection failed: {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or_default()
                )));
            }
            response
                .text()
                .await
                .map_err(|e| ClientError::Realtime(format!("failed to read SDP answer: {e}")))
        }
        .instrument(span)
        .await
    }
}
