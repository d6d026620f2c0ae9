use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::{EstimationProvider, EstimatorError};

pub const DEFAULT_GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent";
pub const DEFAULT_ESTIMATOR_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            timeout: DEFAULT_ESTIMATOR_TIMEOUT,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// `generateContent` client. The credential travels as the `key` query
/// parameter; every call is bounded by the configured timeout.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, EstimatorError> {
        let endpoint =
            Url::parse(&config.endpoint).map_err(|source| EstimatorError::InvalidEndpoint {
                endpoint: config.endpoint.clone(),
                source,
            })?;
        let client = Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(EstimatorError::Client)?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl EstimationProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String, EstimatorError> {
        let payload = serde_json::json!({
            "contents": [
                { "parts": [ { "text": prompt } ] }
            ]
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EstimatorError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let body: Value = response.json().await.map_err(|error| {
            if error.is_decode() {
                EstimatorError::MalformedResponse("body is not JSON")
            } else {
                EstimatorError::Transport(error)
            }
        })?;

        extract_candidate_text(&body).ok_or(EstimatorError::MalformedResponse(
            "missing candidates[0].content.parts[0].text",
        ))
    }
}

/// Text of the first part of the first candidate.
pub fn extract_candidate_text(payload: &Value) -> Option<String> {
    payload
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?
        .first()?
        .get("text")?
        .as_str()
        .map(str::to_string)
}
