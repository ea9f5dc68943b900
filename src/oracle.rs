//! Text-completion clients used by the map and reduce stages.
//!
//! The pipeline treats the language model as an opaque `prompt -> text` oracle. The
//! Ollama-backed client issues HTTP requests directly to the runtime's `/api/generate`
//! endpoint. Timeouts are enforced here; retries are not attempted.

use crate::config::OracleConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Provider was unreachable or timed out.
    #[error("Completion provider unavailable: {0}")]
    Unavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by completion providers.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Complete `prompt` and return the raw model output.
    async fn complete(&self, prompt: &str) -> Result<String, OracleError>;
}

/// Client for a local or remote Ollama runtime.
pub struct OllamaOracle {
    http: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaOracle {
    /// Build a client from the oracle configuration.
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let http = Client::builder()
            .user_agent("civicwatch/summarizer")
            .timeout(config.timeout)
            .build()
            .map_err(|error| {
                OracleError::Unavailable(format!("failed to construct HTTP client: {error}"))
            })?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl Oracle for OllamaOracle {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                OracleError::Unavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Unavailable(format!(
                "Ollama endpoint {} returned 404: {body}",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            OracleError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(OracleError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response)
    }
}
