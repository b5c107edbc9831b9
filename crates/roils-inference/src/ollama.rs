//! Ollama generation client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use roils_core::{
    defaults, BackendConfig, Error, GenerationBackend, GenerationOptions, GenerationOutcome,
    GenerationRequest, Result,
};

/// Client for a single Ollama endpoint using `/api/generate` in raw mode.
///
/// Every request carries the same fixed deadline. The client never retries;
/// recovery from timeouts belongs to the caller.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::with_timeout(&config.endpoint, Duration::from_secs(config.timeout_secs))
    }

    /// Create a client with an explicit deadline.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        info!(
            subsystem = "inference",
            component = "ollama",
            url = %base_url,
            timeout_ms = timeout.as_millis() as u64,
            "Initializing Ollama client"
        );

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn timed_out(&self, start: Instant) -> GenerationOutcome {
        let elapsed_ms = start.elapsed().as_millis() as u64;
        warn!(
            duration_ms = elapsed_ms,
            timeout_ms = self.timeout.as_millis() as u64,
            "Generation timed out"
        );
        GenerationOutcome::Timeout { elapsed_ms }
    }
}

/// Request payload for the Ollama `/api/generate` endpoint.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    /// Record key, echoed into the server's request log.
    key: &'a str,
    model: &'a str,
    prompt: &'a str,
    /// Send the prompt verbatim, without the model's chat template.
    raw: bool,
    stream: bool,
    options: &'a GenerationOptions,
}

/// Response from the Ollama `/api/generate` endpoint.
#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    done: Option<bool>,
}

/// Classify a 200 body: a completion needs a `response` string and `done: true`.
fn parse_completion(body: String) -> GenerationOutcome {
    match serde_json::from_str::<GenerateResponse>(&body) {
        Ok(GenerateResponse {
            response: Some(text),
            done: Some(true),
        }) => GenerationOutcome::Completed { text },
        _ => GenerationOutcome::InvalidFormat { body },
    }
}

#[async_trait]
impl GenerationBackend for OllamaClient {
    #[instrument(skip(self, request), fields(subsystem = "inference", component = "ollama", op = "generate", model = %request.model, record_key = %request.key, prompt_len = request.prompt.len()))]
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome> {
        let start = Instant::now();

        let payload = GenerateRequest {
            key: &request.key,
            model: request.model.as_str(),
            prompt: &request.prompt,
            raw: true,
            stream: false,
            options: &request.options,
        };

        let response = match self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Ok(self.timed_out(start)),
            Err(e) => return Err(Error::Request(format!("Request failed: {}", e))),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Ok(self.timed_out(start)),
            Err(e) => return Err(Error::Request(format!("Failed to read response: {}", e))),
        };

        let elapsed = start.elapsed().as_millis() as u64;
        let outcome = if status == StatusCode::OK {
            parse_completion(body)
        } else {
            GenerationOutcome::RequestFailed {
                status: status.as_u16(),
                body,
            }
        };

        match &outcome {
            GenerationOutcome::Completed { text } => debug!(
                response_len = text.len(),
                duration_ms = elapsed,
                "Generation complete"
            ),
            other => debug!(status = status.as_u16(), duration_ms = elapsed, "Generation failed: {}", other),
        }
        if elapsed > defaults::SLOW_GEN_MS {
            warn!(
                duration_ms = elapsed,
                prompt_len = request.prompt.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(outcome)
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(defaults::HEALTH_TIMEOUT_SECS))
            .send()
            .await;

        match response {
            Ok(resp) => {
                if resp.status().is_success() {
                    info!("Ollama health check passed");
                    Ok(true)
                } else {
                    warn!("Ollama health check failed: {}", resp.status());
                    Ok(false)
                }
            }
            Err(e) => {
                warn!("Ollama health check error: {}", e);
                Ok(false)
            }
        }
    }
}
