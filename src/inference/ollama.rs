use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{GenerationError, TextBackend};

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Non-streaming client for Ollama's `/api/generate`.
#[derive(Clone)]
pub struct OllamaBackend {
    client: reqwest::Client,
    generate_url: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?;

        Ok(Self {
            client,
            generate_url: format!("{}/api/generate", base_url.trim_end_matches('/')),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextBackend for OllamaBackend {
    async fn invoke(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&self.generate_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Transport {
                url: self.generate_url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // Ollama reports failures as {"error": "..."}.
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(GenerationError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Decode(e.to_string()))?;

        // A model can fail after the headers went out with 200.
        match body {
            GenerateResponse {
                error: Some(message),
                ..
            } => Err(GenerationError::Backend(message)),
            GenerateResponse {
                response: Some(text),
                ..
            } => Ok(text),
            _ => Err(GenerationError::Decode(
                "response field missing from /api/generate body".into(),
            )),
        }
    }
}
