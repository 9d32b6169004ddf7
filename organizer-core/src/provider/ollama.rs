//! Local model backend (Ollama-compatible `/generate` API)

use super::{
    map_status, map_transport_error, prompt, retry_after_header, ClassificationProvider,
    ClassificationRequest, ClassificationResponse, ProviderError,
};
use crate::error::OrganizerError;
use async_trait::async_trait;
use organizer_common::config::{OllamaOptions, OllamaSettings};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const USER_AGENT: &str = concat!("recipe-organizer/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    options: &'a OllamaOptions,
    stream: bool,
}

/// One `/generate` response object (or one NDJSON line when streaming)
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Local model server client
pub struct OllamaProvider {
    http_client: reqwest::Client,
    settings: OllamaSettings,
    model: String,
}

impl OllamaProvider {
    pub fn new(
        settings: OllamaSettings,
        model: String,
        timeout: Duration,
    ) -> Result<Self, OrganizerError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| OrganizerError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            settings,
            model,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.settings.url.trim_end_matches('/'), path)
    }
}

/// Concatenate the `response` fragments of a `/generate` body, which is
/// either a single JSON object or newline-delimited chunks.
fn collect_generate_text(body: &str) -> Result<String, ProviderError> {
    let mut text = String::new();
    let mut chunks = 0;

    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Ok(chunk) = serde_json::from_str::<GenerateChunk>(line) else {
            continue;
        };
        if let Some(error) = chunk.error {
            return Err(ProviderError::InvalidResponse(error));
        }
        if let Some(fragment) = chunk.response {
            text.push_str(&fragment);
            chunks += 1;
        }
    }

    if chunks == 0 {
        return Err(ProviderError::InvalidResponse(format!(
            "no response field in model output: {}",
            prompt::preview(body)
        )));
    }

    Ok(text.trim().to_string())
}

#[async_trait]
impl ClassificationProvider for OllamaProvider {
    fn provider_id(&self) -> &str {
        "ollama"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<ClassificationResponse, ProviderError> {
        let payload = GenerateRequest {
            model: &self.model,
            prompt: format!(
                "{}\n\nRespond only with valid JSON.",
                prompt::build_prompt(request)
            ),
            options: &self.settings.options,
            stream: false,
        };

        tracing::debug!(
            recipe = %request.recipe_slug,
            model = %self.model,
            "Querying local model"
        );

        let response = self
            .http_client
            .post(self.endpoint("generate"))
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_header(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, retry_after, body));
        }

        let body = response.text().await.map_err(map_transport_error)?;
        let text = collect_generate_text(&body)?;

        ClassificationResponse::from_model_output(text, &request.recipe_slug)
    }

    async fn health_check(&self) -> bool {
        match self.http_client.get(self.endpoint("tags")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "Local model health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_single_object() {
        let body = r#"{"model":"mistral","response":"{\"tags\":[\"Quick\"]}","done":true}"#;
        assert_eq!(collect_generate_text(body).unwrap(), "{\"tags\":[\"Quick\"]}");
    }

    #[test]
    fn test_collect_streamed_chunks() {
        let body = "{\"response\":\"[{\\\"tags\\\":\"}\n{\"response\":\" [\\\"Quick\\\"]}]\"}\n{\"done\":true}\n";
        assert_eq!(
            collect_generate_text(body).unwrap(),
            "[{\"tags\": [\"Quick\"]}]"
        );
    }

    #[test]
    fn test_collect_reports_model_error() {
        let body = r#"{"error":"model 'nope' not found"}"#;
        assert!(matches!(
            collect_generate_text(body),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let settings = OllamaSettings {
            url: "http://localhost:11434/api/".to_string(),
            ..Default::default()
        };
        let provider =
            OllamaProvider::new(settings, "mistral:7b".to_string(), Duration::from_secs(5))
                .unwrap();
        assert_eq!(provider.endpoint("generate"), "http://localhost:11434/api/generate");
    }
}
