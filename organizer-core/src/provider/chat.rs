//! Hosted chat-completions backend

use super::{
    map_status, map_transport_error, prompt, retry_after_header, ClassificationProvider,
    ClassificationRequest, ClassificationResponse, ProviderError,
};
use crate::error::OrganizerError;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use organizer_common::config::ChatSettings;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

const USER_AGENT: &str = concat!("recipe-organizer/", env!("CARGO_PKG_VERSION"));
const SYSTEM_PROMPT: &str = "You are a precise JSON-only assistant.";

type DirectLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client with bearer authentication and optional
/// client-side throttling
pub struct ChatProvider {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    /// Outgoing request limiter; absent when no ceiling is configured
    rate_limiter: Option<DirectLimiter>,
}

impl ChatProvider {
    pub fn new(
        settings: ChatSettings,
        model: String,
        timeout: Duration,
    ) -> Result<Self, OrganizerError> {
        let api_key = settings
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                OrganizerError::Configuration(
                    "chat.api_key is empty; the hosted provider requires an API key".to_string(),
                )
            })?;

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| OrganizerError::Configuration(format!("HTTP client: {}", e)))?;

        let rate_limiter = settings
            .requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            http_client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            model,
            rate_limiter,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }
    }
}

#[async_trait]
impl ClassificationProvider for ChatProvider {
    fn provider_id(&self) -> &str {
        "chatgpt"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<ClassificationResponse, ProviderError> {
        let user_prompt = prompt::build_prompt(request);
        let payload = CompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: 0.0,
        };

        self.throttle().await;

        tracing::debug!(
            recipe = %request.recipe_slug,
            model = %self.model,
            "Querying hosted model"
        );

        let response = self
            .http_client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_header(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, retry_after, prompt::preview(&body)));
        }

        let completion: CompletionResponse = response.json().await.map_err(map_transport_error)?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidResponse("completion has no message content".to_string())
            })?;

        ClassificationResponse::from_model_output(content, &request.recipe_slug)
    }

    async fn health_check(&self) -> bool {
        self.throttle().await;
        match self
            .http_client
            .get(self.endpoint("models"))
            .bearer_auth(&self.api_key)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "Hosted model health check failed");
                false
            }
        }
    }
}
