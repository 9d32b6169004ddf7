//! Classification provider adapters
//!
//! One capability interface ([`ClassificationProvider`]) with an
//! implementation per backend. The backend is chosen from configuration when
//! the provider is built; callers only ever see the trait object.

pub mod chat;
pub mod ollama;
pub mod prompt;

pub use chat::ChatProvider;
pub use ollama::OllamaProvider;

use crate::error::OrganizerError;
use crate::retry::Transient;
use async_trait::async_trait;
use organizer_common::{CategorizeMode, OrganizerConfig, ProviderKind};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Provider errors, classified for the engine's retry policy
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider request timed out")]
    Timeout,

    #[error("Provider rate limited the request")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Provider rejected credentials: {0}")]
    AuthFailure(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Provider unreachable: {0}")]
    Unreachable(String),
}

impl Transient for ProviderError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout | ProviderError::RateLimited { .. } | ProviderError::Unreachable(_)
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<ProviderError> for OrganizerError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout | ProviderError::RateLimited { .. } => {
                OrganizerError::ProviderTransient(err.to_string())
            }
            ProviderError::AuthFailure(_) | ProviderError::InvalidResponse(_) => {
                OrganizerError::ProviderPermanent(err.to_string())
            }
            ProviderError::Unreachable(msg) => OrganizerError::RemoteUnavailable(msg),
        }
    }
}

/// Classify a reqwest transport error
pub(crate) fn map_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else if err.is_decode() {
        ProviderError::InvalidResponse(err.to_string())
    } else {
        ProviderError::Unreachable(err.to_string())
    }
}

/// Classify a non-success HTTP status
pub(crate) fn map_status(
    status: reqwest::StatusCode,
    retry_after: Option<Duration>,
    body: String,
) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::AuthFailure(format!("HTTP {}", status.as_u16())),
        408 => ProviderError::Timeout,
        429 => ProviderError::RateLimited { retry_after },
        500..=599 => ProviderError::Unreachable(format!("HTTP {}: {}", status.as_u16(), body)),
        code => ProviderError::InvalidResponse(format!("HTTP {}: {}", code, body)),
    }
}

/// Parse a `Retry-After` header given in seconds
pub(crate) fn retry_after_header(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// One recipe to classify, restricted to the allowed taxonomy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    /// Recipe identifier echoed in the prompt
    pub recipe_slug: String,
    pub recipe_text: String,
    pub allowed_categories: Vec<String>,
    pub allowed_tags: Vec<String>,
    pub mode: CategorizeMode,
}

/// Normalized provider answer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassificationResponse {
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    /// Raw model output, kept for diagnostics
    pub raw: String,
}

impl ClassificationResponse {
    /// Normalize raw model text into categories and tags
    pub fn from_model_output(raw: String, recipe_slug: &str) -> Result<Self, ProviderError> {
        let value = prompt::parse_json_response(&raw).ok_or_else(|| {
            ProviderError::InvalidResponse(format!(
                "model output is not JSON: {}",
                prompt::preview(&raw)
            ))
        })?;
        let (categories, tags) = prompt::extract_assignment(&value, recipe_slug)?;
        Ok(Self {
            categories,
            tags,
            raw,
        })
    }
}

/// Classification backend capability
#[async_trait]
pub trait ClassificationProvider: Send + Sync {
    /// Stable backend identifier, part of the cache fingerprint
    fn provider_id(&self) -> &str;

    /// Model identifier, part of the cache fingerprint
    fn model_id(&self) -> &str;

    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<ClassificationResponse, ProviderError>;

    async fn health_check(&self) -> bool;
}

/// Build the provider selected by configuration
pub fn build_provider(
    config: &OrganizerConfig,
) -> Result<Arc<dyn ClassificationProvider>, OrganizerError> {
    let timeout = Duration::from_secs(config.request_timeout_secs());

    let provider: Arc<dyn ClassificationProvider> = match config.provider {
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(
            config.ollama.clone(),
            config.model_id().to_string(),
            timeout,
        )?),
        ProviderKind::Chatgpt => Arc::new(ChatProvider::new(
            config.chat.clone(),
            config.model_id().to_string(),
            timeout,
        )?),
    };

    tracing::info!(
        provider = provider.provider_id(),
        model = provider.model_id(),
        timeout_secs = timeout.as_secs(),
        "Classification provider configured"
    );

    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::RateLimited { retry_after: None }.is_transient());
        assert!(ProviderError::Unreachable("down".into()).is_transient());
        assert!(!ProviderError::AuthFailure("401".into()).is_transient());
        assert!(!ProviderError::InvalidResponse("junk".into()).is_transient());
    }

    #[test]
    fn test_status_mapping() {
        use reqwest::StatusCode;
        assert!(matches!(
            map_status(StatusCode::UNAUTHORIZED, None, String::new()),
            ProviderError::AuthFailure(_)
        ));
        assert_eq!(
            map_status(
                StatusCode::TOO_MANY_REQUESTS,
                Some(Duration::from_secs(2)),
                String::new()
            ),
            ProviderError::RateLimited {
                retry_after: Some(Duration::from_secs(2))
            }
        );
        assert!(matches!(
            map_status(StatusCode::BAD_GATEWAY, None, String::new()),
            ProviderError::Unreachable(_)
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_REQUEST, None, String::new()),
            ProviderError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_errors_map_onto_organizer_taxonomy() {
        let err: OrganizerError = ProviderError::Timeout.into();
        assert!(matches!(err, OrganizerError::ProviderTransient(_)));
        let err: OrganizerError = ProviderError::AuthFailure("401".into()).into();
        assert!(matches!(err, OrganizerError::ProviderPermanent(_)));
        let err: OrganizerError = ProviderError::Unreachable("refused".into()).into();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_build_provider_selects_backend_from_config() {
        let config = OrganizerConfig::default();
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.provider_id(), "ollama");
        assert_eq!(provider.model_id(), "mistral:7b");

        let mut config = OrganizerConfig {
            provider: ProviderKind::Chatgpt,
            model: "gpt-4o".to_string(),
            ..Default::default()
        };
        config.chat.api_key = Some("sk-test".to_string());
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.provider_id(), "chatgpt");
        assert_eq!(provider.model_id(), "gpt-4o");
    }

    #[test]
    fn test_response_from_fenced_output() {
        let raw = "```json\n{\"categories\": [\"Dinner\"], \"tags\": [\"Quick\"]}\n```".to_string();
        let response = ClassificationResponse::from_model_output(raw.clone(), "soup").unwrap();
        assert_eq!(response.categories, vec!["Dinner"]);
        assert_eq!(response.tags, vec!["Quick"]);
        assert_eq!(response.raw, raw);
    }

    #[test]
    fn test_response_rejects_prose() {
        let result = ClassificationResponse::from_model_output("I cannot help".to_string(), "soup");
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }
}
