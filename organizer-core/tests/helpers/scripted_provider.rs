//! Classification provider with canned answers per recipe slug

use async_trait::async_trait;
use organizer_core::provider::{
    ClassificationProvider, ClassificationRequest, ClassificationResponse, ProviderError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub struct ScriptedProvider {
    answers: Mutex<HashMap<String, Result<ClassificationResponse, ProviderError>>>,
    /// Used for tag-only requests, falling back to `answers`
    tag_answers: Mutex<HashMap<String, ClassificationResponse>>,
    requests: Mutex<Vec<ClassificationRequest>>,
    calls: AtomicUsize,
    /// Cancelled on the first call
    cancel_on_call: Option<CancellationToken>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            answers: Mutex::new(HashMap::new()),
            tag_answers: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            cancel_on_call: None,
        }
    }

    pub fn answer(self, slug: &str, categories: &[&str], tags: &[&str]) -> Self {
        let response = ClassificationResponse {
            categories: categories.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            raw: String::new(),
        };
        self.answers
            .lock()
            .unwrap()
            .insert(slug.to_string(), Ok(response));
        self
    }

    pub fn answer_tags(self, slug: &str, tags: &[&str]) -> Self {
        let response = ClassificationResponse {
            categories: Vec::new(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            raw: String::new(),
        };
        self.tag_answers
            .lock()
            .unwrap()
            .insert(slug.to_string(), response);
        self
    }

    pub fn fail(self, slug: &str, error: ProviderError) -> Self {
        self.answers
            .lock()
            .unwrap()
            .insert(slug.to_string(), Err(error));
        self
    }

    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_call = Some(token);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, slug: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.recipe_slug == slug)
            .count()
    }

    pub fn requests(&self) -> Vec<ClassificationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClassificationProvider for ScriptedProvider {
    fn provider_id(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-1"
    }

    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<ClassificationResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }

        if !request.mode.requests_categories() {
            if let Some(response) = self.tag_answers.lock().unwrap().get(&request.recipe_slug) {
                return Ok(response.clone());
            }
        }

        self.answers
            .lock()
            .unwrap()
            .get(&request.recipe_slug)
            .cloned()
            .unwrap_or_else(|| Ok(ClassificationResponse::default()))
    }

    async fn health_check(&self) -> bool {
        true
    }
}
