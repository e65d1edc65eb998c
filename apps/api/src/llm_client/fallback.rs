//! Model fallback.
//!
//! `ModelRouter::generate` tries the preferred model (or the configured
//! default), then each configured fallback in order. Rate-limit and
//! model-unavailable failures advance to the next model; anything else is
//! surfaced immediately. Each model gets a single attempt.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::llm_client::usage::{AttemptOutcome, UsageTracker};
use crate::llm_client::{
    AnthropicBackend, ApiKeys, GenerateOptions, LlmError, ModelBackend, ModelSpec,
    OpenAiCompatibleBackend, Provider,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// 429/402 or a quota flag.
    RateLimited,
    /// 404/403/400, "not found"/"decommissioned", or no key for the provider.
    Unavailable,
    Fatal,
}

pub fn classify(err: &LlmError) -> FailureClass {
    match err {
        LlmError::QuotaExceeded(_) => FailureClass::RateLimited,
        LlmError::MissingApiKey(_) | LlmError::UnsupportedProvider(_) => FailureClass::Unavailable,
        LlmError::Api { status, message } => {
            let message = message.to_lowercase();
            if matches!(status, 429 | 402)
                || message.contains("quota")
                || message.contains("rate limit")
                || message.contains("rate_limit")
            {
                FailureClass::RateLimited
            } else if matches!(status, 404 | 403 | 400)
                || message.contains("not found")
                || message.contains("decommissioned")
            {
                FailureClass::Unavailable
            } else {
                FailureClass::Fatal
            }
        }
        _ => FailureClass::Fatal,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    pub text: String,
    pub model: ModelSpec,
}

#[derive(Clone)]
pub struct ModelRouter {
    backends: HashMap<Provider, Arc<dyn ModelBackend>>,
    default_model: ModelSpec,
    fallback_models: Vec<ModelSpec>,
    keys: ApiKeys,
    usage: UsageTracker,
}

impl ModelRouter {
    pub fn new(default_model: ModelSpec, fallback_models: Vec<ModelSpec>, keys: ApiKeys) -> Self {
        Self {
            backends: HashMap::new(),
            default_model,
            fallback_models,
            keys,
            usage: UsageTracker::new(),
        }
    }

    /// Router with the Anthropic, Groq and OpenAI backends registered.
    pub fn with_default_backends(
        default_model: ModelSpec,
        fallback_models: Vec<ModelSpec>,
        keys: ApiKeys,
    ) -> Self {
        Self::new(default_model, fallback_models, keys)
            .with_backend(Provider::Anthropic, Arc::new(AnthropicBackend::new()))
            .with_backend(Provider::Groq, Arc::new(OpenAiCompatibleBackend::groq()))
            .with_backend(Provider::OpenAi, Arc::new(OpenAiCompatibleBackend::openai()))
    }

    pub fn with_backend(mut self, provider: Provider, backend: Arc<dyn ModelBackend>) -> Self {
        self.backends.insert(provider, backend);
        self
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    pub fn default_model(&self) -> &ModelSpec {
        &self.default_model
    }

    /// Models in attempt order, without duplicates.
    pub fn attempt_order(&self, preferred: Option<&ModelSpec>) -> Vec<ModelSpec> {
        let first = preferred.unwrap_or(&self.default_model);
        let mut order = vec![first.clone()];
        for model in std::iter::once(&self.default_model).chain(self.fallback_models.iter()) {
            if !order.contains(model) {
                order.push(model.clone());
            }
        }
        order
    }

    pub async fn generate(
        &self,
        prompt: &str,
        preferred: Option<&ModelSpec>,
        options: &GenerateOptions,
        api_keys: Option<&ApiKeys>,
    ) -> Result<Generation, LlmError> {
        let keys = match api_keys {
            Some(request_keys) => request_keys.over(&self.keys),
            None => self.keys.clone(),
        };

        let mut last_error: Option<LlmError> = None;
        for model in self.attempt_order(preferred) {
            let label = model.to_string();
            let result = match self.backends.get(&model.provider) {
                Some(backend) => {
                    backend
                        .generate(&model.model, prompt, options, keys.for_provider(model.provider))
                        .await
                }
                None => Err(LlmError::UnsupportedProvider(model.provider)),
            };

            match result {
                Ok(text) => {
                    self.usage.record(&label, AttemptOutcome::Success);
                    info!("Model {label} succeeded");
                    return Ok(Generation { text, model });
                }
                Err(err) => match classify(&err) {
                    FailureClass::RateLimited => {
                        self.usage.record(&label, AttemptOutcome::RateLimited);
                        warn!("Model {label} rate limited, trying next model: {err}");
                        last_error = Some(err);
                    }
                    FailureClass::Unavailable => {
                        self.usage.record(&label, AttemptOutcome::Unavailable);
                        warn!("Model {label} unavailable, trying next model: {err}");
                        last_error = Some(err);
                    }
                    FailureClass::Fatal => {
                        self.usage.record(&label, AttemptOutcome::Failed);
                        warn!("Model {label} failed: {err}");
                        return Err(err);
                    }
                },
            }
        }

        Err(last_error.unwrap_or(LlmError::NoModels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Clone)]
    enum Script {
        Reply(&'static str),
        Status(u16, &'static str),
        Quota,
    }

    /// Backend whose responses are fixed per model name; records every call.
    #[derive(Default)]
    struct ScriptedBackend {
        scripts: HashMap<String, Script>,
        calls: Mutex<Vec<String>>,
        seen_keys: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedBackend {
        fn with(mut self, model: &str, script: Script) -> Self {
            self.scripts.insert(model.to_string(), script);
            self
        }

        fn calls_to(&self, model: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|m| *m == model).count()
        }

        fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        async fn generate(
            &self,
            model: &str,
            _prompt: &str,
            _options: &GenerateOptions,
            api_key: Option<&str>,
        ) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push(model.to_string());
            self.seen_keys
                .lock()
                .unwrap()
                .push(api_key.map(str::to_string));
            match self.scripts.get(model).cloned() {
                Some(Script::Reply(text)) => Ok(text.to_string()),
                Some(Script::Status(status, message)) => Err(LlmError::Api {
                    status,
                    message: message.to_string(),
                }),
                Some(Script::Quota) => Err(LlmError::QuotaExceeded("quota".to_string())),
                None => Err(LlmError::Api {
                    status: 404,
                    message: "model not found".to_string(),
                }),
            }
        }
    }

    fn groq(model: &str) -> ModelSpec {
        ModelSpec::new(Provider::Groq, model)
    }

    fn keys() -> ApiKeys {
        ApiKeys {
            groq: Some("gsk-test".to_string()),
            ..ApiKeys::default()
        }
    }

    fn router(backend: Arc<ScriptedBackend>, fallbacks: &[&str]) -> ModelRouter {
        ModelRouter::new(
            groq("primary"),
            fallbacks.iter().map(|m| groq(m)).collect(),
            keys(),
        )
        .with_backend(Provider::Groq, backend)
    }

    #[tokio::test]
    async fn test_rate_limited_preferred_falls_back_once() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .with("primary", Script::Status(429, "Too Many Requests"))
                .with("backup", Script::Reply("from backup")),
        );
        let router = router(backend.clone(), &["backup"]);

        let generation = router
            .generate("prompt", None, &GenerateOptions::default(), None)
            .await
            .expect("fallback should succeed");

        assert_eq!(generation.text, "from backup");
        assert_eq!(generation.model, groq("backup"));
        assert_eq!(backend.calls_to("primary"), 1, "preferred attempted exactly once");
        assert_eq!(router.usage().get("groq:primary").rate_limited, 1);
        assert_eq!(router.usage().get("groq:backup").successes, 1);
    }

    #[tokio::test]
    async fn test_explicit_preferred_model_goes_first() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .with("chosen", Script::Quota)
                .with("primary", Script::Reply("from default")),
        );
        let router = router(backend.clone(), &[]);

        let generation = router
            .generate("p", Some(&groq("chosen")), &GenerateOptions::default(), None)
            .await
            .unwrap();

        assert_eq!(generation.text, "from default");
        assert_eq!(*backend.calls.lock().unwrap(), vec!["chosen", "primary"]);
    }

    #[tokio::test]
    async fn test_decommissioned_model_advances() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .with("primary", Script::Status(500, "The model has been decommissioned"))
                .with("backup", Script::Reply("ok")),
        );
        let router = router(backend, &["backup"]);
        let generation = router
            .generate("p", None, &GenerateOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(generation.text, "ok");
        assert_eq!(router.usage().get("groq:primary").unavailable, 1);
    }

    #[tokio::test]
    async fn test_fatal_error_surfaces_without_fallback() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .with("primary", Script::Status(500, "internal error"))
                .with("backup", Script::Reply("never")),
        );
        let router = router(backend.clone(), &["backup"]);

        let err = router
            .generate("p", None, &GenerateOptions::default(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::Api { status: 500, .. }));
        assert_eq!(backend.calls_to("backup"), 0);
        assert_eq!(router.usage().get("groq:primary").failed, 1);
    }

    #[tokio::test]
    async fn test_exhausted_list_returns_last_error() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .with("primary", Script::Status(429, "slow down"))
                .with("backup", Script::Status(404, "no such model")),
        );
        let router = router(backend.clone(), &["backup"]);

        let err = router
            .generate("p", None, &GenerateOptions::default(), None)
            .await
            .unwrap_err();

        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "no such model");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(backend.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_backend_is_unavailable() {
        let backend = Arc::new(ScriptedBackend::default().with("primary", Script::Reply("groq ok")));
        let router = ModelRouter::new(
            ModelSpec::new(Provider::Anthropic, "claude-sonnet-4-5"),
            vec![groq("primary")],
            keys(),
        )
        .with_backend(Provider::Groq, backend);

        let generation = router
            .generate("p", None, &GenerateOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(generation.text, "groq ok");
        assert_eq!(
            router.usage().get("anthropic:claude-sonnet-4-5").unavailable,
            1
        );
    }

    #[tokio::test]
    async fn test_request_keys_override_configured_keys() {
        let backend = Arc::new(ScriptedBackend::default().with("primary", Script::Reply("ok")));
        let router = router(backend.clone(), &[]);
        let request_keys = ApiKeys {
            groq: Some("gsk-user".to_string()),
            ..ApiKeys::default()
        };

        router
            .generate("p", None, &GenerateOptions::default(), Some(&request_keys))
            .await
            .unwrap();

        assert_eq!(
            *backend.seen_keys.lock().unwrap(),
            vec![Some("gsk-user".to_string())]
        );
    }

    #[test]
    fn test_attempt_order_deduplicates() {
        let backend = Arc::new(ScriptedBackend::default());
        let router = router(backend, &["backup", "primary", "backup"]);
        assert_eq!(
            router.attempt_order(Some(&groq("backup"))),
            vec![groq("backup"), groq("primary")]
        );
        assert_eq!(router.attempt_order(None), vec![groq("primary"), groq("backup")]);
    }

    #[test]
    fn test_classify_failures() {
        let api = |status, message: &str| LlmError::Api {
            status,
            message: message.to_string(),
        };
        assert_eq!(classify(&api(429, "")), FailureClass::RateLimited);
        assert_eq!(classify(&api(402, "")), FailureClass::RateLimited);
        assert_eq!(classify(&api(500, "Rate limit reached")), FailureClass::RateLimited);
        assert_eq!(classify(&api(403, "")), FailureClass::Unavailable);
        assert_eq!(classify(&api(400, "bad")), FailureClass::Unavailable);
        assert_eq!(classify(&api(502, "Model Not Found")), FailureClass::Unavailable);
        assert_eq!(classify(&api(503, "overloaded")), FailureClass::Fatal);
        assert_eq!(
            classify(&LlmError::MissingApiKey(Provider::OpenAi)),
            FailureClass::Unavailable
        );
        assert_eq!(classify(&LlmError::EmptyContent), FailureClass::Fatal);
    }
}
