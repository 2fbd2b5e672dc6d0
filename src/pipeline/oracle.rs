//! Oracle interaction: ask an LLM for a category and validate its reply.
//!
//! [`ClassificationOracle`] is a thin request/response seam: one system
//! prompt and one user prompt in, raw reply text out. Prompt wording lives in
//! [`crate::prompts`] and the reply grammar in [`crate::pipeline::reply`];
//! this module only drives the retry loop between them.
//!
//! ## Retry Strategy
//!
//! Only *grammar* failures are retried. A model that answers
//! `"The document is about web apps"` might well answer correctly on the next
//! sample. A transport failure (bad key, quota, network) will not fix itself
//! within a few seconds, so it fails the task straight away.

use crate::category::CategorySet;
use crate::config::ClassifierConfig;
use crate::error::{ClassifyError, OracleError};
use crate::output::Classification;
use crate::pipeline::reply::parse_reply;
use crate::prompts::{classification_prompt, CLASSIFICATION_SYSTEM_PROMPT};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Model used when only a provider name is configured.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Something that answers classification prompts.
#[async_trait]
pub trait ClassificationOracle: Send + Sync {
    async fn ask(&self, system: &str, prompt: &str) -> Result<String, OracleError>;
}

/// [`ClassificationOracle`] backed by an `edgequake_llm` provider.
pub struct LlmOracle {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl LlmOracle {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ClassifierConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Resolve a provider from `config` and wrap it.
    pub async fn from_config(config: &ClassifierConfig) -> Result<Self, ClassifyError> {
        let provider = resolve_provider(config).await?;
        Ok(Self::new(provider, config))
    }

    fn build_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ClassificationOracle for LlmOracle {
    async fn ask(&self, system: &str, prompt: &str) -> Result<String, OracleError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(prompt)];
        let options = self.build_options();
        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| OracleError::new(format!("{}", e)))?;
        debug!(
            "Oracle: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Ask `oracle` to classify `text`, retrying replies that break the grammar.
///
/// Makes at most `policy.max_attempts` calls and returns on the first reply
/// that parses. The wait between attempts is an async sleep; there is no
/// wait after the last one.
pub async fn classify_text(
    oracle: &dyn ClassificationOracle,
    task_id: &str,
    text: &str,
    categories: &CategorySet,
    policy: &RetryPolicy,
    system_prompt: Option<&str>,
) -> Result<Classification, ClassifyError> {
    let system = system_prompt.unwrap_or(CLASSIFICATION_SYSTEM_PROMPT);
    let prompt = classification_prompt(text, categories);

    let mut last_err: String;
    let mut attempt = 1;
    loop {
        let reply = oracle.ask(system, &prompt).await?;
        match parse_reply(&reply, categories.len()) {
            Ok((label, confidence)) => {
                info!(
                    "Task {}: oracle answered '{}' {} on attempt {}",
                    task_id, label, confidence, attempt
                );
                return Ok(Classification {
                    label,
                    confidence,
                    attempts: attempt,
                });
            }
            Err(e) => {
                warn!(
                    "Task {}: attempt {}/{} unparseable reply {:?}: {}",
                    task_id, attempt, policy.max_attempts, reply, e
                );
                last_err = e.to_string();
            }
        }

        if !policy.should_retry(attempt) {
            break;
        }
        sleep(policy.delay_after(attempt)).await;
        attempt += 1;
    }

    Err(ClassifyError::ClassificationFormat {
        attempts: attempt,
        last_error: last_err,
    })
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ClassifyError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ClassifyError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`).
/// 2. **Named provider** (`config.provider_name` + `config.model`).
/// 3. **`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`** when both are set.
/// 4. **`OPENAI_API_KEY`** present → OpenAI with the configured or default model.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub async fn resolve_provider(config: &ClassifierConfig) -> Result<Arc<dyn LLMProvider>, ClassifyError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ClassifyError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays canned replies in order; repeats the last one when exhausted.
    struct Scripted {
        replies: Vec<Result<String, OracleError>>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<&str, &str>>) -> Self {
            Self {
                replies: replies
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(OracleError::new))
                    .collect(),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ClassificationOracle for Scripted {
        async fn ask(&self, _system: &str, prompt: &str) -> Result<String, OracleError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            let idx = n.min(self.replies.len() - 1);
            self.replies[idx].clone()
        }
    }

    fn cats() -> CategorySet {
        CategorySet::new(["MobileApp", "WebApp", "HardwareIOT"]).unwrap()
    }

    fn no_wait(n: u32) -> RetryPolicy {
        RetryPolicy::fixed(n, Duration::ZERO)
    }

    #[tokio::test]
    async fn first_valid_reply_wins() {
        let oracle = Scripted::new(vec![Ok("WebApp,[10,80,10]")]);
        let c = classify_text(&oracle, "t", "abstract", &cats(), &no_wait(5), None)
            .await
            .unwrap();
        assert_eq!(c.label, "WebApp");
        assert_eq!(c.confidence.values(), &[10, 80, 10]);
        assert_eq!(c.attempts, 1);
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn retries_until_parseable() {
        let oracle = Scripted::new(vec![
            Ok("I think it's a web app"),
            Ok("WebApp,[10,80]"),
            Ok("MobileApp,[70,20,10]"),
        ]);
        let c = classify_text(&oracle, "t", "abstract", &cats(), &no_wait(5), None)
            .await
            .unwrap();
        assert_eq!(c.label, "MobileApp");
        assert_eq!(c.attempts, 3);
        assert_eq!(oracle.calls(), 3);

        // The prompt is identical on every attempt.
        let prompts = oracle.prompts.lock().unwrap();
        assert!(prompts.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let oracle = Scripted::new(vec![Ok("no idea")]);
        let err = classify_text(&oracle, "t", "abstract", &cats(), &no_wait(5), None)
            .await
            .unwrap_err();
        assert_eq!(oracle.calls(), 5);
        match err {
            ClassifyError::ClassificationFormat { attempts, .. } => assert_eq!(attempts, 5),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn transport_errors_are_not_retried() {
        let oracle = Scripted::new(vec![Err("quota exceeded"), Ok("WebApp,[10,80,10]")]);
        let err = classify_text(&oracle, "t", "abstract", &cats(), &no_wait(5), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::OracleUnavailable(_)));
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_attempts_only() {
        let oracle = Scripted::new(vec![Ok("bad")]);
        let start = tokio::time::Instant::now();
        let policy = RetryPolicy::fixed(3, Duration::from_secs(1));
        let _ = classify_text(&oracle, "t", "abstract", &cats(), &policy, None).await;
        assert_eq!(oracle.calls(), 3);
        // Two gaps for three attempts.
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(2) && waited < Duration::from_secs(3));
    }
}
