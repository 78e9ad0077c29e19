//! The chat service: one inbound message in, one advisor reply out.
//!
//! 1. **Validate** the message and conversation id ([`ChatRequest::parse`])
//! 2. **Lock** the conversation so its requests run one at a time
//! 3. **Cache lookup** on the normalized message, scoped to the conversation
//! 4. **Load history**, summarize it, and assemble it into the token budget
//! 5. **Shape** the request (budget model and a smaller reply once the daily
//!    budget is exhausted)
//! 6. **Complete** through the retrying provider
//! 7. **Record** cost, **cache** the reply, **append** both turns
//!
//! Cache, store and tracker problems never fail a request. Transient upstream
//! failures that outlast the retries become a canned reply flagged
//! `degraded`; only rejections and malformed responses surface as errors.

use crate::context::{AssemblyInput, ContextAssembler, HistorySummarizer, TokenBudget, TopicTable};
use crate::locks::ConversationLocks;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tellerbot_config::AppConfig;
use tellerbot_core::error::{Error, ProviderError, Result, StoreError, ValidationError};
use tellerbot_core::provider::{GenerationParams, ProviderRequest, Usage};
use tellerbot_core::{Conversation, ConversationId, ConversationStore, Provider, Turn};
use tellerbot_memory::{
    CacheKey, CachedResponse, InMemoryConversationStore, InMemoryKeyValueStore,
    NoopConversationStore, ResponseCache,
};
use tellerbot_providers::{OpenAiCompatProvider, RetryConfig, RetryingProvider};
use tellerbot_telemetry::{CostTracker, ModelPricing, PricingTable, UsageSnapshot};
use tracing::{debug, error, info, warn};

// ── Request / reply ───────────────────────────────────────────────────────

/// A validated inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: ConversationId,
}

impl ChatRequest {
    /// Validate raw client input.
    ///
    /// The message is trimmed, must be non-empty and at most `max_chars`
    /// characters. A missing or blank conversation id starts a new
    /// conversation.
    pub fn parse(
        message: &str,
        conversation_id: Option<&str>,
        max_chars: usize,
    ) -> std::result::Result<Self, ValidationError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        let length = message.chars().count();
        if length > max_chars {
            return Err(ValidationError::MessageTooLong {
                length,
                max: max_chars,
            });
        }

        let conversation_id = match conversation_id.map(str::trim) {
            Some(id) if !id.is_empty() => ConversationId::parse(id)?,
            _ => ConversationId::new(),
        };

        Ok(Self {
            message: message.to_string(),
            conversation_id,
        })
    }
}

/// The reply returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub conversation_id: ConversationId,
    /// Served from the response cache.
    pub cached: bool,
    /// Budget-shaped request or canned fallback reply.
    pub degraded: bool,
    pub usage: Usage,
}

/// Reachability of each collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub completion: bool,
    /// True when caching is disabled.
    pub cache: bool,
    pub store: bool,
}

impl HealthReport {
    pub fn all_ok(&self) -> bool {
        self.completion && self.cache && self.store
    }
}

// ── Settings ──────────────────────────────────────────────────────────────

/// Static per-request knobs.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub default_model: String,
    /// Model used once the daily budget is exhausted.
    pub budget_model: String,
    pub system_prompt: String,
    pub params: GenerationParams,
    /// Reply length cap once the daily budget is exhausted.
    pub degraded_max_tokens: u32,
    pub fallback_reply: String,
    /// Bound on each conversation-store operation.
    pub store_timeout: Duration,
}

impl ChatSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_model: config.default_model.clone(),
            budget_model: config.budget_model.clone(),
            system_prompt: config.system_prompt.clone(),
            params: config.generation,
            degraded_max_tokens: config.telemetry.degraded_max_tokens,
            fallback_reply: config.retry.fallback_reply.clone(),
            store_timeout: Duration::from_millis(config.store.timeout_ms),
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

// ── Service ───────────────────────────────────────────────────────────────

/// Orchestrates one chat exchange. Cheap to share behind an `Arc`.
pub struct ChatService {
    provider: Arc<dyn Provider>,
    cache: Option<ResponseCache>,
    store: Arc<dyn ConversationStore>,
    tracker: Arc<CostTracker>,
    assembler: ContextAssembler,
    summarizer: HistorySummarizer,
    locks: ConversationLocks,
    settings: ChatSettings,
}

impl ChatService {
    /// A service with no cache and default assembly settings.
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Arc<dyn ConversationStore>,
        tracker: Arc<CostTracker>,
        settings: ChatSettings,
    ) -> Self {
        let budget = TokenBudget::new(
            TokenBudget::default().total,
            settings.params.max_tokens as usize,
        );
        Self {
            provider,
            cache: None,
            store,
            tracker,
            assembler: ContextAssembler::new(budget),
            summarizer: HistorySummarizer::default(),
            locks: ConversationLocks::new(),
            settings,
        }
    }

    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_summarizer(mut self, summarizer: HistorySummarizer) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Wire every collaborator from configuration.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let provider = build_provider(config)?;
        let store = build_store(config).await?;
        let tracker = Arc::new(build_tracker(config)?);

        let topics = if config.summarizer.topics.is_empty() {
            TopicTable::banking()
        } else {
            TopicTable::new(
                config
                    .summarizer
                    .topics
                    .iter()
                    .map(|t| (t.name.clone(), t.keywords.clone())),
            )
        };
        let summarizer =
            HistorySummarizer::new(config.summarizer.keep_recent, config.summarizer.trigger_turns)
                .with_topics(topics);
        let assembler = ContextAssembler::new(TokenBudget::new(
            config.context.total_tokens,
            config.generation.max_tokens as usize,
        ))
        .with_summarizer(summarizer.clone());

        let mut service = Self::new(provider, store, tracker, ChatSettings::from_config(config))
            .with_assembler(assembler)
            .with_summarizer(summarizer);

        if config.cache.enabled {
            let kv = Arc::new(InMemoryKeyValueStore::new(config.cache.max_entries));
            service = service.with_cache(
                ResponseCache::new(kv)
                    .with_ttl(Duration::from_secs(config.cache.ttl_secs))
                    .with_op_timeout(Duration::from_millis(config.cache.timeout_ms)),
            );
        }

        info!(
            provider = %service.provider.name(),
            model = %service.settings.default_model,
            store = %service.store.name(),
            cache = service.cache.as_ref().map(|c| c.backend()).unwrap_or("disabled"),
            "Chat service ready"
        );
        Ok(service)
    }

    pub fn tracker(&self) -> &Arc<CostTracker> {
        &self.tracker
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Handle one message.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatReply> {
        let ChatRequest {
            message,
            conversation_id,
        } = request;

        let _guard = self.locks.acquire(&conversation_id).await;

        let cache = self
            .cache
            .as_ref()
            .zip(CacheKey::scoped(&conversation_id, &message));
        if let Some((cache, key)) = &cache {
            if let Some(hit) = cache.get(key).await {
                info!(conversation = %conversation_id, "Reply served from cache");
                return Ok(ChatReply {
                    response: hit.text,
                    conversation_id,
                    cached: true,
                    degraded: false,
                    usage: hit.usage,
                });
            }
        }

        let history = match self.bounded(self.store.load(&conversation_id)).await {
            Ok(turns) => turns,
            Err(e) => {
                warn!(conversation = %conversation_id, error = %e, "History load failed, continuing without history");
                Vec::new()
            }
        };
        let history = self.summarizer.summarize(&history);
        let assembled = self.assembler.assemble(&AssemblyInput {
            system_prompt: &self.settings.system_prompt,
            history: &history,
            user_message: &message,
        });
        if assembled.metadata.over_budget {
            warn!(
                conversation = %conversation_id,
                tokens = assembled.metadata.total_tokens,
                budget = assembled.metadata.budget,
                "System prompt and message alone exceed the context budget"
            );
        }

        let degraded = self.tracker.is_degraded();
        let (model, params) = self.shape(degraded);
        let request = ProviderRequest {
            model: model.clone(),
            messages: assembled.messages,
            params,
        };

        match self.provider.complete(request).await {
            Ok(response) => {
                let priced_as = if response.model.is_empty() {
                    model.as_str()
                } else {
                    response.model.as_str()
                };
                let recorded = self.tracker.record(&response.usage, priced_as);
                debug!(
                    conversation = %conversation_id,
                    cost_usd = recorded.record.cost_usd,
                    alerts = recorded.alerts.len(),
                    "Recorded usage"
                );

                if let (Some((cache, key)), false) = (&cache, degraded) {
                    cache
                        .set(key, &CachedResponse::fresh(&response.text, response.usage))
                        .await;
                }

                let turns = [Turn::user(message), Turn::assistant(&response.text)];
                if let Err(e) = self
                    .bounded(self.store.append(&conversation_id, &turns))
                    .await
                {
                    warn!(conversation = %conversation_id, error = %e, "Failed to persist turns");
                }

                info!(
                    conversation = %conversation_id,
                    model = %priced_as,
                    prompt_tokens = response.usage.prompt_tokens,
                    completion_tokens = response.usage.completion_tokens,
                    degraded,
                    "Chat completed"
                );
                Ok(ChatReply {
                    response: response.text,
                    conversation_id,
                    cached: false,
                    degraded,
                    usage: response.usage,
                })
            }
            Err(e) if e.is_retryable() => {
                warn!(
                    conversation = %conversation_id,
                    kind = e.kind(),
                    error = %e,
                    "Upstream unavailable after retries, serving fallback reply"
                );
                Ok(ChatReply {
                    response: self.settings.fallback_reply.clone(),
                    conversation_id,
                    cached: false,
                    degraded: true,
                    usage: Usage::default(),
                })
            }
            Err(e) => {
                if let ProviderError::MalformedResponse(reason) = &e {
                    error!(
                        conversation = %conversation_id,
                        model = %model,
                        user_message = %message,
                        reason = %reason,
                        "Malformed completion response"
                    );
                }
                Err(Error::Provider(e))
            }
        }
    }

    /// A conversation rebuilt from its stored turns.
    pub async fn conversation(&self, id: &ConversationId) -> Result<Conversation> {
        let turns = self.bounded(self.store.load(id)).await?;
        Ok(Conversation::from_turns(id.clone(), turns))
    }

    /// Explicitly clear a conversation. Returns the number of turns removed.
    pub async fn reset(&self, id: &ConversationId) -> Result<usize> {
        let _guard = self.locks.acquire(id).await;
        let removed = self.bounded(self.store.reset(id)).await?;
        info!(conversation = %id, removed, "Conversation reset");
        Ok(removed)
    }

    pub fn usage(&self) -> UsageSnapshot {
        self.tracker.snapshot()
    }

    /// Probe the completion endpoint, cache and store concurrently.
    pub async fn health(&self) -> HealthReport {
        let cache = async {
            match &self.cache {
                Some(cache) => cache.ping().await,
                None => true,
            }
        };
        let store = async {
            tokio::time::timeout(self.settings.store_timeout, self.store.ping())
                .await
                .unwrap_or(false)
        };
        let (completion, cache, store) = tokio::join!(self.provider.health_check(), cache, store);
        HealthReport {
            completion,
            cache,
            store,
        }
    }

    fn shape(&self, degraded: bool) -> (String, GenerationParams) {
        if !degraded {
            return (self.settings.default_model.clone(), self.settings.params);
        }
        let params = GenerationParams {
            max_tokens: self
                .settings
                .params
                .max_tokens
                .min(self.settings.degraded_max_tokens),
            ..self.settings.params
        };
        debug!(
            model = %self.settings.budget_model,
            max_tokens = params.max_tokens,
            "Daily budget exhausted, shaping request"
        );
        (self.settings.budget_model.clone(), params)
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = std::result::Result<T, StoreError>>,
    ) -> std::result::Result<T, StoreError> {
        let limit = self.settings.store_timeout;
        tokio::time::timeout(limit, op)
            .await
            .unwrap_or(Err(StoreError::Timeout(limit.as_millis() as u64)))
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────

fn build_provider(config: &AppConfig) -> Result<Arc<dyn Provider>> {
    if !config.has_api_key() {
        warn!(base_url = %config.base_url, "No API key configured; requests will be sent unauthenticated");
    }
    let inner = OpenAiCompatProvider::new(
        config.provider.clone(),
        config.base_url.clone(),
        config.api_key.clone().unwrap_or_default(),
    )?
    .with_timeout(Duration::from_secs(config.request_timeout_secs));

    let retry = RetryConfig {
        max_retries: config.retry.max_retries,
        initial_delay_ms: config.retry.initial_delay_ms,
        max_delay_ms: config.retry.max_delay_ms,
        multiplier: config.retry.multiplier,
    };
    Ok(Arc::new(RetryingProvider::new(Arc::new(inner), retry)))
}

async fn build_store(config: &AppConfig) -> Result<Arc<dyn ConversationStore>> {
    match config.store.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryConversationStore::new())),
        "none" => Ok(Arc::new(NoopConversationStore)),
        _ => {
            let path = config.store_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Storage(format!("creating {}: {e}", parent.display()))
                })?;
            }
            let store = tellerbot_memory::SqliteConversationStore::new(&path.to_string_lossy()).await?;
            Ok(Arc::new(store))
        }
    }
}

fn build_tracker(config: &AppConfig) -> Result<CostTracker> {
    let pricing = PricingTable::with_defaults();
    for (model, price) in &config.telemetry.pricing {
        pricing
            .set(
                model.clone(),
                ModelPricing::new(price.input_per_1k, price.output_per_1k),
            )
            .map_err(|e| Error::Config {
                message: e.to_string(),
            })?;
    }
    Ok(CostTracker::new(pricing)
        .with_daily_budget(config.telemetry.daily_budget_usd)
        .with_thresholds(config.telemetry.alert_thresholds.clone())
        .with_utc_offset_minutes(config.telemetry.utc_offset_minutes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tellerbot_core::provider::ProviderResponse;
    use tellerbot_core::Role;

    /// Replays queued results and records every request it sees.
    struct ScriptedProvider {
        script: Mutex<VecDeque<std::result::Result<ProviderResponse, ProviderError>>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(
            script: impl IntoIterator<Item = std::result::Result<ProviderResponse, ProviderError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<ProviderRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::UpstreamUnavailable("script empty".into())))
        }
    }

    fn reply(text: &str) -> std::result::Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            text: text.into(),
            usage: Usage::new(100, 20),
            model: "gpt-3.5-turbo".into(),
        })
    }

    struct Harness {
        service: ChatService,
        provider: Arc<ScriptedProvider>,
        store: Arc<InMemoryConversationStore>,
    }

    fn harness(
        script: impl IntoIterator<Item = std::result::Result<ProviderResponse, ProviderError>>,
        tracker: CostTracker,
    ) -> Harness {
        let provider = ScriptedProvider::new(script);
        let store = Arc::new(InMemoryConversationStore::new());
        let service = ChatService::new(
            provider.clone(),
            store.clone(),
            Arc::new(tracker),
            ChatSettings::default(),
        )
        .with_cache(ResponseCache::new(Arc::new(InMemoryKeyValueStore::new(100))));
        Harness {
            service,
            provider,
            store,
        }
    }

    fn request(message: &str, conversation: &str) -> ChatRequest {
        ChatRequest::parse(message, Some(conversation), 1000).unwrap()
    }

    // ── Validation ────────────────────────────────────────────────────

    #[test]
    fn parse_trims_and_validates() {
        let r = ChatRequest::parse("  What is APR?  ", Some("c1"), 1000).unwrap();
        assert_eq!(r.message, "What is APR?");
        assert_eq!(r.conversation_id.as_str(), "c1");

        assert_eq!(
            ChatRequest::parse("   ", None, 1000),
            Err(ValidationError::EmptyMessage)
        );
        assert_eq!(
            ChatRequest::parse(&"a".repeat(1001), None, 1000),
            Err(ValidationError::MessageTooLong {
                length: 1001,
                max: 1000
            })
        );
        assert!(matches!(
            ChatRequest::parse("hi", Some("bad id!"), 1000),
            Err(ValidationError::InvalidConversationId(_))
        ));
    }

    #[test]
    fn parse_generates_id_when_absent_or_blank() {
        let a = ChatRequest::parse("hi", None, 1000).unwrap();
        let b = ChatRequest::parse("hi", Some(""), 1000).unwrap();
        assert!(!a.conversation_id.as_str().is_empty());
        assert_ne!(a.conversation_id, b.conversation_id);
    }

    #[test]
    fn length_counts_characters() {
        // 1000 two-byte characters is within a 1000-character limit
        assert!(ChatRequest::parse(&"é".repeat(1000), None, 1000).is_ok());
    }

    // ── Flow ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn first_call_completes_and_persists() {
        let h = harness([reply("A CD locks in a rate.")], CostTracker::default());
        let out = h.service.chat(request("What is a CD?", "c1")).await.unwrap();

        assert_eq!(out.response, "A CD locks in a rate.");
        assert!(!out.cached);
        assert!(!out.degraded);
        assert_eq!(out.usage, Usage::new(100, 20));

        let sent = h.provider.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].model, "gpt-3.5-turbo");
        assert_eq!(sent[0].messages[0].role(), Role::System);
        assert_eq!(sent[0].messages.last().unwrap().content(), "What is a CD?");

        let stored = h.store.load(&out.conversation_id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].role(), Role::User);
        assert_eq!(stored[1].content(), "A CD locks in a rate.");

        assert_eq!(h.service.usage().requests, 1);
    }

    #[tokio::test]
    async fn repeated_question_served_from_cache() {
        let h = harness([reply("About 4%.")], CostTracker::default());
        h.service
            .chat(request("What's my Savings rate?", "c1"))
            .await
            .unwrap();
        let second = h
            .service
            .chat(request("whats my savings rate", "c1"))
            .await
            .unwrap();

        assert!(second.cached);
        assert_eq!(second.response, "About 4%.");
        assert_eq!(h.provider.requests().len(), 1);
        // cache hits do not extend the history
        assert_eq!(h.store.load(&second.conversation_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cache_is_scoped_per_conversation() {
        let h = harness([reply("one"), reply("two")], CostTracker::default());
        h.service.chat(request("hello", "c1")).await.unwrap();
        let other = h.service.chat(request("hello", "c2")).await.unwrap();
        assert!(!other.cached);
        assert_eq!(other.response, "two");
    }

    #[tokio::test]
    async fn distinct_non_latin_questions_are_not_conflated() {
        let h = harness([reply("rate"), reply("card")], CostTracker::default());
        h.service
            .chat(request("Какая ставка по вкладу?", "c1"))
            .await
            .unwrap();
        let second = h
            .service
            .chat(request("Как открыть кредитную карту?", "c1"))
            .await
            .unwrap();

        assert!(!second.cached);
        assert_eq!(second.response, "card");
        assert_eq!(h.provider.requests().len(), 2);
    }

    #[tokio::test]
    async fn punctuation_only_messages_bypass_the_cache() {
        let h = harness([reply("one"), reply("two")], CostTracker::default());
        h.service.chat(request("?", "c1")).await.unwrap();
        let second = h.service.chat(request("!!", "c1")).await.unwrap();
        assert!(!second.cached);
        assert_eq!(second.response, "two");
    }

    #[tokio::test]
    async fn history_sent_on_follow_up() {
        let h = harness([reply("first"), reply("second")], CostTracker::default());
        h.service.chat(request("question one", "c1")).await.unwrap();
        h.service.chat(request("question two", "c1")).await.unwrap();

        let sent = h.provider.requests();
        let contents: Vec<&str> = sent[1].messages.iter().map(|t| t.content()).collect();
        assert_eq!(contents.len(), 4);
        assert_eq!(&contents[1..], ["question one", "first", "question two"]);
    }

    #[tokio::test]
    async fn exhausted_transient_failure_returns_fallback() {
        let h = harness(
            [Err(ProviderError::UpstreamError {
                status: 500,
                message: "boom".into(),
            })],
            CostTracker::default(),
        );
        let out = h.service.chat(request("What is APR?", "c1")).await.unwrap();

        assert!(out.degraded);
        assert_eq!(out.response, ChatSettings::default().fallback_reply);
        assert_eq!(out.usage, Usage::default());
        // nothing persisted or billed
        assert!(h.store.load(&out.conversation_id).await.unwrap().is_empty());
        assert_eq!(h.service.usage().requests, 0);
    }

    #[tokio::test]
    async fn rejection_surfaces_as_error() {
        let h = harness(
            [Err(ProviderError::UpstreamRejected {
                status: 401,
                message: "bad key".into(),
            })],
            CostTracker::default(),
        );
        let err = h.service.chat(request("hi", "c1")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::UpstreamRejected { status: 401, .. })
        ));
    }

    #[tokio::test]
    async fn malformed_response_surfaces_as_error() {
        let h = harness(
            [Err(ProviderError::MalformedResponse("no choices".into()))],
            CostTracker::default(),
        );
        let err = h.service.chat(request("hi", "c1")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn exhausted_budget_shapes_request() {
        let tracker = CostTracker::new(PricingTable::with_defaults()).with_daily_budget(0.001);
        tracker.record(&Usage::new(1000, 1000), "gpt-3.5-turbo");
        assert!(tracker.is_degraded());

        let mut settings = ChatSettings::default();
        settings.default_model = "gpt-4".into();
        settings.budget_model = "gpt-3.5-turbo".into();
        let provider = ScriptedProvider::new([reply("short answer")]);
        let service = ChatService::new(
            provider.clone(),
            Arc::new(InMemoryConversationStore::new()),
            Arc::new(tracker),
            settings,
        )
        .with_cache(ResponseCache::new(Arc::new(InMemoryKeyValueStore::new(10))));

        let out = service.chat(request("Plan my budget", "c1")).await.unwrap();
        assert!(out.degraded);

        let sent = provider.requests();
        assert_eq!(sent[0].model, "gpt-3.5-turbo");
        assert_eq!(sent[0].params.max_tokens, 150);

        // degraded replies are not cached
        let again = service.chat(request("Plan my budget", "c1")).await.unwrap();
        assert!(!again.cached);
    }

    #[tokio::test]
    async fn reset_clears_history() {
        let h = harness([reply("hi")], CostTracker::default());
        let out = h.service.chat(request("hello", "c1")).await.unwrap();

        let conversation = h.service.conversation(&out.conversation_id).await.unwrap();
        assert_eq!(conversation.id, out.conversation_id);
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.turns()[1].content(), "hi");
        assert!(conversation.updated_at >= conversation.created_at);

        assert_eq!(h.service.reset(&out.conversation_id).await.unwrap(), 2);
        assert!(h.service.conversation(&out.conversation_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_messages_in_one_conversation_both_persist() {
        let h = harness([reply("a"), reply("b")], CostTracker::default());
        let service = Arc::new(h.service);
        let (x, y) = tokio::join!(
            service.chat(request("first question", "c1")),
            service.chat(request("second question", "c1")),
        );
        x.unwrap();
        y.unwrap();

        let stored = h.store.load(&ConversationId::parse("c1").unwrap()).await.unwrap();
        assert_eq!(stored.len(), 4);
        // turns stay paired
        assert_eq!(stored[0].role(), Role::User);
        assert_eq!(stored[1].role(), Role::Assistant);
        assert_eq!(stored[2].role(), Role::User);
        assert_eq!(stored[3].role(), Role::Assistant);
    }

    #[tokio::test]
    async fn health_reports_each_dependency() {
        let h = harness([], CostTracker::default());
        let report = h.service.health().await;
        assert!(report.completion);
        assert!(report.cache);
        assert!(report.store);
        assert!(report.all_ok());
    }

    #[tokio::test]
    async fn from_config_wires_memory_backends() {
        let mut config = AppConfig::default();
        config.store.backend = "memory".into();
        config.api_key = Some("sk-test".into());
        let service = ChatService::from_config(&config).await.unwrap();
        assert_eq!(service.settings().default_model, "gpt-3.5-turbo");
        assert_eq!(service.tracker().daily_budget_usd(), 10.0);
    }
}
