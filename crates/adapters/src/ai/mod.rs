// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C11: AI provider adapters with a fallback chain.
//!
//! `AiClient::generate_fix` tries providers in order, wrapping every
//! call with a rate-limit gate and a bounded retry-with-backoff, and
//! never fails outright: the worst case is a `FreeAlternative` response
//! with every upstream error joined into one string.
//!
//! Grounded on the original `ai_client.py`'s `AIClient` (provider
//! ordering, per-call rate limiting, retry schedule, prompt template,
//! `get_status` dashboard payload) and structurally on this crate's
//! `AgentAdapter` (trait-per-capability, `thiserror` error enum,
//! `#[cfg(test, feature = "test-support")]` fake gating).

mod claude;
mod free_alternative;
mod ollama;
mod openai;

pub use claude::{ClaudeApiAdapter, ClaudeLocalAdapter};
pub use free_alternative::FreeAlternativeAdapter;
pub use ollama::OllamaAdapter;
pub use openai::{OpenAiApiAdapter, OpenAiCliAdapter};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeProviderAdapter, FakeProviderCall};

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Default free-tier model used when no provider/model is selected.
pub const DEFAULT_FREE_MODEL: &str = "mimo-flash-v2-free";
/// Model label for the strict OpenRouter Grok4 Fast selection.
pub const GROK4_FAST_MODEL: &str = "openrouter/grok-4o-fast";

/// Errors surfaced by the rate-limit gate a call is wrapped in.
#[derive(Debug, Error)]
pub enum AiAdapterError {
    #[error("rate limited: {0}")]
    RateLimited(String),
}

/// The providers a fix request can be routed to, in fixed probe order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AiProvider {
    ClaudeLocal,
    OpenaiCli,
    ClaudeApi,
    Openai,
    Ollama,
    FreeAlternative,
}

impl AiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiProvider::ClaudeLocal => "claude_local",
            AiProvider::OpenaiCli => "openai_cli",
            AiProvider::ClaudeApi => "claude_api",
            AiProvider::Openai => "openai",
            AiProvider::Ollama => "ollama",
            AiProvider::FreeAlternative => "free_alternative",
        }
    }

    /// Fixed probe order used to build the automatic fallback chain,
    /// free alternative excluded (it's always appended last).
    pub const PROBE_ORDER: [AiProvider; 5] = [
        AiProvider::ClaudeLocal,
        AiProvider::OpenaiCli,
        AiProvider::ClaudeApi,
        AiProvider::Openai,
        AiProvider::Ollama,
    ];
}

/// A ticket's fields relevant to prompting an AI provider for a fix.
#[derive(Debug, Clone, Default)]
pub struct FixRequest {
    pub id: String,
    pub priority: String,
    pub error_type: String,
    pub message: String,
    pub source: String,
    pub stack_trace: Option<String>,
}

/// Result of one provider call.
#[derive(Debug, Clone)]
pub struct AiResponse {
    pub content: String,
    pub provider: AiProvider,
    pub model: String,
    pub success: bool,
    pub error: Option<String>,
    pub tokens_used: Option<u64>,
    pub cost_usd: Option<f64>,
}

impl AiResponse {
    fn failure(provider: AiProvider, model: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            provider,
            model: model.into(),
            success: false,
            error: Some(error.into()),
            tokens_used: None,
            cost_usd: None,
        }
    }
}

/// One provider's implementation: availability probe plus the call itself.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> AiProvider;

    /// Cheap, synchronous probe: binary present, API key set, local
    /// daemon reachable. Never itself performs the real call.
    fn is_available(&self) -> bool;

    /// The model name this adapter would use for `prompt`, given an
    /// optional caller-preferred model override.
    fn model_for(&self, preferred_model: Option<&str>) -> String;

    /// `model_override` only affects providers whose model isn't fixed
    /// by the provider itself (currently just the free alternative).
    async fn call(&self, prompt: &str, request: &FixRequest, model_override: Option<&str>) -> AiResponse;
}

/// A resolved provider/model choice, e.g. from `ACTIFIX_AI_PROVIDER`.
#[derive(Debug, Clone)]
pub struct ProviderSelection {
    pub provider: Option<AiProvider>,
    pub model: Option<String>,
    pub strict_preferred: bool,
    pub label: String,
}

/// Resolve a raw provider/model pair (typically from config) into a
/// `ProviderSelection`. Unknown provider names fall back to `auto`.
pub fn resolve_provider_selection(
    provider_name: Option<&str>,
    model_name: Option<&str>,
) -> ProviderSelection {
    let normalized = provider_name.unwrap_or("").trim().to_lowercase();
    let model_value = model_name
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());

    if matches!(normalized.as_str(), "grok4_fast" | "grok4" | "openrouter_grok4_fast") {
        return ProviderSelection {
            provider: Some(AiProvider::FreeAlternative),
            model: Some(GROK4_FAST_MODEL.to_string()),
            strict_preferred: true,
            label: "openrouter_grok4_fast".to_string(),
        };
    }

    if normalized.is_empty()
        || matches!(
            normalized.as_str(),
            "default" | "free" | "free_alternative" | "mimo_flash_v2_free"
        )
        || normalized == DEFAULT_FREE_MODEL
    {
        return ProviderSelection {
            provider: Some(AiProvider::FreeAlternative),
            model: Some(DEFAULT_FREE_MODEL.to_string()),
            strict_preferred: true,
            label: DEFAULT_FREE_MODEL.to_string(),
        };
    }

    if matches!(normalized.as_str(), "auto" | "automatic") {
        return ProviderSelection {
            provider: None,
            model: model_value,
            strict_preferred: false,
            label: "auto".to_string(),
        };
    }

    let provider = match normalized.as_str() {
        "claude_local" => Some(AiProvider::ClaudeLocal),
        "claude_api" => Some(AiProvider::ClaudeApi),
        "openai_cli" => Some(AiProvider::OpenaiCli),
        "openai" => Some(AiProvider::Openai),
        "ollama" => Some(AiProvider::Ollama),
        _ => None,
    };

    match provider {
        Some(p) => ProviderSelection {
            provider: Some(p),
            model: model_value,
            strict_preferred: false,
            label: p.as_str().to_string(),
        },
        None => ProviderSelection {
            provider: None,
            model: model_value,
            strict_preferred: false,
            label: "auto".to_string(),
        },
    }
}

/// Build the ordered provider chain for a selection.
///
/// 1. Preferred provider first, if any.
/// 2. If `strict_preferred`, append only the free alternative and stop.
/// 3. Otherwise probe in `AiProvider::PROBE_ORDER` and append whichever
///    are available (skipping one already placed as preferred).
/// 4. Always end with the free alternative.
pub fn get_provider_order(
    preferred: Option<AiProvider>,
    strict_preferred: bool,
    is_available: impl Fn(AiProvider) -> bool,
) -> Vec<AiProvider> {
    let mut providers = Vec::new();

    if let Some(p) = preferred {
        providers.push(p);
    }

    if strict_preferred && preferred.is_some() {
        if preferred != Some(AiProvider::FreeAlternative) {
            providers.push(AiProvider::FreeAlternative);
        }
        return providers;
    }

    for candidate in AiProvider::PROBE_ORDER {
        if is_available(candidate) && !providers.contains(&candidate) {
            providers.push(candidate);
        }
    }

    if !providers.contains(&AiProvider::FreeAlternative) {
        providers.push(AiProvider::FreeAlternative);
    }

    providers
}

/// Render the prompt sent to every provider for a given fix request.
pub fn build_fix_prompt(request: &FixRequest) -> String {
    format!(
        "You are an expert software engineer helping to fix a bug in an \
         automated error tracking system.\n\n\
         TICKET INFORMATION:\n\
         - ID: {id}\n\
         - Priority: {priority}\n\
         - Error Type: {error_type}\n\
         - Message: {message}\n\
         - Source: {source}\n\
         - Stack Trace: {stack_trace}\n\n\
         TASK:\n\
         1. Analyze the error and identify the root cause\n\
         2. Provide a specific, actionable fix\n\
         3. Include any code changes needed\n\
         4. Explain why this fix will resolve the issue\n\
         5. Suggest any tests that should be added\n\n\
         RESPONSE FORMAT:\n\
         ## Analysis\n## Solution\n## Code Changes\n## Testing\n## Explanation\n",
        id = request.id,
        priority = request.priority,
        error_type = request.error_type,
        message = request.message,
        source = request.source,
        stack_trace = request.stack_trace.as_deref().unwrap_or("Not available"),
    )
}

/// Bridges to the engine's durable per-provider rate limiter without
/// this crate depending on `actifix-engine`. The daemon, which depends
/// on both crates, wraps `actifix_engine::RateLimiter` in a type that
/// implements this trait and hands it to `AiClient::new`.
pub trait RateLimitGate: Send + Sync {
    fn check(&self, provider: &str, now_ms: i64) -> Result<(), String>;
    fn record(
        &self,
        provider: &str,
        success: bool,
        tokens_used: Option<u64>,
        cost_usd: Option<f64>,
        error: Option<String>,
        now_ms: i64,
    );
}

/// A gate that never limits, for callers without a durable ledger
/// (tests, one-off CLI invocations).
pub struct NoRateLimit;

impl RateLimitGate for NoRateLimit {
    fn check(&self, _provider: &str, _now_ms: i64) -> Result<(), String> {
        Ok(())
    }

    fn record(
        &self,
        _provider: &str,
        _success: bool,
        _tokens_used: Option<u64>,
        _cost_usd: Option<f64>,
        _error: Option<String>,
        _now_ms: i64,
    ) {
    }
}

fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_millis(1000u64.saturating_mul(1u64 << attempt.min(20)))
}

/// Status payload for dashboard display: provider availability, the
/// active provider/model for a selection, and the ordered chain.
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    pub preferred_provider: String,
    pub preferred_model: String,
    pub active_provider: String,
    pub active_model: String,
    pub provider_order: Vec<String>,
    pub availability: HashMap<String, bool>,
}

/// Multi-provider AI client with rate-limited, retried fallback.
pub struct AiClient {
    adapters: HashMap<AiProvider, Box<dyn ProviderAdapter>>,
    rate_limiter: Box<dyn RateLimitGate>,
}

impl AiClient {
    pub fn new(adapters: Vec<Box<dyn ProviderAdapter>>, rate_limiter: Box<dyn RateLimitGate>) -> Self {
        let adapters = adapters.into_iter().map(|a| (a.provider(), a)).collect();
        Self { adapters, rate_limiter }
    }

    fn is_available(&self, provider: AiProvider) -> bool {
        self.adapters
            .get(&provider)
            .map(|a| a.is_available())
            .unwrap_or(false)
    }

    /// Try providers in fallback order, returning the first success or
    /// a composite failure joining every provider's last error.
    pub async fn generate_fix(
        &self,
        request: &FixRequest,
        selection: &ProviderSelection,
        max_retries: u32,
        now_ms: i64,
    ) -> AiResponse {
        let prompt = build_fix_prompt(request);
        let order = get_provider_order(selection.provider, selection.strict_preferred, |p| {
            self.is_available(p)
        });

        let mut all_errors = Vec::new();

        for provider in order {
            let Some(adapter) = self.adapters.get(&provider) else {
                continue;
            };

            for attempt in 0..max_retries.max(1) {
                if let Err(e) = self.rate_limiter.check(provider.as_str(), now_ms) {
                    all_errors.push(format!("{}: rate limited: {e}", provider.as_str()));
                    self.rate_limiter.record(
                        provider.as_str(),
                        false,
                        None,
                        None,
                        Some(format!("rate limit exceeded: {e}")),
                        now_ms,
                    );
                    break;
                }

                let response = adapter.call(&prompt, request, selection.model.as_deref()).await;

                self.rate_limiter.record(
                    provider.as_str(),
                    response.success,
                    response.tokens_used,
                    response.cost_usd,
                    response.error.clone().filter(|_| !response.success),
                    now_ms,
                );

                if response.success {
                    return response;
                }

                if let Some(err) = &response.error {
                    all_errors.push(format!("{}: {err}", provider.as_str()));
                }

                if attempt + 1 < max_retries {
                    tokio::time::sleep(retry_backoff(attempt)).await;
                }
            }
        }

        let last_error = if all_errors.is_empty() {
            "all AI providers failed".to_string()
        } else {
            all_errors.join("; ")
        };
        AiResponse::failure(
            AiProvider::FreeAlternative,
            "none",
            format!("all AI providers failed. Last error: {last_error}"),
        )
    }

    /// Availability/active-provider/active-model/chain report for a
    /// given selection, for dashboard display.
    pub fn get_status(&self, selection: &ProviderSelection) -> ProviderStatus {
        let order = get_provider_order(selection.provider, selection.strict_preferred, |p| {
            self.is_available(p)
        });

        let mut availability = HashMap::new();
        let mut active_provider = None;
        for provider in &order {
            let available = self.is_available(*provider);
            availability.insert(provider.as_str().to_string(), available);
            if active_provider.is_none() && available {
                active_provider = Some(*provider);
            }
        }
        let active_provider = active_provider.unwrap_or(AiProvider::FreeAlternative);

        let active_model = self
            .adapters
            .get(&active_provider)
            .map(|a| a.model_for(selection.model.as_deref()))
            .unwrap_or_else(|| selection.model.clone().unwrap_or(DEFAULT_FREE_MODEL.to_string()));

        ProviderStatus {
            preferred_provider: selection.label.clone(),
            preferred_model: selection.model.clone().unwrap_or_default(),
            active_provider: active_provider.as_str().to_string(),
            active_model,
            provider_order: order.iter().map(|p| p.as_str().to_string()).collect(),
            availability,
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
