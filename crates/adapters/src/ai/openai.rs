// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OpenAI adapters: a CLI-session stand-in (always declines) and the
//! hosted Chat Completions API.
//!
//! Grounded on `ai_client.py`'s `_call_openai_cli`/`_call_openai` and
//! `_is_openai_cli_logged_in`/`_has_openai_api_key`.

use super::{AiProvider, AiResponse, FixRequest, ProviderAdapter};
use async_trait::async_trait;

const OPENAI_CLI_MODEL: &str = "gpt-4-turbo-preview";
const OPENAI_API_MODEL: &str = "gpt-4-turbo";

/// $10 per 1M input tokens, $30 per 1M output tokens.
pub(super) fn estimate_openai_cost(input_tokens: u64, output_tokens: u64) -> f64 {
    input_tokens as f64 * 0.000_010 + output_tokens as f64 * 0.000_030
}

fn which(binary: &str) -> bool {
    std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).any(|dir| dir.join(binary).is_file()))
        .unwrap_or(false)
}

/// The original never wires this up for automated calls; an
/// interactive CLI session can't be scripted headlessly. Kept as a
/// provider so the fallback chain and status dashboard both account
/// for it the same way the original does.
pub struct OpenAiCliAdapter;

#[async_trait]
impl ProviderAdapter for OpenAiCliAdapter {
    fn provider(&self) -> AiProvider {
        AiProvider::OpenaiCli
    }

    fn is_available(&self) -> bool {
        which("openai")
    }

    fn model_for(&self, _preferred_model: Option<&str>) -> String {
        OPENAI_CLI_MODEL.to_string()
    }

    async fn call(&self, _prompt: &str, _request: &FixRequest, _model_override: Option<&str>) -> AiResponse {
        if !which("openai") {
            return AiResponse::failure(AiProvider::OpenaiCli, OPENAI_CLI_MODEL, "OpenAI CLI not found");
        }
        AiResponse::failure(
            AiProvider::OpenaiCli,
            OPENAI_CLI_MODEL,
            "OpenAI CLI not configured for automated calls",
        )
    }
}

/// Calls the hosted OpenAI Chat Completions API.
pub struct OpenAiApiAdapter {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiApiAdapter {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiApiAdapter {
    fn provider(&self) -> AiProvider {
        AiProvider::Openai
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn model_for(&self, _preferred_model: Option<&str>) -> String {
        OPENAI_API_MODEL.to_string()
    }

    async fn call(&self, prompt: &str, _request: &FixRequest, _model_override: Option<&str>) -> AiResponse {
        let Some(api_key) = &self.api_key else {
            return AiResponse::failure(AiProvider::Openai, OPENAI_API_MODEL, "no OpenAI API key found");
        };

        let body = serde_json::json!({
            "model": "gpt-4-turbo-preview",
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": 4000,
            "temperature": 0.1,
        });

        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => return AiResponse::failure(AiProvider::Openai, OPENAI_API_MODEL, format!("OpenAI API error: {e}")),
        };
        if !resp.status().is_success() {
            let status = resp.status();
            return AiResponse::failure(AiProvider::Openai, OPENAI_API_MODEL, format!("OpenAI API error: HTTP {status}"));
        }

        let parsed: serde_json::Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => return AiResponse::failure(AiProvider::Openai, OPENAI_API_MODEL, format!("OpenAI API error: {e}")),
        };

        let content = parsed["choices"][0]["message"]["content"].as_str().unwrap_or("").to_string();
        let prompt_tokens = parsed["usage"]["prompt_tokens"].as_u64().unwrap_or(0);
        let completion_tokens = parsed["usage"]["completion_tokens"].as_u64().unwrap_or(0);
        let total_tokens = parsed["usage"]["total_tokens"].as_u64().unwrap_or(prompt_tokens + completion_tokens);

        AiResponse {
            content,
            provider: AiProvider::Openai,
            model: OPENAI_API_MODEL.to_string(),
            success: true,
            error: None,
            tokens_used: Some(total_tokens),
            cost_usd: Some(estimate_openai_cost(prompt_tokens, completion_tokens)),
        }
    }
}
