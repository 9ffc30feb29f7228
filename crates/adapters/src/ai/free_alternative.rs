// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Always-available last resort: an OpenRouter call when a model name
//! asks for it and a key is configured, otherwise a descriptive
//! failure.
//!
//! Grounded on `ai_client.py`'s `_call_free_alternative`/`_call_openrouter`.
//! The original's interactive terminal prompt (numbered menu asking a
//! human to pick a web UI or type a manual fix) has no headless-daemon
//! equivalent and is not ported; its non-interactive short-circuit
//! (`ACTIFIX_NONINTERACTIVE=1` / non-tty) is what this adapter always
//! takes, since a daemon process is never attached to a terminal.

use super::openai::estimate_openai_cost;
use super::{AiProvider, AiResponse, FixRequest, ProviderAdapter, DEFAULT_FREE_MODEL};
use async_trait::async_trait;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

pub struct FreeAlternativeAdapter {
    default_model: String,
    openrouter_api_key: Option<String>,
    client: reqwest::Client,
}

impl FreeAlternativeAdapter {
    pub fn new(default_model: impl Into<String>, openrouter_api_key: Option<String>) -> Self {
        Self {
            default_model: default_model.into(),
            openrouter_api_key,
            client: reqwest::Client::new(),
        }
    }

    async fn call_openrouter(&self, prompt: &str, model: &str) -> AiResponse {
        let Some(api_key) = &self.openrouter_api_key else {
            return AiResponse::failure(
                AiProvider::FreeAlternative,
                model,
                "OPENROUTER_API_KEY not set; falling back to manual prompt",
            );
        };

        let model_id = model.split_once('/').map(|(_, rest)| rest).unwrap_or(model);
        let body = serde_json::json!({
            "model": model_id,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": 4000,
            "temperature": 0.1,
        });

        let resp = self
            .client
            .post(format!("{OPENROUTER_BASE_URL}/chat/completions"))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                return AiResponse::failure(AiProvider::FreeAlternative, model, format!("OpenRouter API error: {e}"))
            }
        };
        if !resp.status().is_success() {
            let status = resp.status();
            return AiResponse::failure(
                AiProvider::FreeAlternative,
                model,
                format!("OpenRouter API error: HTTP {status}"),
            );
        }

        let parsed: serde_json::Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                return AiResponse::failure(AiProvider::FreeAlternative, model, format!("OpenRouter API error: {e}"))
            }
        };

        let content = parsed["choices"][0]["message"]["content"].as_str().unwrap_or("").to_string();
        let prompt_tokens = parsed["usage"]["prompt_tokens"].as_u64().unwrap_or(0);
        let completion_tokens = parsed["usage"]["completion_tokens"].as_u64().unwrap_or(0);

        AiResponse {
            content,
            provider: AiProvider::FreeAlternative,
            model: model.to_string(),
            success: true,
            error: None,
            tokens_used: Some(prompt_tokens + completion_tokens),
            cost_usd: Some(estimate_openai_cost(prompt_tokens, completion_tokens)),
        }
    }
}

#[async_trait]
impl ProviderAdapter for FreeAlternativeAdapter {
    fn provider(&self) -> AiProvider {
        AiProvider::FreeAlternative
    }

    fn is_available(&self) -> bool {
        true
    }

    fn model_for(&self, preferred_model: Option<&str>) -> String {
        preferred_model
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.default_model.clone())
    }

    async fn call(&self, prompt: &str, _request: &FixRequest, model_override: Option<&str>) -> AiResponse {
        let model = self.model_for(model_override);
        if model.to_lowercase().contains("openrouter") && self.openrouter_api_key.is_some() {
            return self.call_openrouter(prompt, &model).await;
        }
        AiResponse::failure(
            AiProvider::FreeAlternative,
            model,
            "non-interactive session: free alternative prompt disabled",
        )
    }
}

impl Default for FreeAlternativeAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_FREE_MODEL, None)
    }
}
