// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local Ollama adapter, free of charge.
//!
//! Grounded on `ai_client.py`'s `_call_ollama`/`_is_ollama_available`.

use super::{AiProvider, AiResponse, FixRequest, ProviderAdapter};
use async_trait::async_trait;
use std::time::Duration;

const OLLAMA_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaAdapter {
    model: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl OllamaAdapter {
    pub fn new(model: String, timeout: Duration) -> Self {
        Self {
            model,
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn provider(&self) -> AiProvider {
        AiProvider::Ollama
    }

    fn is_available(&self) -> bool {
        // A real probe is a blocking network round trip; `call` itself
        // fails cleanly if the daemon turns out not to be running, so
        // this is treated as "configured" rather than "reachable now".
        true
    }

    fn model_for(&self, _preferred_model: Option<&str>) -> String {
        self.model.clone()
    }

    async fn call(&self, prompt: &str, _request: &FixRequest, _model_override: Option<&str>) -> AiResponse {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let resp = self
            .client
            .post(format!("{OLLAMA_BASE_URL}/api/generate"))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => return AiResponse::failure(AiProvider::Ollama, &self.model, format!("Ollama error: {e}")),
        };
        if !resp.status().is_success() {
            let status = resp.status();
            return AiResponse::failure(AiProvider::Ollama, &self.model, format!("Ollama HTTP {status}"));
        }

        let parsed: serde_json::Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => return AiResponse::failure(AiProvider::Ollama, &self.model, format!("Ollama error: {e}")),
        };

        AiResponse {
            content: parsed["response"].as_str().unwrap_or("").to_string(),
            provider: AiProvider::Ollama,
            model: self.model.clone(),
            success: true,
            error: None,
            tokens_used: None,
            cost_usd: Some(0.0),
        }
    }
}

/// Checks `GET /api/tags`, matching `_is_ollama_available`. Callers
/// that want an up-to-date availability signal (rather than the
/// always-true `ProviderAdapter::is_available`) should poll this
/// during a periodic health sweep.
pub async fn probe_ollama_available(client: &reqwest::Client) -> bool {
    client
        .get(format!("{OLLAMA_BASE_URL}/api/tags"))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .map(|r| r.status().is_success())
        .unwrap_or(false)
}
