// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude adapters: a local `claude` CLI call and the hosted Anthropic API.
//!
//! Grounded on `ai_client.py`'s `_call_claude_local`/`_call_claude_api`
//! and `_is_claude_local_available`/`_has_claude_api_key`.

use super::{AiProvider, AiResponse, FixRequest, ProviderAdapter};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const CLAUDE_LOCAL_MODEL: &str = "claude-3-sonnet";
const CLAUDE_API_MODEL: &str = "claude-3-5-sonnet-20241022";

/// $3 per 1M input tokens, $15 per 1M output tokens.
fn estimate_claude_cost(input_tokens: u64, output_tokens: u64) -> f64 {
    input_tokens as f64 * 0.000_003 + output_tokens as f64 * 0.000_015
}

/// Calls the local `claude` CLI non-interactively via stdin/stdout.
pub struct ClaudeLocalAdapter {
    timeout: Duration,
}

impl ClaudeLocalAdapter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProviderAdapter for ClaudeLocalAdapter {
    fn provider(&self) -> AiProvider {
        AiProvider::ClaudeLocal
    }

    fn is_available(&self) -> bool {
        // Binary presence is a cheap synchronous stand-in for the
        // original's `claude --version` probe; an unavailable CLI still
        // fails safely inside `call` if this is ever wrong.
        which_claude().is_some()
    }

    fn model_for(&self, _preferred_model: Option<&str>) -> String {
        CLAUDE_LOCAL_MODEL.to_string()
    }

    async fn call(&self, prompt: &str, _request: &FixRequest, _model_override: Option<&str>) -> AiResponse {
        let mut child = match Command::new("claude")
            .arg("--no-stream")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return AiResponse::failure(
                    AiProvider::ClaudeLocal,
                    CLAUDE_LOCAL_MODEL,
                    format!("claude CLI not found: {e}"),
                )
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                return AiResponse::failure(
                    AiProvider::ClaudeLocal,
                    CLAUDE_LOCAL_MODEL,
                    format!("failed to write prompt: {e}"),
                );
            }
        }

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => AiResponse {
                content: String::from_utf8_lossy(&output.stdout).trim().to_string(),
                provider: AiProvider::ClaudeLocal,
                model: CLAUDE_LOCAL_MODEL.to_string(),
                success: true,
                error: None,
                tokens_used: None,
                cost_usd: None,
            },
            Ok(Ok(output)) => AiResponse::failure(
                AiProvider::ClaudeLocal,
                CLAUDE_LOCAL_MODEL,
                format!("claude CLI failed: {}", String::from_utf8_lossy(&output.stderr)),
            ),
            Ok(Err(e)) => AiResponse::failure(
                AiProvider::ClaudeLocal,
                CLAUDE_LOCAL_MODEL,
                format!("claude CLI error: {e}"),
            ),
            Err(_) => AiResponse::failure(AiProvider::ClaudeLocal, CLAUDE_LOCAL_MODEL, "claude CLI timeout"),
        }
    }
}

fn which_claude() -> Option<std::path::PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join("claude"))
        .find(|candidate| candidate.is_file())
}

/// Calls the hosted Anthropic Messages API.
pub struct ClaudeApiAdapter {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ClaudeApiAdapter {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for ClaudeApiAdapter {
    fn provider(&self) -> AiProvider {
        AiProvider::ClaudeApi
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn model_for(&self, _preferred_model: Option<&str>) -> String {
        CLAUDE_API_MODEL.to_string()
    }

    async fn call(&self, prompt: &str, _request: &FixRequest, _model_override: Option<&str>) -> AiResponse {
        let Some(api_key) = &self.api_key else {
            return AiResponse::failure(AiProvider::ClaudeApi, CLAUDE_API_MODEL, "no Anthropic API key found");
        };

        let body = serde_json::json!({
            "model": CLAUDE_API_MODEL,
            "max_tokens": 4000,
            "messages": [{"role": "user", "content": prompt}],
        });

        let resp = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                return AiResponse::failure(AiProvider::ClaudeApi, CLAUDE_API_MODEL, format!("Anthropic API error: {e}"))
            }
        };
        if !resp.status().is_success() {
            let status = resp.status();
            return AiResponse::failure(
                AiProvider::ClaudeApi,
                CLAUDE_API_MODEL,
                format!("Anthropic API error: HTTP {status}"),
            );
        }

        let parsed: serde_json::Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                return AiResponse::failure(AiProvider::ClaudeApi, CLAUDE_API_MODEL, format!("Anthropic API error: {e}"))
            }
        };

        let content = parsed["content"][0]["text"].as_str().unwrap_or("").to_string();
        let input_tokens = parsed["usage"]["input_tokens"].as_u64().unwrap_or(0);
        let output_tokens = parsed["usage"]["output_tokens"].as_u64().unwrap_or(0);

        AiResponse {
            content,
            provider: AiProvider::ClaudeApi,
            model: CLAUDE_API_MODEL.to_string(),
            success: true,
            error: None,
            tokens_used: Some(input_tokens + output_tokens),
            cost_usd: Some(estimate_claude_cost(input_tokens, output_tokens)),
        }
    }
}
