// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake provider adapter for engine-side tests: scripted availability
//! and a fixed response, with every call recorded for assertions.

use super::{AiProvider, AiResponse, FixRequest, ProviderAdapter};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FakeProviderCall {
    pub prompt: String,
    pub ticket_id: String,
}

pub struct FakeProviderAdapter {
    provider: AiProvider,
    available: bool,
    response: AiResponse,
    calls: Arc<Mutex<Vec<FakeProviderCall>>>,
}

impl FakeProviderAdapter {
    pub fn new(provider: AiProvider, available: bool, response: AiResponse) -> Self {
        Self {
            provider,
            available,
            response,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<FakeProviderCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ProviderAdapter for FakeProviderAdapter {
    fn provider(&self) -> AiProvider {
        self.provider
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn model_for(&self, _preferred_model: Option<&str>) -> String {
        self.response.model.clone()
    }

    async fn call(&self, prompt: &str, request: &FixRequest, _model_override: Option<&str>) -> AiResponse {
        self.calls.lock().push(FakeProviderCall {
            prompt: prompt.to_string(),
            ticket_id: request.id.clone(),
        });
        self.response.clone()
    }
}
