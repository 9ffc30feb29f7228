use super::*;

fn response(provider: AiProvider, success: bool, error: Option<&str>) -> AiResponse {
    AiResponse {
        content: if success { "fixed it".to_string() } else { String::new() },
        provider,
        model: "test-model".to_string(),
        success,
        error: error.map(str::to_string),
        tokens_used: None,
        cost_usd: None,
    }
}

fn sample_request() -> FixRequest {
    FixRequest {
        id: "T-1".to_string(),
        priority: "P2".to_string(),
        error_type: "ValueError".to_string(),
        message: "bad input".to_string(),
        source: "app.py:10".to_string(),
        stack_trace: Some("Traceback...".to_string()),
    }
}

#[test]
fn resolve_provider_selection_empty_is_free_alternative() {
    let selection = resolve_provider_selection(None, None);
    assert_eq!(selection.provider, Some(AiProvider::FreeAlternative));
    assert!(selection.strict_preferred);
    assert_eq!(selection.model.as_deref(), Some(DEFAULT_FREE_MODEL));
}

#[test]
fn resolve_provider_selection_auto_has_no_fixed_provider() {
    let selection = resolve_provider_selection(Some("auto"), None);
    assert_eq!(selection.provider, None);
    assert!(!selection.strict_preferred);
}

#[test]
fn resolve_provider_selection_grok4_fast_is_strict_free_alternative() {
    let selection = resolve_provider_selection(Some("openrouter_grok4_fast"), None);
    assert_eq!(selection.provider, Some(AiProvider::FreeAlternative));
    assert_eq!(selection.model.as_deref(), Some(GROK4_FAST_MODEL));
    assert!(selection.strict_preferred);
}

#[test]
fn resolve_provider_selection_known_provider_name() {
    let selection = resolve_provider_selection(Some("ollama"), Some("llama3"));
    assert_eq!(selection.provider, Some(AiProvider::Ollama));
    assert_eq!(selection.model.as_deref(), Some("llama3"));
    assert!(!selection.strict_preferred);
}

#[test]
fn resolve_provider_selection_unknown_name_falls_back_to_auto() {
    let selection = resolve_provider_selection(Some("something-unheard-of"), None);
    assert_eq!(selection.provider, None);
    assert_eq!(selection.label, "auto");
}

#[test]
fn provider_order_strict_preferred_stops_after_free_alternative() {
    let order = get_provider_order(Some(AiProvider::Ollama), true, |_| true);
    assert_eq!(order, vec![AiProvider::Ollama, AiProvider::FreeAlternative]);
}

#[test]
fn provider_order_strict_preferred_free_alternative_itself_is_not_duplicated() {
    let order = get_provider_order(Some(AiProvider::FreeAlternative), true, |_| true);
    assert_eq!(order, vec![AiProvider::FreeAlternative]);
}

#[test]
fn provider_order_auto_probes_in_fixed_order_and_ends_with_free_alternative() {
    let order = get_provider_order(None, false, |p| {
        matches!(p, AiProvider::ClaudeApi | AiProvider::Ollama)
    });
    assert_eq!(order, vec![AiProvider::ClaudeApi, AiProvider::Ollama, AiProvider::FreeAlternative]);
}

#[test]
fn provider_order_preferred_is_not_duplicated_if_also_available() {
    let order = get_provider_order(Some(AiProvider::ClaudeLocal), false, |_| true);
    assert_eq!(order[0], AiProvider::ClaudeLocal);
    assert_eq!(order.iter().filter(|&&p| p == AiProvider::ClaudeLocal).count(), 1);
    assert_eq!(*order.last().unwrap(), AiProvider::FreeAlternative);
}

#[tokio::test]
async fn generate_fix_returns_first_success() {
    let ollama = FakeProviderAdapter::new(AiProvider::Ollama, true, response(AiProvider::Ollama, true, None));
    let free = FakeProviderAdapter::new(
        AiProvider::FreeAlternative,
        true,
        response(AiProvider::FreeAlternative, false, Some("should not be reached")),
    );
    let client = AiClient::new(vec![Box::new(ollama), Box::new(free)], Box::new(NoRateLimit));

    let selection = ProviderSelection {
        provider: Some(AiProvider::Ollama),
        model: None,
        strict_preferred: false,
        label: "ollama".to_string(),
    };
    let result = client.generate_fix(&sample_request(), &selection, 3, 0).await;
    assert!(result.success);
    assert_eq!(result.provider, AiProvider::Ollama);
}

#[tokio::test]
async fn generate_fix_falls_through_to_free_alternative_on_total_failure() {
    let claude = FakeProviderAdapter::new(
        AiProvider::ClaudeLocal,
        true,
        response(AiProvider::ClaudeLocal, false, Some("not logged in")),
    );
    let free = FakeProviderAdapter::new(
        AiProvider::FreeAlternative,
        true,
        response(AiProvider::FreeAlternative, false, Some("no key configured")),
    );
    let client = AiClient::new(vec![Box::new(claude), Box::new(free)], Box::new(NoRateLimit));

    let selection = ProviderSelection {
        provider: Some(AiProvider::ClaudeLocal),
        model: None,
        strict_preferred: true,
        label: "claude_local".to_string(),
    };
    let result = client.generate_fix(&sample_request(), &selection, 1, 0).await;
    assert!(!result.success);
    assert!(result.error.as_ref().unwrap().contains("not logged in"));
    assert!(result.error.as_ref().unwrap().contains("no key configured"));
}

#[tokio::test]
async fn get_status_reports_chain_and_active_provider() {
    let claude = FakeProviderAdapter::new(
        AiProvider::ClaudeLocal,
        false,
        response(AiProvider::ClaudeLocal, false, None),
    );
    let ollama = FakeProviderAdapter::new(AiProvider::Ollama, true, response(AiProvider::Ollama, true, None));
    let free = FakeProviderAdapter::new(AiProvider::FreeAlternative, true, response(AiProvider::FreeAlternative, true, None));
    let client = AiClient::new(vec![Box::new(claude), Box::new(ollama), Box::new(free)], Box::new(NoRateLimit));

    let selection = resolve_provider_selection(Some("auto"), None);
    let status = client.get_status(&selection);
    assert_eq!(status.active_provider, "ollama");
    assert!(status.provider_order.contains(&"free_alternative".to_string()));
    assert_eq!(status.availability.get("claude_local"), Some(&false));
}
