//! HTTP contract tests for the evidence source and the reasoning backends
//! using wiremock.

use pretty_assertions::assert_eq;
use quarry_core::config::{ProviderConfig, ProviderKind, SearchConfig, SharedConfig};
use quarry_core::error::{BackendError, ConfigError, QuarryError, SearchError};
use quarry_core::providers::{GeminiBackend, ResearchBackend, SearchAugmented, select_backend};
use quarry_core::research::{NoOpObserver, ResearchOrchestrator};
use quarry_core::search::{EvidenceSource, TavilySearch};
use quarry_core::types::{ResearchStep, Source, StepStatus};
use quarry_core::validator::ConfigValidator;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{
    body_partial_json, body_string_contains, header, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UNSET_ENV: &str = "QUARRY_HTTP_TEST_UNSET_TAVILY_KEY";

fn tavily(server: &MockServer) -> TavilySearch {
    TavilySearch::from_config(&SearchConfig {
        endpoint: format!("{}/search", server.uri()),
        api_key_env: UNSET_ENV.into(),
    })
    .unwrap()
}

fn tavily_body() -> serde_json::Value {
    json!({
        "query": "current AI tools in classrooms",
        "results": [
            {
                "url": "https://edtech.example/tools",
                "title": "Classroom AI tools",
                "content": "Adaptive tutoring systems are now common.",
                "score": 0.93
            },
            {
                "url": "https://unesco.example/report",
                "title": "UNESCO report",
                "content": "Guidance on generative AI in education.",
                "score": 0.88
            }
        ]
    })
}

fn openai_reply(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

fn minimax_reply(content: &str) -> serde_json::Value {
    let mut body = openai_reply(content);
    body["base_resp"] = json!({"status_code": 0, "status_msg": "success"});
    body
}

fn gemini_reply(text: &str, chunks: serde_json::Value) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP",
            "groundingMetadata": {"groundingChunks": chunks}
        }]
    })
}

// --- Evidence source ---

#[tokio::test]
async fn test_tavily_sends_credential_and_cap() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({
            "api_key": "tvly-test",
            "query": "current AI tools in classrooms",
            "max_results": 5,
            "search_depth": "basic"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(tavily_body()))
        .expect(1)
        .mount(&server)
        .await;

    let results = tavily(&server)
        .search("current AI tools in classrooms", 5, Some("tvly-test"))
        .await
        .unwrap();

    assert_eq!(results.hits.len(), 2);
    assert_eq!(
        results.citations,
        vec![
            Source::new("https://edtech.example/tools", "Classroom AI tools"),
            Source::new("https://unesco.example/report", "UNESCO report"),
        ]
    );
}

#[tokio::test]
async fn test_tavily_error_body_is_surfaced_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"detail":"Unauthorized"}"#))
        .mount(&server)
        .await;

    let err = tavily(&server).search("q", 5, Some("bad")).await.unwrap_err();

    match err {
        SearchError::Http { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, r#"{"detail":"Unauthorized"}"#);
        }
        other => panic!("Expected Http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_tavily_missing_credential_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tavily_body()))
        .expect(0)
        .mount(&server)
        .await;

    let err = tavily(&server).search("q", 5, None).await.unwrap_err();

    assert!(matches!(err, SearchError::MissingCredential { .. }));
}

// --- MiniMax ---

fn minimax_config(server: &MockServer) -> ProviderConfig {
    ProviderConfig::new(ProviderKind::MiniMax)
        .with_api_key("mm-key")
        .with_group_id("1789")
        .with_base_url(format!("{}/v1", server.uri()))
        .with_search_api_key("tvly-test")
}

#[tokio::test]
async fn test_minimax_step_searches_then_analyzes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tavily_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/text/chatcompletion_v2"))
        .and(query_param("GroupId", "1789"))
        .and(header("authorization", "Bearer mm-key"))
        .and(body_partial_json(json!({"model": "abab6.5s-chat"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(minimax_reply("Tutoring tools lead [1].")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let backend = SearchAugmented::minimax(Arc::new(tavily(&server))).unwrap();
    let outcome = backend
        .execute_research_step(&minimax_config(&server), "current AI tools in classrooms")
        .await
        .unwrap();

    assert_eq!(outcome.result, "Tutoring tools lead [1].");
    assert_eq!(outcome.sources.len(), 2);
    assert_eq!(outcome.sources[0].uri, "https://edtech.example/tools");
}

#[tokio::test]
async fn test_minimax_base_resp_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/text/chatcompletion_v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [],
            "base_resp": {"status_code": 1004, "status_msg": "authorized_error"}
        })))
        .mount(&server)
        .await;

    let backend = SearchAugmented::minimax(Arc::new(tavily(&server))).unwrap();
    let err = backend
        .generate_research_plan(&minimax_config(&server), "q")
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Request to MiniMax failed: status_code 1004: authorized_error"
    );
}

// --- Local OpenAI-compatible endpoint ---

fn local_config(server: &MockServer) -> ProviderConfig {
    ProviderConfig::new(ProviderKind::Local)
        .with_base_url(format!("{}/v1", server.uri()))
        .with_model("llama3.1:8b")
        .with_search_api_key("tvly-test")
}

#[tokio::test]
async fn test_local_plan_is_parsed_from_prose() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": "llama3.1:8b"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply(
            "Sure! Here you go:\n[{\"query\": \"a\"}, {\"query\": \"b\"}, {\"query\": \"c\"}]",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let backend = SearchAugmented::local(Arc::new(tavily(&server))).unwrap();
    let steps = backend
        .generate_research_plan(&local_config(&server), "q")
        .await
        .unwrap();

    let queries: Vec<&str> = steps.iter().map(|s| s.query.as_str()).collect();
    assert_eq!(queries, vec!["a", "b", "c"]);
    assert!(steps.iter().all(|s| s.status == StepStatus::Pending));
}

#[tokio::test]
async fn test_local_analysis_failure_returns_raw_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tavily_body()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .mount(&server)
        .await;

    let backend = SearchAugmented::local(Arc::new(tavily(&server))).unwrap();
    let outcome = backend
        .execute_research_step(&local_config(&server), "q")
        .await
        .unwrap();

    assert!(outcome.result.starts_with("[1] Classroom AI tools\n"));
    assert!(outcome.result.contains("\n\n[2] UNESCO report\n"));
    assert_eq!(outcome.sources.len(), 2);
}

#[tokio::test]
async fn test_local_plan_http_error_propagates_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model 'llama3.1:8b' not found"))
        .mount(&server)
        .await;

    let backend = SearchAugmented::local(Arc::new(tavily(&server))).unwrap();
    let err = backend
        .generate_research_plan(&local_config(&server), "q")
        .await
        .unwrap_err();

    match err {
        BackendError::Http { status, body, .. } => {
            assert_eq!(status, 404);
            assert_eq!(body, "model 'llama3.1:8b' not found");
        }
        other => panic!("Expected Http error, got {:?}", other),
    }
}

// --- Gemini ---

fn gemini_config(server: &MockServer) -> ProviderConfig {
    ProviderConfig::new(ProviderKind::Gemini)
        .with_api_key("g-key")
        .with_base_url(format!("{}/v1beta", server.uri()))
}

#[tokio::test]
async fn test_gemini_step_uses_search_grounding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(query_param("key", "g-key"))
        .and(body_partial_json(json!({"tools": [{"google_search": {}}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(
            "Teachers cite training gaps.",
            json!([
                {"web": {"uri": "https://survey.example/teachers", "title": "survey.example"}},
                {"web": {"title": "no uri"}}
            ]),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let backend = GeminiBackend::new().unwrap();
    let outcome = backend
        .execute_research_step(&gemini_config(&server), "teacher adoption barriers")
        .await
        .unwrap();

    assert_eq!(outcome.result, "Teachers cite training gaps.");
    assert_eq!(
        outcome.sources,
        vec![Source::new("https://survey.example/teachers", "survey.example")]
    );
}

#[tokio::test]
async fn test_gemini_synthesis_parses_fenced_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(
            "```json\n{\"summary\": \"Short.\", \"deepDive\": \"## Long\"}\n```",
            json!([]),
        )))
        .mount(&server)
        .await;

    let mut step = ResearchStep::pending("q1");
    step.status = StepStatus::Completed;
    step.result = Some("r1".into());

    let synthesis = GeminiBackend::new()
        .unwrap()
        .synthesize_analysis(&gemini_config(&server), "original", &[step])
        .await
        .unwrap();

    assert_eq!(synthesis.summary, "Short.");
    assert_eq!(synthesis.deep_dive, "## Long");
}

// --- Validator and full runs over HTTP ---

#[tokio::test]
async fn test_validator_probes_local_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("[]")))
        .expect(1)
        .mount(&server)
        .await;

    let validator = ConfigValidator::new(Arc::new(tavily(&server)));
    let mut config = local_config(&server);

    assert!(validator.validate(&mut config).await);
    assert!(config.is_valid());
}

#[tokio::test]
async fn test_validator_rejects_bad_minimax_credential() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/text/chatcompletion_v2"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .expect(1)
        .mount(&server)
        .await;

    let validator = ConfigValidator::new(Arc::new(tavily(&server)));
    let mut config = minimax_config(&server);

    let err = validator.check(&mut config).await.unwrap_err();

    match err {
        QuarryError::Config(ConfigError::ProbeFailed { message }) => {
            assert_eq!(message, "HTTP 401 from MiniMax: invalid api key");
        }
        other => panic!("Expected ProbeFailed, got {:?}", other),
    }
    assert!(!config.is_valid());
}

#[tokio::test]
async fn test_full_run_against_local_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tavily_body()))
        .expect(2)
        .mount(&server)
        .await;
    // Validator probe, then the run's own plan request.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Break the following research question"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply(
            r#"[{"query":"current AI tools in classrooms"},{"query":"teacher adoption barriers"}]"#,
        )))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Using only the search results below"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("Step answer.")))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("final report for the research question"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply(
            r###"{"summary":"AI helps, unevenly.","deepDive":"## Report"}"###,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let search = Arc::new(tavily(&server));
    let mut config = local_config(&server);
    assert!(
        ConfigValidator::new(search.clone())
            .validate(&mut config)
            .await
    );
    let selection = select_backend(&config, search).unwrap();
    assert!(!selection.substituted());

    let orchestrator =
        ResearchOrchestrator::new(SharedConfig::new(config), Arc::new(NoOpObserver));
    let result = orchestrator
        .run("impact of AI on education", &selection)
        .await
        .unwrap();

    assert_eq!(result.provider, "Local");
    assert_eq!(result.summary, "AI helps, unevenly.");
    assert_eq!(result.steps.len(), 2);
    assert!(result.steps.iter().all(|s| s.status == StepStatus::Completed));
    // Both steps cite the same two pages.
    assert_eq!(result.all_sources.len(), 2);
}
