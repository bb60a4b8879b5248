use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use sme_plug_core::{
    AnalysisRequest, ApiError, Attachment, Backend, BuildStatus, Credentials, CustomRole,
    CustomRoleBuilder, HttpBackend, Provider, QueryOrchestrator, QueryOutcome, ResponseSlot,
};

fn backend(server: &MockServer, provider: Option<Provider>, credentials: Credentials) -> HttpBackend {
    HttpBackend::new(
        &server.url("/api"),
        provider,
        Arc::new(credentials),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn anonymous(server: &MockServer) -> HttpBackend {
    backend(server, None, Credentials::default())
}

#[tokio::test]
async fn ask_expert_sends_role_as_plugin_with_credentials() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/ask-expert")
                .header("x-groq-key", "gsk-test")
                .json_body_partial(
                    r#"{"question":"How deep should a footing be?","plugin":"CivilEngineer","provider":"groq"}"#,
                );
            then.status(200).json_body(json!({
                "answer": "Below the frost line.",
                "citations": ["[Source: IBC, Page 4]"],
                "accuracy": 92.5,
                "steps": [{"node": "retrieve", "status": "ok"}],
                "roadmap": [{"step": "Survey", "desc": "Test the soil."}]
            }));
        })
        .await;

    let api = backend(
        &server,
        Some(Provider::Groq),
        Credentials {
            groq_key: Some("gsk-test".to_string()),
            openai_key: None,
        },
    );
    let answer = api
        .ask_expert("How deep should a footing be?", "CivilEngineer")
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(answer.answer, "Below the frost line.");
    assert_eq!(answer.citations, vec!["[Source: IBC, Page 4]"]);
    assert_eq!(answer.accuracy, Some(92.5));
    assert_eq!(answer.steps[0].node, "retrieve");
    assert_eq!(answer.roadmap[0].description, "Test the soil.");
    assert!(!answer.out_of_scope);
}

#[tokio::test]
async fn server_detail_is_surfaced() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/ask-expert");
            then.status(500)
                .json_body(json!({ "detail": "Groq API key missing" }));
        })
        .await;

    let err = anonymous(&server)
        .ask_expert("anything", "Educator")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ApiError::Server {
            status: 500,
            detail: Some("Groq API key missing".to_string()),
        }
    );
    assert_eq!(err.user_message(), "Error: Groq API key missing");
}

#[tokio::test]
async fn malformed_body_is_reported() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/ask-expert");
            then.status(200).body("<html>proxy page</html>");
        })
        .await;

    let err = anonymous(&server)
        .ask_expert("anything", "Educator")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Malformed(_)));
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let api = HttpBackend::new(
        "http://127.0.0.1:9/api",
        None,
        Arc::new(Credentials::default()),
        Duration::from_secs(2),
    )
    .unwrap();

    let err = api.health().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}

#[tokio::test]
async fn health_and_role_rules() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/health");
            then.status(200)
                .json_body(json!({ "status": "ok", "llm_provider": "groq" }));
        })
        .await;
    let rules = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/role-rules/MarineBiologist");
            then.status(200).json_body(json!({
                "expert_rules": ["Cite the survey."],
                "roadmap": [{"step": "Dive", "desc": "Collect samples."}]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/role-rules/Pilot");
            then.status(404).json_body(json!({ "detail": "Unknown role: Pilot" }));
        })
        .await;

    let api = anonymous(&server);
    let report = api.health().await.unwrap();
    assert!(report.is_ok());
    assert_eq!(report.llm_provider.as_deref(), Some("groq"));

    let fetched = api.role_rules("MarineBiologist").await.unwrap();
    rules.assert_async().await;
    assert_eq!(fetched.expert_rules, vec!["Cite the survey."]);
    assert_eq!(fetched.roadmap[0].step, "Dive");

    let err = api.role_rules("Pilot").await.unwrap_err();
    assert_eq!(err.detail(), Some("Unknown role: Pilot"));
}

#[tokio::test]
async fn analysis_request_shape() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/analyze-hallucination")
                .json_body(json!({
                    "expert_answer": "A",
                    "base_answer": "B",
                    "question": "Q",
                    "role": "Educator"
                }));
            then.status(200)
                .json_body(json!({ "analysis": "B invents a statute.", "hallucination_score": 65 }));
        })
        .await;

    let payload = anonymous(&server)
        .analyze_hallucination(&AnalysisRequest {
            expert_answer: "A".to_string(),
            base_answer: "B".to_string(),
            question: "Q".to_string(),
            role: "Educator".to_string(),
        })
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(payload.hallucination_score, Some(65.0));
}

#[tokio::test]
async fn custom_role_pipeline_over_http() {
    let server = MockServer::start_async().await;
    let extract = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/extract-text")
                .header_exists("content-type")
                .body_contains("reef-survey.txt")
                .body_contains("Coral cover fell 12%.");
            then.status(200)
                .json_body(json!({ "text": "Coral cover fell 12%." }));
        })
        .await;
    let generate = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate-rules")
                .json_body_partial(
                    r#"{"role_name":"MarineBiologist","knowledge_base":"Coral cover fell 12%."}"#,
                );
            then.status(200).json_body(json!({
                "core_directive": "You are a marine biologist.",
                "expert_rules": ["Quote survey figures."],
                "roadmap": [{"step": "Assess", "desc": "Check reef health."}]
            }));
        })
        .await;
    let save = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/custom-roles")
                .json_body_partial(r#"{"role_name":"MarineBiologist"}"#);
            then.status(200).json_body(json!({ "status": "saved" }));
        })
        .await;
    let list = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/custom-roles");
            then.status(200).json_body(json!({
                "roles": [{
                    "role_name": "MarineBiologist",
                    "core_directive": "You are a marine biologist.",
                    "expert_rules": ["Quote survey figures."],
                    "roadmap": [{"step": "Assess", "desc": "Check reef health."}]
                }]
            }));
        })
        .await;

    let builder = CustomRoleBuilder::new(Arc::new(anonymous(&server)));
    let file = Attachment::new("reef-survey.txt", b"Coral cover fell 12%.".to_vec());
    let role = builder
        .create_custom_role("MarineBiologist", Some(file))
        .await
        .unwrap();

    extract.assert_async().await;
    generate.assert_async().await;
    save.assert_async().await;
    list.assert_async().await;
    assert_eq!(role.knowledge_base.as_deref(), Some("Coral cover fell 12%."));
    assert_eq!(builder.status(), BuildStatus::Success);
    assert_eq!(
        builder.roles(),
        vec![CustomRole {
            role_name: "MarineBiologist".to_string(),
            core_directive: "You are a marine biologist.".to_string(),
            expert_rules: vec!["Quote survey figures.".to_string()],
            roadmap: role.roadmap.clone(),
            knowledge_base: None,
        }]
    );
}

#[tokio::test]
async fn exchange_over_http() {
    let server = MockServer::start_async().await;
    let expert = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/ask-expert")
                .json_body_partial(r#"{"plugin":"SoftwareEngineer"}"#);
            then.status(200)
                .json_body(json!({ "answer": "Use structured audit logs." }));
        })
        .await;
    let base = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/ask-expert")
                .json_body_partial(r#"{"plugin":"none"}"#);
            then.status(200).json_body(json!({ "answer": "Log things." }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/analyze-hallucination");
            then.status(500).body("boom");
        })
        .await;

    let orchestrator = QueryOrchestrator::new(Arc::new(anonymous(&server)), Duration::ZERO);
    let outcome = orchestrator
        .submit_query("How should access be logged?", "SoftwareEngineer")
        .await
        .unwrap();

    assert_eq!(outcome, QueryOutcome::Completed { analysis_degraded: true });
    expert.assert_async().await;
    base.assert_async().await;

    let state = orchestrator.snapshot();
    assert_eq!(
        state.expert.success().map(|a| a.answer.as_str()),
        Some("Use structured audit logs.")
    );
    assert_eq!(state.base.success().map(|a| a.answer.as_str()), Some("Log things."));
    assert!(matches!(state.analysis, ResponseSlot::Success(ref a) if a.analysis == "Analysis failed."));
}
