use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use skillgate::SgError;
use skillgate::collab::{CodeGenerator, HttpGenerator, SystemContext};
use skillgate::config::{GeneratorConfig, GeneratorKind};
use skillgate::pipeline::{GatePolicy, Status};

use crate::fixture::{CLOCK_SOURCE, PipelineFixture, clock_spec};

const COMPLETIONS: &str = "/v1/chat/completions";

fn http_config(server: &MockServer) -> GeneratorConfig {
    GeneratorConfig {
        kind: GeneratorKind::Http,
        endpoint: server.url(COMPLETIONS),
        model: "coder-small".to_string(),
        timeout: Duration::from_secs(5),
        ..GeneratorConfig::default()
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
}

// =============================================================================
// HTTP generator
// =============================================================================

#[test]
fn http_generator_sends_bearer_and_returns_content() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path(COMPLETIONS)
            .header("authorization", "Bearer sk-test");
        then.status(200).json_body(completion("x = 1"));
    });

    let generator = HttpGenerator::new(&http_config(&server))
        .unwrap()
        .with_api_key("sk-test");
    let out = generator
        .generate(&clock_spec(), &SystemContext::default())
        .unwrap();

    mock.assert();
    assert_eq!(out, "x = 1");
}

#[test]
fn http_error_status_is_a_generation_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(COMPLETIONS);
        then.status(500).body("model crashed");
    });

    let generator = HttpGenerator::new(&http_config(&server)).unwrap();
    let err = generator
        .generate(&clock_spec(), &SystemContext::default())
        .unwrap_err();

    assert!(matches!(err, SgError::Generation(_)));
    let message = err.to_string();
    assert!(message.contains("HTTP 500"), "{message}");
    assert!(message.contains("model crashed"), "{message}");
}

#[test]
fn response_without_content_is_rejected() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(COMPLETIONS);
        then.status(200).json_body(json!({ "choices": [] }));
    });

    let generator = HttpGenerator::new(&http_config(&server)).unwrap();
    let err = generator
        .generate(&clock_spec(), &SystemContext::default())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Code generation failed: response has no message content"
    );
}

// =============================================================================
// Pipeline over HTTP
// =============================================================================

#[test]
fn fenced_http_output_is_installed() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(COMPLETIONS);
        then.status(200)
            .json_body(completion(&format!("```python\n{CLOCK_SOURCE}```")));
    });

    let fixture = PipelineFixture::new(true);
    fixture.propose(clock_spec());
    let orchestrator = fixture
        .orchestrator("", GatePolicy::all_auto())
        .with_generator(Box::new(HttpGenerator::new(&http_config(&server)).unwrap()));

    let report = orchestrator.scan_once().unwrap();
    assert_eq!(report.failed, 0);
    assert_eq!(fixture.reload("clock").status, Status::Accepted);

    let stored =
        std::fs::read_to_string(fixture.path("proposals/_implementations/clock.py")).unwrap();
    assert!(stored.starts_with("from datetime import datetime"));
    assert!(!stored.contains("```"));
}

#[test]
fn unreachable_endpoint_rejects_the_proposal() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(COMPLETIONS);
        then.status(503).body("overloaded");
    });

    let fixture = PipelineFixture::new(true);
    fixture.propose(clock_spec());
    let orchestrator = fixture
        .orchestrator("", GatePolicy::all_auto())
        .with_generator(Box::new(HttpGenerator::new(&http_config(&server)).unwrap()));

    orchestrator.scan_once().unwrap();
    let record = fixture.reload("clock");
    assert_eq!(record.status, Status::Rejected);
    assert_eq!(record.rejection_reason_type.as_deref(), Some("GenerationError"));
}
