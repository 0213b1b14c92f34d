//! End-to-end transport tests against a mock HTTP server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pplx_client::PerplexityClient;
use pplx_core::{Dispatcher, Error, ParameterSet, TransportError, compile};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> PerplexityClient {
    PerplexityClient::builder()
        .base_url(server.uri())
        .api_key("pplx-test")
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

fn sse(events: &[serde_json::Value]) -> String {
    let mut body = String::new();
    for event in events {
        body.push_str(&format!("data: {}\n\n", event));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

#[tokio::test]
async fn test_blocking_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer pplx-test"))
        .and(body_partial_json(json!({
            "model": "sonar",
            "stream": false,
            "messages": [{ "role": "user", "content": "capital of France?" }],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "r1",
            "model": "sonar",
            "created": 1,
            "usage": { "prompt_tokens": 4, "completion_tokens": 2, "total_tokens": 6 },
            "citations": ["https://en.wikipedia.org/wiki/Paris"],
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "Paris." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = compile(&ParameterSet::new("capital of France?")).unwrap();
    let dispatcher = Dispatcher::new(Arc::new(client(&server)));
    let answer = dispatcher.dispatch(&request, false).await.unwrap();

    assert_eq!(answer.content(), "Paris.");
    assert_eq!(answer.usage.total_tokens, 6);
    assert!(!answer.sources().is_empty());
}

#[tokio::test]
async fn test_streaming_completion_is_cumulative() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({ "model": "sonar", "choices": [{ "delta": { "content": "The " } }] }),
        json!({ "model": "sonar", "choices": [{ "delta": { "content": "answer " } }] }),
        json!({ "model": "sonar", "choices": [{ "delta": { "content": "is 42." } }],
                "usage": { "prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7 } }),
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "stream": true })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let request = compile(&ParameterSet::new("meaning of life").streaming(true)).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let answer = Dispatcher::new(Arc::new(client(&server)))
        .dispatch_with_observer(&request, move |r| {
            sink.lock().unwrap().push(r.content().to_string());
        })
        .await
        .unwrap();

    assert_eq!(answer.content(), "The answer is 42.");
    assert_eq!(answer.usage.total_tokens, 7);
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["The ", "The answer ", "The answer is 42."]
    );
}

#[tokio::test]
async fn test_streaming_usage_trailer_keeps_answer() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({ "model": "sonar", "choices": [{ "delta": { "content": "Forty" } }] }),
        json!({ "model": "sonar", "choices": [{ "delta": { "content": "-two." } }] }),
        json!({ "model": "sonar", "choices": [],
                "usage": { "prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5 } }),
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let request = compile(&ParameterSet::new("meaning of life").streaming(true)).unwrap();
    let answer = Dispatcher::new(Arc::new(client(&server)))
        .dispatch(&request, true)
        .await
        .unwrap();

    assert_eq!(answer.content(), "Forty-two.");
    assert_eq!(answer.usage.total_tokens, 5);
}

#[tokio::test]
async fn test_empty_stream_reports_stream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse(&[]), "text/event-stream"))
        .mount(&server)
        .await;

    let request = compile(&ParameterSet::new("anything").streaming(true)).unwrap();
    let err = Dispatcher::new(Arc::new(client(&server)))
        .dispatch(&request, true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Stream(_)));
}

#[tokio::test]
async fn test_api_error_message_extracted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Invalid API key", "type": "invalid_api_key", "code": 401 }
        })))
        .mount(&server)
        .await;

    let request = compile(&ParameterSet::new("hi")).unwrap();
    let err = Dispatcher::new(Arc::new(client(&server)))
        .dispatch(&request, false)
        .await
        .unwrap_err();
    match err {
        Error::Request(e @ TransportError::Api { .. }) => {
            assert!(e.is_auth_error());
            assert!(e.to_string().contains("Invalid API key"));
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_api_error_raw_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let request = compile(&ParameterSet::new("hi").streaming(true)).unwrap();
    let err = Dispatcher::new(Arc::new(client(&server)))
        .dispatch(&request, true)
        .await
        .unwrap_err();
    match err {
        Error::Request(TransportError::Api { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "upstream unavailable");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let request = compile(&ParameterSet::new("hi")).unwrap();
    let err = Dispatcher::new(Arc::new(client(&server)))
        .dispatch(&request, false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Request(TransportError::Decode(_))));
}

#[tokio::test]
async fn test_deadline_is_timeout_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "choices": [] }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = PerplexityClient::builder()
        .base_url(server.uri())
        .api_key("pplx-test")
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let request = compile(&ParameterSet::new("slow")).unwrap();
    let err = Dispatcher::new(Arc::new(client))
        .dispatch(&request, false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Request(TransportError::Timeout(_))));
}
