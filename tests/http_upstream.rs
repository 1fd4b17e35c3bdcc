//! HttpUpstream against a mock provider.

use chat_cache_gateway::normalize::RequestNormalizer;
use chat_cache_gateway::transport::HttpUpstream;
use chat_cache_gateway::{
    ChatRequest, Error, Gateway, GatewayConfig, GatewayReply, UpstreamClient,
};
use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;

const PATH: &str = "/v1/chat/completions";

fn config_for(server: &Server) -> GatewayConfig {
    GatewayConfig::default()
        .with_base_url(format!("{}/v1", server.url()))
        .with_api_key("sk-test")
}

fn request(body: serde_json::Value) -> ChatRequest {
    RequestNormalizer::default().normalize(&body).unwrap().request
}

#[tokio::test]
async fn sends_exact_payload_with_bearer_auth() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_header("authorization", "Bearer sk-test")
        .match_header("content-type", "application/json")
        .match_header("x-request-id", Matcher::Any)
        .match_body(Matcher::Json(json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "You are a helpful AI assistant for classroom support. Answer clearly and briefly."},
                {"role": "user", "content": "What is 2+2?"}
            ],
            "temperature": 0.6,
            "max_tokens": 400
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"4"}}]}"#)
        .expect(1)
        .create_async()
        .await;

    let upstream = HttpUpstream::new(&config_for(&server)).unwrap();
    assert_eq!(upstream.endpoint(), format!("{}{}", server.url(), PATH));

    let raw = upstream
        .send(&request(json!({"prompt": "What is 2+2?"})))
        .await
        .unwrap();
    assert_eq!(raw["choices"][0]["message"]["content"], "4");
    mock.assert_async().await;
}

#[tokio::test]
async fn json_mode_adds_response_format() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_body(Matcher::PartialJson(json!({
            "response_format": {"type": "json_object"}
        })))
        .with_status(200)
        .with_body(r#"{"choices":[{"message":{"content":"{\"ok\":true}"}}]}"#)
        .create_async()
        .await;

    let upstream = HttpUpstream::new(&config_for(&server)).unwrap();
    upstream
        .send(&request(json!({
            "prompt": "Give me a status object",
            "response_format": {"type": "json_object"}
        })))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn non_success_status_preserves_status_and_body() {
    let mut server = Server::new_async().await;
    let error_body = r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
    let _mock = server
        .mock("POST", PATH)
        .with_status(429)
        .with_body(error_body)
        .create_async()
        .await;

    let upstream = HttpUpstream::new(&config_for(&server)).unwrap();
    let err = upstream
        .send(&request(json!({"prompt": "hi"})))
        .await
        .unwrap_err();

    match err {
        Error::Upstream { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, error_body);
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn missing_credential_fails_before_any_request() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let config = GatewayConfig::default().with_base_url(format!("{}/v1", server.url()));
    let upstream = HttpUpstream::new(&config).unwrap();
    assert!(!upstream.has_credential());

    let err = upstream
        .send(&request(json!({"prompt": "hi"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_provider_is_a_transport_error() {
    let config = GatewayConfig::default()
        .with_base_url("http://127.0.0.1:1/v1")
        .with_api_key("sk-test");
    let upstream = HttpUpstream::new(&config).unwrap();

    let err = upstream
        .send(&request(json!({"prompt": "hi"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "{:?}", err);
}

#[tokio::test]
async fn silent_provider_times_out() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let mut config = GatewayConfig::default()
        .with_base_url(format!("http://{}/v1", addr))
        .with_api_key("sk-test");
    config.timeout = Duration::from_millis(200);
    let gateway = Gateway::from_config(&config).unwrap();

    let err = gateway.handle(&json!({"prompt": "hi"})).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "{:?}", err);
    assert!(err.is_timeout());

    let reply = GatewayReply::from_error(&err.duplicate());
    assert_eq!(reply.status, 502);
    assert_eq!(reply.body["error"], "Upstream provider unreachable");
}

#[tokio::test]
async fn gateway_caches_provider_answer_over_http() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"chatcmpl-1","choices":[{"message":{"content":"Mitosis has four phases."}}]}"#)
        .expect(1)
        .create_async()
        .await;

    let gateway = Gateway::from_config(&config_for(&server)).unwrap();
    let body = json!({"event": "summary", "payload": {"transcriptChunk": "Phases of mitosis"}});

    let first = gateway.respond("POST", &body).await;
    let second = gateway.respond("POST", &body).await;

    assert_eq!(
        first.body,
        json!({"choices": [{"message": {"content": "Mitosis has four phases."}}]})
    );
    assert_eq!(
        second.body,
        json!({"choices": [{"message": {"content": "Mitosis has four phases."}}], "cached": true})
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn gateway_relays_provider_errors_as_502() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .with_status(503)
        .with_body("upstream overloaded")
        .create_async()
        .await;

    let gateway = Gateway::from_config(&config_for(&server)).unwrap();
    let reply = gateway.respond("POST", &json!({"prompt": "hi"})).await;

    assert_eq!(reply.status, 502);
    assert_eq!(
        reply.body,
        json!({
            "error": "Upstream provider request failed",
            "status": 503,
            "body": "upstream overloaded"
        })
    );
    assert!(gateway.cache().is_empty());
}

#[tokio::test]
async fn malformed_success_body_is_an_internal_error() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .with_status(200)
        .with_body("<html>gateway timeout</html>")
        .create_async()
        .await;

    let gateway = Gateway::from_config(&config_for(&server)).unwrap();
    let reply = gateway.respond("POST", &json!({"prompt": "hi"})).await;

    assert_eq!(reply.status, 500);
    assert_eq!(reply.body["error"], "Internal error");
    assert!(gateway.cache().is_empty());
}
