//! Integration tests for the llama manager client against a mock server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use llama_manager::{ChatMessage, Error, LlamaManager, RetryPolicy};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_millis(300);
const DELAY: Duration = Duration::from_millis(50);

fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(3, TIMEOUT, DELAY)
}

fn manager_for(server: &MockServer) -> LlamaManager {
    LlamaManager::with_policy(&server.uri(), fast_policy())
}

fn max_tokens(n: u64) -> Map<String, Value> {
    let mut options = Map::new();
    options.insert("max_tokens".to_string(), json!(n));
    options
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap().len()
}

#[tokio::test]
async fn test_health_true_when_server_up() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    assert!(manager_for(&server).health().await);
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_health_false_when_server_always_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let policy = fast_policy();
    let start = Instant::now();
    let healthy = manager_for(&server).health().await;
    let elapsed = start.elapsed();

    assert!(!healthy);
    assert_eq!(request_count(&server).await, 3);
    assert!(elapsed <= (policy.timeout_per_attempt + policy.delay_between_attempts) * 3);
}

#[tokio::test]
async fn test_health_false_when_server_unreachable() {
    // Grab a free port, then release it so nothing listens there.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let manager = LlamaManager::with_policy(&format!("http://127.0.0.1:{}", port), fast_policy());

    let start = Instant::now();
    assert!(!manager.health().await);
    assert!(start.elapsed() <= (TIMEOUT + DELAY) * 3);
}

#[tokio::test]
async fn test_health_false_when_attempts_stall() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let start = Instant::now();
    assert!(!manager_for(&server).health().await);
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_completion_succeeds_on_third_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("warming up"))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "text_completion",
            "choices": [{"index": 0, "text": "world", "finish_reason": "stop"}]
        })))
        .mount(&server)
        .await;

    let start = Instant::now();
    let result = manager_for(&server)
        .completion("hello", max_tokens(100))
        .await
        .unwrap();

    assert_eq!(result["choices"][0]["text"], "world");
    assert_eq!(request_count(&server).await, 3);
    // Two failed attempts, two delays.
    let elapsed = start.elapsed();
    assert!(elapsed >= DELAY * 2, "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn test_completion_exhausts_attempts_and_keeps_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = manager_for(&server)
        .completion("hello", Map::new())
        .await
        .unwrap_err();

    assert_eq!(request_count(&server).await, 3);
    match err {
        Error::Status { status, body } => {
            assert_eq!(status.as_u16(), 502);
            assert_eq!(body, "upstream down");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stalled_attempts_count_as_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/props"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = manager_for(&server).props().await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {:?}", err);
    assert_eq!(request_count(&server).await, 3);
}

/// Server that sends 200 headers and part of the body, then goes silent.
async fn spawn_stalling_server() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));

    let counter = connections.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"model\":",
                    )
                    .await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_secs(5)).await;
            });
        }
    });

    (format!("http://{}", addr), connections)
}

#[tokio::test]
async fn test_body_stalled_after_headers_is_retried() {
    let (url, connections) = spawn_stalling_server().await;
    let manager = LlamaManager::with_policy(&url, fast_policy());

    let start = Instant::now();
    let err = manager.props().await.unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {:?}", err);
    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(connections.load(Ordering::SeqCst), 3);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_completion_payload_merges_options() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let mut options = max_tokens(100);
    options.insert("temperature".to_string(), json!(0.2));
    options.insert("n_probs".to_string(), json!(3));
    manager_for(&server)
        .completion("Tell me a joke", options)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(
        body,
        json!({"prompt": "Tell me a joke", "max_tokens": 100, "temperature": 0.2, "n_probs": 3})
    );
}

#[tokio::test]
async fn test_chat_completion_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi!"}}]
        })))
        .mount(&server)
        .await;

    let messages = vec![
        ChatMessage::new("system", "Be brief."),
        ChatMessage::user("Hello"),
    ];
    let result = manager_for(&server)
        .chat_completion(&messages, max_tokens(16))
        .await
        .unwrap();
    assert_eq!(result["choices"][0]["message"]["content"], "Hi!");

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "Hello");
    assert_eq!(body["max_tokens"], 16);
}

#[tokio::test]
async fn test_control_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/props"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"model": "tinyllama", "loaded": true})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"object": "list", "data": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/load"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/unload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "unloaded": true})))
        .mount(&server)
        .await;

    let manager = manager_for(&server);
    assert_eq!(manager.props().await.unwrap()["model"], "tinyllama");
    assert_eq!(manager.models().await.unwrap()["object"], "list");
    assert_eq!(manager.load_model("/models/tiny.gguf").await.unwrap()["status"], "ok");
    assert_eq!(manager.unload_model().await.unwrap()["unloaded"], true);

    let requests = server.received_requests().await.unwrap();
    let load = requests.iter().find(|r| r.url.path() == "/load").unwrap();
    let body: Value = load.body_json().unwrap();
    assert_eq!(body, json!({"model": "/models/tiny.gguf"}));
}

#[tokio::test]
async fn test_non_json_success_is_decode_error_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/props"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = manager_for(&server).props().await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
    assert_eq!(request_count(&server).await, 1);
}
