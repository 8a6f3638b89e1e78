mod common;

use common::{executor, transcript, FixedLauncher};
use runbox::{http_server, AppState};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

async fn spawn_server() -> (SocketAddr, tempfile::TempDir) {
    let (exec, root) = executor(Arc::new(FixedLauncher(transcript(
        "",
        "",
        0,
        Some(("Hello from Rust!", "", 0)),
    ))));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(http_server::serve(listener, AppState::new(exec)));
    (addr, root)
}

async fn send(request: reqwest::RequestBuilder) -> (u16, Value) {
    let response = request.send().await.unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_execute_returns_result() {
    let (addr, _root) = spawn_server().await;
    let client = reqwest::Client::new();
    let (status, body) = send(
        client
            .post(format!("http://{addr}/execute"))
            .json(&json!({ "code": "fn main() { println!(\"Hello from Rust!\"); }" })),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!({
            "compile_stdout": "",
            "compile_stderr": "",
            "run_stdout": "Hello from Rust!",
            "run_stderr": "",
            "error": null,
        })
    );
}

#[tokio::test]
async fn test_rejects_non_json_content_type() {
    let (addr, _root) = spawn_server().await;
    let client = reqwest::Client::new();
    let (status, body) = send(
        client
            .post(format!("http://{addr}/execute"))
            .header("content-type", "text/plain")
            .body("fn main() {}"),
    )
    .await;

    assert_eq!(status, 400);
    assert_eq!(
        body["error"],
        "Invalid request: Content-Type must be application/json"
    );
}

#[tokio::test]
async fn test_rejects_missing_code() {
    let (addr, _root) = spawn_server().await;
    let client = reqwest::Client::new();
    for payload in [json!({}), json!({ "code": null }), json!({ "source": "fn main() {}" })] {
        let (status, body) = send(
            client
                .post(format!("http://{addr}/execute"))
                .json(&payload),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Missing 'code' field in JSON payload");
    }
}

#[tokio::test]
async fn test_rejects_non_string_code() {
    let (addr, _root) = spawn_server().await;
    let client = reqwest::Client::new();
    let (status, body) = send(
        client
            .post(format!("http://{addr}/execute"))
            .json(&json!({ "code": 42 })),
    )
    .await;

    assert_eq!(status, 400);
    assert_eq!(body["error"], "'code' field must be a string");
}

#[tokio::test]
async fn test_rejects_broken_json() {
    let (addr, _root) = spawn_server().await;
    let client = reqwest::Client::new();
    let (status, body) = send(
        client
            .post(format!("http://{addr}/execute"))
            .header("content-type", "application/json")
            .body("{\"code\": "),
    )
    .await;

    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid JSON payload");
}

#[tokio::test]
async fn test_health() {
    let (addr, _root) = spawn_server().await;
    let text = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(text, "OK");
}
