use std::thread::{self, JoinHandle};
use std::time::Duration;

use relay_client::BackendGateway;
use relay_conversation::ConversationSession;
use relay_core::{RelayError, Reply, UsageStats};

/// Serve a single canned HTTP reply and hand back the request body it received.
fn serve_once(status: u16, body: &'static str, delay: Duration) -> (String, JoinHandle<Option<String>>) {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();

    let handle = thread::spawn(move || {
        let mut request = server.recv().ok()?;
        let mut received = String::new();
        request.as_reader().read_to_string(&mut received).ok()?;

        thread::sleep(delay);
        let response = tiny_http::Response::from_string(body).with_status_code(status);
        let _ = request.respond(response);
        Some(received)
    });

    (format!("http://{addr}/invocations"), handle)
}

fn session_with(input: &str) -> ConversationSession {
    let mut session = ConversationSession::new();
    session.append_user(input);
    session
}

#[tokio::test]
async fn sends_model_and_full_history() {
    let (endpoint, server) = serve_once(200, r#"{"response":"ok"}"#, Duration::ZERO);
    let gateway = BackendGateway::new(endpoint, Duration::from_secs(5)).unwrap();

    let mut session = ConversationSession::new();
    session.append_user("Hello");
    session.append_assistant(Reply::new("Hi there!", UsageStats::new(5, 3, 8)));
    session.append_user("How are you?");

    gateway.invoke(&session, "gemini-2.5-flash-lite").await.unwrap();

    let sent: serde_json::Value = serde_json::from_str(&server.join().unwrap().unwrap()).unwrap();
    assert_eq!(
        sent,
        serde_json::json!({
            "model": "gemini-2.5-flash-lite",
            "messages": [
                {"role": "user", "content": "Hello"},
                {"role": "assistant", "content": "Hi there!"},
                {"role": "user", "content": "How are you?"}
            ]
        })
    );
}

#[tokio::test]
async fn parses_reply_with_usage() {
    let (endpoint, _server) = serve_once(
        200,
        r#"{"response":"Hi there!","usage":{"prompt_tokens":5,"completion_tokens":3,"total_tokens":8}}"#,
        Duration::ZERO,
    );
    let gateway = BackendGateway::new(endpoint, Duration::from_secs(5)).unwrap();

    let reply = gateway.invoke(&session_with("Hello"), "m").await.unwrap();
    assert_eq!(reply.text(), "Hi there!");
    assert_eq!(reply.usage(), UsageStats::new(5, 3, 8));
}

#[tokio::test]
async fn missing_usage_counts_as_zero() {
    let (endpoint, _server) = serve_once(
        200,
        r#"{"response":"Hi","usage":{"completion_tokens":3}}"#,
        Duration::ZERO,
    );
    let gateway = BackendGateway::new(endpoint, Duration::from_secs(5)).unwrap();
    let reply = gateway.invoke(&session_with("Hello"), "m").await.unwrap();
    assert_eq!(reply.usage(), UsageStats::new(0, 3, 0));

    let (endpoint, _server) = serve_once(200, r#"{"response":"Hi"}"#, Duration::ZERO);
    let gateway = BackendGateway::new(endpoint, Duration::from_secs(5)).unwrap();
    let reply = gateway.invoke(&session_with("Hello"), "m").await.unwrap();
    assert!(reply.usage().is_zero());
}

#[tokio::test]
async fn malformed_body_is_reported() {
    let (endpoint, _server) = serve_once(200, r#"{"text":"no response field"}"#, Duration::ZERO);
    let gateway = BackendGateway::new(endpoint, Duration::from_secs(5)).unwrap();

    let err = gateway.invoke(&session_with("Hello"), "m").await.unwrap_err();
    assert!(matches!(err, RelayError::MalformedResponse(_)));
}

#[tokio::test]
async fn server_error_is_transport_failure() {
    let (endpoint, _server) = serve_once(500, "internal error", Duration::ZERO);
    let gateway = BackendGateway::new(endpoint, Duration::from_secs(5)).unwrap();

    let err = gateway.invoke(&session_with("Hello"), "m").await.unwrap_err();
    assert!(matches!(err, RelayError::Transport(msg) if msg.contains("500")));
}

#[tokio::test]
async fn provider_failure_is_classified() {
    let (endpoint, _server) = serve_once(
        502,
        r#"{"error":"model overloaded","kind":"provider"}"#,
        Duration::ZERO,
    );
    let gateway = BackendGateway::new(endpoint, Duration::from_secs(5)).unwrap();

    let err = gateway.invoke(&session_with("Hello"), "m").await.unwrap_err();
    assert!(matches!(err, RelayError::Provider(msg) if msg == "model overloaded"));
}

#[tokio::test]
async fn slow_backend_times_out() {
    let (endpoint, _server) = serve_once(200, r#"{"response":"late"}"#, Duration::from_secs(3));
    let gateway = BackendGateway::new(endpoint, Duration::from_millis(200)).unwrap();

    let err = gateway.invoke(&session_with("Hello"), "m").await.unwrap_err();
    assert!(matches!(err, RelayError::Transport(msg) if msg.contains("timed out")));
}

#[tokio::test]
async fn refused_connection_is_transport_failure() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let gateway =
        BackendGateway::new(format!("http://127.0.0.1:{port}/invocations"), Duration::from_secs(2))
            .unwrap();

    let err = gateway.invoke(&session_with("Hello"), "m").await.unwrap_err();
    assert!(matches!(err, RelayError::Transport(_)));
}

#[tokio::test]
async fn invoke_leaves_session_untouched() {
    let (endpoint, _server) = serve_once(200, r#"{"response":"Hi"}"#, Duration::ZERO);
    let gateway = BackendGateway::new(endpoint, Duration::from_secs(5)).unwrap();

    let session = session_with("Hello");
    let before = session.history().to_vec();
    gateway.invoke(&session, "m").await.unwrap();

    assert_eq!(session.history(), before.as_slice());
    assert!(session.totals().is_zero());
}
