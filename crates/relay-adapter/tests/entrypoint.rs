use std::sync::Arc;

use async_trait::async_trait;
use mockall::mock;
use relay_adapter::{handle_invocation, InvocationServer};
use relay_core::{
    Completion, InvocationPayload, ModelAdapter, RelayError, Result, Role, TextStream, Turn,
    UsageStats,
};

mock! {
    pub Adapter {}

    #[async_trait]
    impl ModelAdapter for Adapter {
        type RawUsage = UsageStats;

        fn name(&self) -> &'static str;
        async fn invoke(&self, model_id: &str, turns: &[Turn]) -> Result<Completion>;
        async fn invoke_stream(&self, model_id: &str, turns: &[Turn]) -> Result<TextStream>;
        fn token_accounting(&self, raw_usage: &UsageStats) -> UsageStats;
    }
}

fn adapter_replying(expected_model: &'static str, text: &'static str, usage: UsageStats) -> MockAdapter {
    let mut adapter = MockAdapter::new();
    adapter.expect_name().return_const("mock");
    adapter
        .expect_invoke()
        .returning(move |model, _turns| {
            assert_eq!(model, expected_model);
            Ok(Completion {
                text: text.to_string(),
                usage,
            })
        });
    adapter
}

#[tokio::test]
async fn missing_model_uses_default() {
    let adapter = adapter_replying("gemini-2.5-flash-lite", "Hi there!", UsageStats::new(5, 3, 8));

    let payload = InvocationPayload {
        model: None,
        messages: vec![Turn::new(Role::User, "Hello")],
    };
    let response = handle_invocation(&adapter, payload, "gemini-2.5-flash-lite")
        .await
        .unwrap();

    assert_eq!(response.response, "Hi there!");
    assert_eq!(response.usage, Some(UsageStats::new(5, 3, 8)));
}

#[tokio::test]
async fn explicit_model_and_full_history_reach_adapter() {
    let mut adapter = MockAdapter::new();
    adapter.expect_name().return_const("mock");
    adapter
        .expect_invoke()
        .times(1)
        .returning(|model, turns| {
            assert_eq!(model, "gemini-2.0-flash-lite");
            assert_eq!(turns.len(), 3);
            assert_eq!(turns[1].role, Role::Assistant);
            Ok(Completion {
                text: "third".into(),
                usage: UsageStats::ZERO,
            })
        });

    let payload = InvocationPayload {
        model: Some("gemini-2.0-flash-lite".into()),
        messages: vec![
            Turn::new(Role::User, "one"),
            Turn::new(Role::Assistant, "two"),
            Turn::new(Role::User, "three"),
        ],
    };
    let response = handle_invocation(&adapter, payload, "unused").await.unwrap();
    assert_eq!(response.response, "third");
}

#[tokio::test]
async fn adapter_failure_propagates() {
    let mut adapter = MockAdapter::new();
    adapter.expect_name().return_const("mock");
    adapter
        .expect_invoke()
        .returning(|_, _| Err(RelayError::Provider("quota exceeded".into())));

    let err = handle_invocation(&adapter, InvocationPayload::default(), "m")
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Provider(_)));
}

fn start_server(adapter: MockAdapter) -> String {
    let server = InvocationServer::bind("127.0.0.1:0", Arc::new(adapter), "gemini-2.5-flash-lite")
        .unwrap();
    let addr = server.local_addr().unwrap();
    server.spawn();
    format!("http://{addr}")
}

#[tokio::test(flavor = "multi_thread")]
async fn server_answers_ping() {
    let mut adapter = MockAdapter::new();
    adapter.expect_name().return_const("mock");
    let base = start_server(adapter);

    let response = reqwest::get(format!("{base}/ping")).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "Healthy");
}

#[tokio::test(flavor = "multi_thread")]
async fn server_serves_invocations() {
    let base = start_server(adapter_replying(
        "gemini-2.5-flash-lite",
        "Hi there!",
        UsageStats::new(5, 3, 8),
    ));

    let response = reqwest::Client::new()
        .post(format!("{base}/invocations"))
        .json(&serde_json::json!({"messages": [{"role": "user", "content": "Hello"}]}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "response": "Hi there!",
            "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
        })
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn server_rejects_bad_payload() {
    let mut adapter = MockAdapter::new();
    adapter.expect_name().return_const("mock");
    adapter.expect_invoke().never();
    let base = start_server(adapter);

    let response = reqwest::Client::new()
        .post(format!("{base}/invocations"))
        .body(r#"{"messages": [{"role": "model", "content": "Hello"}]}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "bad_request");
}

#[tokio::test(flavor = "multi_thread")]
async fn server_reports_provider_failure() {
    let mut adapter = MockAdapter::new();
    adapter.expect_name().return_const("mock");
    adapter
        .expect_invoke()
        .returning(|_, _| Err(RelayError::Provider("model overloaded".into())));
    let base = start_server(adapter);

    let response = reqwest::Client::new()
        .post(format!("{base}/invocations"))
        .json(&serde_json::json!({"model": "m", "messages": []}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({"error": "model overloaded", "kind": "provider"}));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_unknown_route_is_not_found() {
    let mut adapter = MockAdapter::new();
    adapter.expect_name().return_const("mock");
    let base = start_server(adapter);

    let response = reqwest::get(format!("{base}/nope")).await.unwrap();
    assert_eq!(response.status(), 404);
}
