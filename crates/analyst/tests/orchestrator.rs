use analyst::agent::Agent;
use analyst::config::RunContext;
use analyst::errors::AgentError;
use analyst::http_tool::HttpTool;
use analyst::models::message::Message;
use analyst::models::tool::Tool;
use analyst::providers::configs::OpenAiProviderConfig;
use analyst::providers::openai::OpenAiProvider;
use analyst::registry::ToolRegistry;
use analyst::sink::{ChannelSink, SinkEvent};
use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse(chunks: &[Value]) -> ResponseTemplate {
    let mut body: String = chunks
        .iter()
        .map(|chunk| format!("data: {}\n\n", chunk))
        .collect();
    body.push_str("data: [DONE]\n\n");
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

fn text_turn(parts: &[&str]) -> ResponseTemplate {
    let chunks: Vec<Value> = parts
        .iter()
        .map(|part| json!({"choices": [{"index": 0, "delta": {"content": part}}]}))
        .collect();
    sse(&chunks)
}

fn run_sql_turn(query: &str) -> ResponseTemplate {
    let arguments = json!({ "query": query }).to_string();
    let (head, tail) = arguments.split_at(arguments.len() / 2);
    sse(&[
        json!({"choices": [{"index": 0, "delta": {"role": "assistant", "tool_calls": [
            {"index": 0, "id": "call_1", "type": "function", "function": {"name": "run_sql", "arguments": ""}}
        ]}}]}),
        json!({"choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": head}}
        ]}}]}),
        json!({"choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": tail}}
        ]}, "finish_reason": "tool_calls"}]}),
    ])
}

async fn agent_for(server: &MockServer) -> Result<Agent> {
    let provider = OpenAiProvider::new(OpenAiProviderConfig {
        host: server.uri(),
        api_key: "sk-test".to_string(),
        model: "gpt-4-turbo".to_string(),
        temperature: Some(0.0),
        max_tokens: None,
    })?;

    let run_sql = HttpTool::new(
        Tool::new(
            "run_sql",
            "Execute a read-only SQL query against the connection",
            json!({
                "type": "object",
                "required": ["query"],
                "properties": {"query": {"type": "string"}}
            }),
        ),
        format!("{}/tools/run_sql", server.uri()),
    )?;
    let registry = ToolRegistry::new().with_tool(Arc::new(run_sql))?;

    Ok(Agent::new(Arc::new(provider), Arc::new(registry)))
}

async fn mount_completions(server: &MockServer, first: ResponseTemplate, second: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(first)
        .up_to_n_times(1)
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("\"tool_call_id\":\"call_1\""))
        .respond_with(second)
        .mount(server)
        .await;
}

fn context() -> RunContext {
    RunContext::new("org-1", "conn-1")
        .with_auth_token("user-jwt")
        .with_schema("orders(id integer, total numeric)")
}

#[tokio::test]
async fn test_question_answered_with_remote_tool() -> Result<()> {
    let server = MockServer::start().await;
    mount_completions(
        &server,
        run_sql_turn("SELECT count(*) FROM orders"),
        text_turn(&["There are ", "42 orders."]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/tools/run_sql"))
        .and(header("authorization", "Bearer user-jwt"))
        .and(body_partial_json(json!({
            "name": "run_sql",
            "arguments": {"query": "SELECT count(*) FROM orders"},
            "organization_id": "org-1",
            "connection_id": "conn-1",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rows": [[42]]})))
        .expect(1)
        .mount(&server)
        .await;

    let agent = agent_for(&server).await?;
    let (sink, mut rx) = ChannelSink::channel(32);
    let conversation = agent
        .run(context(), "How many orders do we have?", Some(&sink), &CancellationToken::new())
        .await?;
    drop(sink);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert_eq!(
        events,
        vec![
            SinkEvent::Text("There are ".into()),
            SinkEvent::Text("42 orders.".into()),
            SinkEvent::Complete,
        ]
    );

    let messages = conversation.messages();
    assert_eq!(messages.len(), 5);
    assert_eq!(
        messages[3],
        Message::tool_result("call_1", Ok(json!({"rows": [[42]]})))
    );
    assert_eq!(conversation.final_text().as_deref(), Some("There are 42 orders."));

    let completions = server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == "/v1/chat/completions")
        .count();
    assert_eq!(completions, 2);
    Ok(())
}

#[tokio::test]
async fn test_tool_failure_is_shown_to_the_model() -> Result<()> {
    let server = MockServer::start().await;
    mount_completions(
        &server,
        run_sql_turn("SELECT * FROM missing"),
        text_turn(&["That table does not exist."]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/tools/run_sql"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string("relation \"missing\" does not exist"),
        )
        .mount(&server)
        .await;

    let agent = agent_for(&server).await?;
    let conversation = agent
        .run(context(), "Show me everything", None, &CancellationToken::new())
        .await?;

    assert_eq!(
        conversation.messages()[3],
        Message::tool_result(
            "call_1",
            Err(AgentError::InvalidParameters(
                "relation \"missing\" does not exist".to_string()
            ))
        )
    );
    assert_eq!(
        conversation.final_text().as_deref(),
        Some("That table does not exist.")
    );
    Ok(())
}

#[tokio::test]
async fn test_upstream_refusal_ends_run_with_error() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let agent = agent_for(&server).await?;
    let (sink, mut rx) = ChannelSink::channel(8);
    let result = agent
        .run(context(), "Anything", Some(&sink), &CancellationToken::new())
        .await;

    assert!(result.is_err());
    match rx.recv().await {
        Some(SinkEvent::Error(message)) => assert!(message.contains("invalid api key")),
        other => panic!("Expected an error notification, got {:?}", other),
    }
    Ok(())
}
