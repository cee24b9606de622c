//! Integration tests for the bounded agent loop.
//!
//! All scenarios run against the scripted mock client, so the loop's
//! bounds, parse recovery and tool handling are exercised without a live
//! backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use colloquy_ai::{
    AgentExecutor, AiError, ConversationMemory, ExecutorConfig, MockLlmClient, MockStep,
    ModelHandle, Result, Role, RunStatus, SessionManager, Tool, ToolOutput, ToolRegistry, Turn,
};

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the input payload"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": { "type": "string" }
            }
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput> {
        Ok(ToolOutput::success(input))
    }
}

struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "flaky"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn execute(&self, _input: Value) -> Result<ToolOutput> {
        Ok(ToolOutput::error("backing service rejected the request"))
    }
}

struct CountingTool {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        "counter"
    }

    fn description(&self) -> &str {
        "Counts invocations"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn execute(&self, _input: Value) -> Result<ToolOutput> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ToolOutput::success(json!({"count": n})))
    }
}

fn handle_for(client: &MockLlmClient) -> ModelHandle {
    ModelHandle {
        logical_id: "gpt-4".to_string(),
        client: Arc::new(client.clone()),
        temperature: 0.0,
        streaming: false,
    }
}

fn empty_context() -> colloquy_ai::WorkingContext {
    ConversationMemory::new(1000).working_context()
}

#[tokio::test]
async fn simple_completion_succeeds() {
    let llm = MockLlmClient::from_steps("mock-model", vec![MockStep::text("Hello, done!")]);
    let executor = AgentExecutor::new(handle_for(&llm), Arc::new(ToolRegistry::new()));

    let report = executor
        .run("Say hello", &empty_context(), ExecutorConfig::default())
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.answer.as_deref(), Some("Hello, done!"));
    assert!(matches!(report.state.status, RunStatus::Succeeded { .. }));
    assert_eq!(llm.call_count(), 1);
    assert_eq!(report.iterations, 0);
}

#[tokio::test]
async fn native_tool_round_then_completion() {
    let llm = MockLlmClient::from_steps(
        "mock-model",
        vec![
            MockStep::tool_call("call_1", "echo", json!({"message": "hi"})),
            MockStep::text("All done"),
        ],
    );
    let mut tools = ToolRegistry::new();
    tools.register(EchoTool);
    let executor = AgentExecutor::new(handle_for(&llm), Arc::new(tools));

    let report = executor
        .run("Use the echo tool", &empty_context(), ExecutorConfig::default())
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.iterations, 1);
    assert_eq!(llm.call_count(), 2);

    // Second request must carry the tool result back to the model.
    let requests = llm.captured_requests().await;
    let second = &requests[1];
    let tool_msg = second
        .iter()
        .find(|m| m.role == Role::Tool)
        .expect("tool result in second request");
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
    assert!(tool_msg.content.contains("hi"));
}

#[tokio::test]
async fn text_embedded_tool_call_is_executed() {
    let llm = MockLlmClient::from_steps(
        "mock-model",
        vec![
            MockStep::text(r#"{"tool": "echo", "arguments": {"message": "from text"}}"#),
            MockStep::text("finished"),
        ],
    );
    let mut tools = ToolRegistry::new();
    tools.register(EchoTool);
    let executor = AgentExecutor::new(handle_for(&llm), Arc::new(tools));

    let report = executor
        .run("Go", &empty_context(), ExecutorConfig::default())
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.iterations, 1);
    let requests = llm.captured_requests().await;
    assert!(
        requests[1]
            .iter()
            .any(|m| m.role == Role::Tool && m.content.contains("from text"))
    );
}

#[tokio::test]
async fn tool_error_is_fed_back_not_fatal() {
    let llm = MockLlmClient::from_steps(
        "mock-model",
        vec![
            MockStep::tool_call("call_1", "flaky", json!({})),
            MockStep::text("Recovered"),
        ],
    );
    let mut tools = ToolRegistry::new();
    tools.register(FailingTool);
    let executor = AgentExecutor::new(handle_for(&llm), Arc::new(tools));

    let report = executor
        .run("Try the flaky tool", &empty_context(), ExecutorConfig::default())
        .await
        .unwrap();

    assert!(report.success);
    let requests = llm.captured_requests().await;
    assert!(
        requests[1].iter().any(|m| {
            m.role == Role::Tool && m.content.contains("backing service rejected")
        }),
        "tool error text should become the next context turn"
    );
}

#[tokio::test]
async fn unknown_tool_name_is_recovered_conversationally() {
    let llm = MockLlmClient::from_steps(
        "mock-model",
        vec![
            MockStep::tool_call("call_1", "no_such_tool", json!({})),
            MockStep::text("Understood, answering directly"),
        ],
    );
    let executor = AgentExecutor::new(handle_for(&llm), Arc::new(ToolRegistry::new()));

    let report = executor
        .run("Go", &empty_context(), ExecutorConfig::default())
        .await
        .unwrap();

    assert!(report.success);
    let requests = llm.captured_requests().await;
    assert!(
        requests[1]
            .iter()
            .any(|m| m.role == Role::Tool && m.content.contains("not available"))
    );
}

#[tokio::test]
async fn parse_failure_retries_with_correction_then_succeeds() {
    let llm = MockLlmClient::from_steps(
        "mock-model",
        vec![
            // Attempted invocation, malformed JSON
            MockStep::text(r#"{"tool": "echo", "argum"#),
            MockStep::text("Second try answer"),
        ],
    );
    let executor = AgentExecutor::new(handle_for(&llm), Arc::new(ToolRegistry::new()));

    let report = executor
        .run("Go", &empty_context(), ExecutorConfig::default())
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.answer.as_deref(), Some("Second try answer"));
    assert_eq!(llm.call_count(), 2);

    let requests = llm.captured_requests().await;
    assert!(
        requests[1].iter().any(|m| {
            m.role == Role::System && m.content.contains("could not be interpreted")
        }),
        "second request should carry the corrective re-prompt"
    );
}

#[tokio::test]
async fn exhausted_parse_retries_fail_with_parse_reason() {
    let malformed = || MockStep::text(r#"{"tool": "broken"#);
    let llm = MockLlmClient::from_steps(
        "mock-model",
        vec![malformed(), malformed(), malformed()],
    );
    let executor = AgentExecutor::new(handle_for(&llm), Arc::new(ToolRegistry::new()));

    let report = executor
        .run(
            "Go",
            &empty_context(),
            ExecutorConfig::default().with_parse_retry_limit(3),
        )
        .await
        .unwrap();

    assert!(!report.success);
    assert!(matches!(report.state.status, RunStatus::FailedParse { .. }));
    assert!(report.error.is_some());
    assert_eq!(llm.call_count(), 3);
}

#[tokio::test]
async fn iteration_bound_terminates_the_loop() {
    let calls = Arc::new(AtomicUsize::new(0));
    let step = |i: usize| MockStep::tool_call(format!("call_{i}"), "counter", json!({}));
    let llm = MockLlmClient::from_steps("mock-model", vec![step(1), step(2), step(3)]);
    let mut tools = ToolRegistry::new();
    tools.register(CountingTool {
        calls: calls.clone(),
    });
    let executor = AgentExecutor::new(handle_for(&llm), Arc::new(tools));

    let report = executor
        .run(
            "Loop forever",
            &empty_context(),
            ExecutorConfig::default().with_max_iterations(2),
        )
        .await
        .unwrap();

    assert!(!report.success);
    assert!(matches!(report.state.status, RunStatus::FailedBound { .. }));
    assert!(report.error.unwrap().contains("Max iterations"));
    assert_eq!(llm.call_count(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    // Partial transcript survives for diagnostics.
    assert!(!report.state.messages.is_empty());
}

#[tokio::test]
async fn wall_clock_bound_is_checked_before_the_model_call() {
    let llm = MockLlmClient::from_steps("mock-model", vec![MockStep::text("never sent")]);
    let executor = AgentExecutor::new(handle_for(&llm), Arc::new(ToolRegistry::new()));

    let report = executor
        .run(
            "Go",
            &empty_context(),
            ExecutorConfig::default().with_max_execution_time(Duration::ZERO),
        )
        .await
        .unwrap();

    assert!(!report.success);
    assert!(matches!(report.state.status, RunStatus::FailedBound { .. }));
    assert!(report.error.unwrap().contains("time limit"));
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn backend_failure_surfaces_as_error() {
    let llm = MockLlmClient::from_steps("mock-model", vec![MockStep::error("backend down")]);
    let executor = AgentExecutor::new(handle_for(&llm), Arc::new(ToolRegistry::new()));

    let result = executor
        .run("Go", &empty_context(), ExecutorConfig::default())
        .await;

    assert!(matches!(result, Err(AiError::Backend(_))));
}

#[tokio::test]
async fn working_context_and_system_prompt_shape_the_request() {
    let llm = MockLlmClient::from_steps("mock-model", vec![MockStep::text("ok")]);
    let executor = AgentExecutor::new(handle_for(&llm), Arc::new(ToolRegistry::new()));

    let mut memory = ConversationMemory::new(1000);
    memory.append_turn(Turn::user("earlier question"));
    memory.append_turn(Turn::assistant("earlier answer"));

    executor
        .run(
            "new question",
            &memory.working_context(),
            ExecutorConfig::default().with_system_prompt("You are a careful assistant"),
        )
        .await
        .unwrap();

    let requests = llm.captured_requests().await;
    let messages = &requests[0];
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages[1].content, "earlier question");
    assert_eq!(messages[2].content, "earlier answer");
    assert_eq!(messages[3].content, "new question");
}

#[tokio::test]
async fn serving_path_appends_the_result_back_into_memory() {
    let sessions = SessionManager::new(1000);
    let llm = MockLlmClient::from_steps("mock-model", vec![MockStep::text("the capital is Paris")]);
    let executor = AgentExecutor::new(handle_for(&llm), Arc::new(ToolRegistry::new()));

    let memory = sessions.memory("conv-42");
    let user_message = "What is the capital of France?";

    let context = memory.lock().await.working_context();
    let report = executor
        .run(user_message, &context, ExecutorConfig::default())
        .await
        .unwrap();

    let answer = report.answer.clone().unwrap();
    {
        let mut memory = memory.lock().await;
        memory.append_turn(Turn::user(user_message));
        memory.append_turn(Turn::assistant(&answer));
    }

    let context = memory.lock().await.working_context();
    assert_eq!(context.turns.len(), 2);
    assert_eq!(context.turns[1].content, "the capital is Paris");
}
