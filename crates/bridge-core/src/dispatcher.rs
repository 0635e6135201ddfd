//! Function call accumulation, invocation and result dispatch (C6).
//!
//! The `Tool` trait replaces a dynamic-dispatch-by-name function registry
//! with a typed interface (spec.md §9's redesign point), grounded on the
//! named-method-plus-`async_trait` shape of
//! `session-core/src/api/uas/handler.rs`'s `CallHandler`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::error::{BridgeError, Result};

/// One function the realtime peer may invoke mid-call.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Run the tool with the realtime peer's parsed argument object,
    /// returning the JSON result to send back as `output`.
    async fn invoke(&self, arguments: Value) -> std::result::Result<Value, String>;
}

/// A registry of tools available to the realtime peer for one call.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }
}

/// A tool call whose arguments are still streaming in via
/// `response.function_call_arguments.delta` events.
#[derive(Debug, Clone, Default)]
pub struct PendingToolCall {
    pub call_id: String,
    pub item_id: String,
    pub name: String,
    pub arguments_buffer: String,
}

impl PendingToolCall {
    pub fn new(call_id: impl Into<String>, item_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), item_id: item_id.into(), name: name.into(), arguments_buffer: String::new() }
    }

    pub fn push_delta(&mut self, delta: &str) {
        self.arguments_buffer.push_str(delta);
    }
}

/// Accumulates in-flight tool calls for one call and invokes registered
/// tools once their arguments are complete.
///
/// Spec.md §13's resolved open question: concurrent `function_call` items
/// within one response are detected and logged, not prevented — a second
/// `item_id` simply gets its own accumulator entry.
pub struct FunctionCallDispatcher {
    registry: ToolRegistry,
    pending: HashMap<String, PendingToolCall>,
    /// Function names captured from `response.output_item.added`, keyed by
    /// `item_id` since `call_id` isn't known until the first arguments
    /// delta arrives (spec.md §4.6/§4.7).
    names_by_item: HashMap<String, String>,
    tool_timeout: std::time::Duration,
}

/// Default tool invocation budget (spec.md §5).
pub const DEFAULT_TOOL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

impl FunctionCallDispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self::with_tool_timeout(registry, DEFAULT_TOOL_TIMEOUT)
    }

    pub fn with_tool_timeout(registry: ToolRegistry, tool_timeout: std::time::Duration) -> Self {
        Self { registry, pending: HashMap::new(), names_by_item: HashMap::new(), tool_timeout }
    }

    /// Record the function name for a `function_call` output item, ahead
    /// of any arguments deltas arriving for it (spec.md §4.7's behavior
    /// table row for `response.output_item.added`).
    pub fn note_function_call(&mut self, item_id: &str, name: &str) {
        self.names_by_item.insert(item_id.to_string(), name.to_string());
    }

    /// Begin (or continue) accumulating a tool call's arguments, keyed by
    /// `call_id` (spec.md §3's data model). `item_id` is used to spot a
    /// second function-call item arriving concurrently within the same
    /// response (logged rather than rejected, spec.md §13) and to recover
    /// the name captured via [`Self::note_function_call`].
    pub fn accumulate(&mut self, item_id: &str, call_id: &str, delta: &str) {
        if !self.pending.is_empty() && !self.pending.contains_key(call_id) {
            warn!(item_id, call_id, "concurrent function_call item detected in one response");
        }
        let name = self.names_by_item.get(item_id).cloned().unwrap_or_default();
        let entry = self
            .pending
            .entry(call_id.to_string())
            .or_insert_with(|| PendingToolCall::new(call_id, item_id, name));
        entry.push_delta(delta);
    }

    /// Arguments are complete for `call_id`. `name` and `final_arguments`
    /// come straight off the `response.function_call_arguments.done` event
    /// and take priority over anything accumulated so far (spec.md §4.6:
    /// "preferring the `arguments` field from the `done` event over the
    /// accumulated buffer"). Always resolves to a result to send back —
    /// an unregistered tool, invalid arguments, a tool exception or a
    /// timeout all become `{error: ...}` payloads rather than failing the
    /// call (spec.md §4.6/§7: "the conversation never stalls").
    pub async fn complete(&mut self, call_id: &str, name: &str, final_arguments: &str) -> Result<(String, String)> {
        let mut call = self
            .pending
            .remove(call_id)
            .ok_or_else(|| BridgeError::ToolFailed(format!("no pending call for {call_id}")))?;
        self.names_by_item.remove(&call.item_id);

        if !name.is_empty() {
            call.name = name.to_string();
        }
        if !final_arguments.is_empty() {
            call.arguments_buffer = final_arguments.to_string();
        }

        let output = self.invoke_tool(&call).await;
        Ok((call.call_id, output))
    }

    /// Resolve a completed call to its JSON result string, never failing:
    /// every failure mode is reported back as an `{error: ...}` object.
    async fn invoke_tool(&self, call: &PendingToolCall) -> String {
        let tool = match self.registry.get(&call.name) {
            Some(tool) => tool,
            None => {
                warn!(function = %call.name, "tool call for unregistered function");
                return error_result("not_implemented", Some(&call.name));
            }
        };

        let arguments: Value = match serde_json::from_str(&call.arguments_buffer) {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %err, function = %call.name, "invalid tool call arguments");
                return error_result("invalid_arguments", None);
            }
        };

        match tokio::time::timeout(self.tool_timeout, tool.invoke(arguments)).await {
            Ok(Ok(output)) => output.to_string(),
            Ok(Err(message)) => {
                warn!(function = %call.name, message = %message, "tool invocation failed");
                error_result(&message, None)
            }
            Err(_) => {
                warn!(function = %call.name, timeout = ?self.tool_timeout, "tool invocation timed out");
                error_result("timeout", None)
            }
        }
    }
}

fn error_result(error: &str, function: Option<&str>) -> String {
    match function {
        Some(function) => serde_json::json!({ "error": error, "function": function }).to_string(),
        None => serde_json::json!({ "error": error }).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn invoke(&self, arguments: Value) -> std::result::Result<Value, String> {
            Ok(arguments)
        }
    }

    #[tokio::test]
    async fn accumulates_and_invokes_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        let mut dispatcher = FunctionCallDispatcher::new(registry);

        dispatcher.note_function_call("item1", "echo");
        dispatcher.accumulate("item1", "call1", r#"{"x":"#);
        dispatcher.accumulate("item1", "call1", r#"1}"#);

        let (call_id, output) = dispatcher.complete("call1", "", "").await.unwrap();
        assert_eq!(call_id, "call1");
        assert_eq!(output, r#"{"x":1}"#);
    }

    #[tokio::test]
    async fn done_arguments_take_priority_over_the_accumulated_buffer() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        let mut dispatcher = FunctionCallDispatcher::new(registry);

        dispatcher.accumulate("item1", "call1", r#"{"stale":true}"#);
        let (_, output) = dispatcher.complete("call1", "echo", r#"{"fresh":true}"#).await.unwrap();
        assert_eq!(output, r#"{"fresh":true}"#);
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_as_an_error_result_not_a_failure() {
        let mut dispatcher = FunctionCallDispatcher::new(ToolRegistry::new());
        dispatcher.accumulate("item1", "call1", "{}");
        let (call_id, output) = dispatcher.complete("call1", "nonexistent", "{}").await.unwrap();
        assert_eq!(call_id, "call1");
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["error"], "not_implemented");
        assert_eq!(value["function"], "nonexistent");
    }

    #[tokio::test]
    async fn invalid_arguments_json_is_reported_as_an_error_result() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));
        let mut dispatcher = FunctionCallDispatcher::new(registry);
        dispatcher.accumulate("item1", "call1", "not json");
        let (_, output) = dispatcher.complete("call1", "echo", "").await.unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["error"], "invalid_arguments");
    }

    #[tokio::test]
    async fn completing_unknown_item_is_still_an_error() {
        let mut dispatcher = FunctionCallDispatcher::new(ToolRegistry::new());
        assert!(dispatcher.complete("missing", "echo", "{}").await.is_err());
    }

    struct Slow;

    #[async_trait]
    impl Tool for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn invoke(&self, _arguments: Value) -> std::result::Result<Value, String> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn tool_exceeding_its_budget_is_reported_as_an_error_result() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Slow));
        let mut dispatcher = FunctionCallDispatcher::with_tool_timeout(registry, std::time::Duration::from_millis(5));
        dispatcher.accumulate("item1", "call1", "{}");
        let (_, output) = dispatcher.complete("call1", "slow", "{}").await.unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["error"], "timeout");
    }
}
