//! Plan/step/tool value types — the vocabulary shared by the parser,
//! validator, and executor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A tool's executable side, adapted from the teacher's `Tool` trait
/// (`src/tools/traits.rs`) with the approval/middleware machinery dropped —
/// this crate's tool contract is the spec's plain `handler(args) -> output`.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value) -> anyhow::Result<Value>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        (self)(args).await
    }
}

/// One entry of a [`ToolCatalog`]: a name, its input/output JSON-Schema
/// documents, and the handler that executes it.
#[derive(Clone)]
pub struct ToolDef {
    pub name: String,
    pub input_schema: Value,
    pub output_schema: Value,
    pub handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for ToolDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDef")
            .field("name", &self.name)
            .field("input_schema", &self.input_schema)
            .field("output_schema", &self.output_schema)
            .finish_non_exhaustive()
    }
}

/// Adapted from the teacher's `ToolRegistry` (`src/tools/registry.rs`),
/// stripped of its middleware/approval chain: this crate's validator and
/// executor only need name → definition lookup.
#[derive(Clone, Default)]
pub struct ToolCatalog {
    tools: HashMap<String, ToolDef>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: ToolDef) {
        self.tools.insert(tool.name.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&ToolDef> {
        self.tools.get(name)
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

/// Mirrors the teacher's `core::planner::types::StepStatus`. `Timeout` is
/// carried as a reserved slot (spec §5 notes this taxonomy extension point)
/// but nothing in this crate ever produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Executing,
    Done,
    Failed,
    Skipped,
    Timeout,
}

/// One step of a parsed plan. `arguments` is a raw `serde_json::Value` tree
/// that may still contain dependency/template references at parse time and
/// is replaced with resolved values during execution — the teacher takes
/// the same approach with `StepAction::ToolCall { args: serde_json::Value }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub tool_name: String,
    pub arguments: Value,
    #[serde(default)]
    pub thought: Option<String>,
    pub status: StepStatus,
}

impl PlanStep {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
            thought: None,
            status: StepStatus::Pending,
        }
    }
}

/// An ordered sequence of steps. Ordering is informational for result
/// output only — it carries no execution-order guarantee (spec §5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }
}

/// The wire shape of one step's outcome, ordered to match the plan's input
/// order in the final report (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub tool_name: String,
    pub arguments: Value,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl StepResult {
    pub fn done(step: &PlanStep, resolved_arguments: Value, output: Value) -> Self {
        Self {
            step_id: step.id.clone(),
            tool_name: step.tool_name.clone(),
            arguments: resolved_arguments,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(step: &PlanStep, resolved_arguments: Value, error: impl Into<String>) -> Self {
        Self {
            step_id: step.id.clone(),
            tool_name: step.tool_name.clone(),
            arguments: resolved_arguments,
            output: None,
            error: Some(error.into()),
        }
    }

    pub fn skipped(step: &PlanStep) -> Self {
        Self {
            step_id: step.id.clone(),
            tool_name: step.tool_name.clone(),
            arguments: step.arguments.clone(),
            output: None,
            error: Some("Skipped: dependencies not satisfied".to_string()),
        }
    }
}

/// Generates a fresh step identifier. Any scheme with enough entropy to
/// avoid collisions within one plan suffices; this crate uses UUID v4 as
/// the teacher does for session/message ids.
pub fn fresh_step_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn call(&self, args: Value) -> anyhow::Result<Value> {
            Ok(args)
        }
    }

    #[test]
    fn catalog_registers_and_looks_up_by_name() {
        let mut catalog = ToolCatalog::new();
        catalog.register(ToolDef {
            name: "echo".to_string(),
            input_schema: json!({"type": "object"}),
            output_schema: json!({"type": "object"}),
            handler: Arc::new(Echo),
        });

        assert!(catalog.get("echo").is_some());
        assert!(catalog.get("missing").is_none());
        assert_eq!(catalog.tool_names(), vec!["echo"]);
    }

    #[test]
    fn fresh_step_id_produces_unique_values() {
        let a = fresh_step_id();
        let b = fresh_step_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn step_result_skipped_carries_fixed_message() {
        let step = PlanStep::new("s1", "echo", json!({}));
        let result = StepResult::skipped(&step);
        assert_eq!(result.error.as_deref(), Some("Skipped: dependencies not satisfied"));
        assert!(result.output.is_none());
    }

    #[tokio::test]
    async fn echo_handler_roundtrips_args() {
        let handler: Arc<dyn ToolHandler> = Arc::new(Echo);
        let out = handler.call(json!({"a": 1})).await.unwrap();
        assert_eq!(out, json!({"a": 1}));
    }
}
