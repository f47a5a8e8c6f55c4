//! Wave-based concurrent DAG executor: computes the ready set of steps
//! whose dependencies are satisfied, dispatches all of them concurrently,
//! awaits the wave, and repeats until nothing more can run.

use crate::path::{extract_dependency_step_ids, get_nested_value_str, is_dependency_reference, is_template_reference};
use crate::plan::types::{Plan, PlanStep, StepResult, StepStatus, ToolCatalog};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

fn value_placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{(\d+)\}").unwrap())
}

/// Renders a resolved value to the string a template interpolates: strings
/// pass through unquoted, other primitives use their natural textual form,
/// objects/arrays use compact JSON. Stringification of non-primitives is
/// informative behavior, not a normative wire format.
fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Resolves an argument tree against completed step outputs: dependency
/// references become the referenced (possibly nested) output value,
/// template references become the rendered string, everything else is
/// copied as-is. Fails only defensively — the scheduler never dispatches a
/// step whose dependencies are not already `done`, so a missing output here
/// means the plan graph was malformed in a way validation should have caught.
pub fn resolve_value(value: &Value, outputs: &HashMap<String, Value>) -> Result<Value, String> {
    if is_dependency_reference(value) {
        let from_step = value["$fromStep"].as_str().unwrap_or_default();
        let output_key = value.get("$outputKey").and_then(Value::as_str);
        let Some(output) = outputs.get(from_step) else {
            return Err(format!("Step {from_step} output not found"));
        };
        return Ok(match output_key {
            Some(key) => get_nested_value_str(output, key).cloned().unwrap_or(Value::Null),
            None => output.clone(),
        });
    }

    if is_template_reference(value) {
        let template = value["$fromTemplateString"].as_str().unwrap_or_default();
        let values: Vec<Value> = value["$values"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .map(|v| resolve_value(v, outputs))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rendered = String::with_capacity(template.len());
        let mut last_end = 0;
        for capture in value_placeholder_regex().captures_iter(template) {
            let whole = capture.get(0).unwrap();
            rendered.push_str(&template[last_end..whole.start()]);
            let index: usize = capture[1].parse().unwrap_or(usize::MAX);
            match values.get(index) {
                Some(v) => rendered.push_str(&stringify_value(v)),
                None => rendered.push_str(whole.as_str()),
            }
            last_end = whole.end();
        }
        rendered.push_str(&template[last_end..]);
        return Ok(Value::String(rendered));
    }

    match value {
        Value::Array(items) => Ok(Value::Array(
            items.iter().map(|v| resolve_value(v, outputs)).collect::<Result<Vec<_>, _>>()?,
        )),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), resolve_value(v, outputs)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

enum TaskOutcome {
    Settled {
        step_id: String,
        tool_name: String,
        resolved_arguments: Value,
        outcome: anyhow::Result<Value>,
    },
    Skipped {
        step_id: String,
        tool_name: String,
        error: String,
    },
}

/// Executes a plan to completion: unbounded per-wave concurrency unless
/// `max_parallel_steps` caps a wave into sequential sub-waves (a scheduling
/// courtesy only — it never changes which steps are allowed to run
/// together, just how many run at once). Steps left `pending` once no
/// further progress is possible (including plans with a dependency cycle)
/// are reaped as `skipped` rather than left to hang.
pub async fn execute_plan_with_limit(
    plan: &Plan,
    tools: &ToolCatalog,
    max_parallel_steps: Option<usize>,
) -> Vec<StepResult> {
    let mut status: HashMap<String, StepStatus> = plan
        .steps
        .iter()
        .map(|s| (s.id.clone(), StepStatus::Pending))
        .collect();
    let mut outputs: HashMap<String, Value> = HashMap::new();
    let mut results: HashMap<String, StepResult> = HashMap::new();

    loop {
        let ready: Vec<&PlanStep> = plan
            .steps
            .iter()
            .filter(|s| status.get(&s.id) == Some(&StepStatus::Pending))
            .filter(|s| {
                extract_dependency_step_ids(&s.arguments)
                    .iter()
                    .all(|dep| status.get(dep) == Some(&StepStatus::Done))
            })
            .collect();

        if ready.is_empty() {
            break;
        }

        info!(count = ready.len(), "dispatching wave");
        for step in &ready {
            status.insert(step.id.clone(), StepStatus::Executing);
        }

        let chunk_size = max_parallel_steps.filter(|c| *c > 0).unwrap_or(ready.len());
        for chunk in ready.chunks(chunk_size) {
            let mut set = JoinSet::new();
            for step in chunk {
                let step_id = step.id.clone();
                let tool_name = step.tool_name.clone();

                let Some(tool) = tools.get(&step.tool_name).cloned() else {
                    set.spawn(async move {
                        TaskOutcome::Skipped {
                            step_id,
                            tool_name: tool_name.clone(),
                            error: format!("Tool \"{tool_name}\" not found"),
                        }
                    });
                    continue;
                };

                let resolved_arguments = match resolve_value(&step.arguments, &outputs) {
                    Ok(args) => args,
                    Err(message) => {
                        set.spawn(async move {
                            TaskOutcome::Skipped {
                                step_id,
                                tool_name,
                                error: format!("Failed to resolve arguments: {message}"),
                            }
                        });
                        continue;
                    }
                };
                let args_for_call = resolved_arguments.clone();

                set.spawn(async move {
                    let outcome = tool.handler.call(args_for_call).await;
                    TaskOutcome::Settled {
                        step_id,
                        tool_name,
                        resolved_arguments,
                        outcome,
                    }
                });
            }

            while let Some(joined) = set.join_next().await {
                match joined.expect("tool task panicked") {
                    TaskOutcome::Settled {
                        step_id,
                        tool_name,
                        resolved_arguments,
                        outcome,
                    } => match outcome {
                        Ok(output) => {
                            debug!(step = %step_id, "step completed");
                            outputs.insert(step_id.clone(), output.clone());
                            status.insert(step_id.clone(), StepStatus::Done);
                            results.insert(
                                step_id.clone(),
                                StepResult {
                                    step_id,
                                    tool_name,
                                    arguments: resolved_arguments,
                                    output: Some(output),
                                    error: None,
                                },
                            );
                        }
                        Err(e) => {
                            warn!(step = %step_id, error = %e, "step failed");
                            status.insert(step_id.clone(), StepStatus::Failed);
                            results.insert(
                                step_id.clone(),
                                StepResult {
                                    step_id,
                                    tool_name,
                                    arguments: resolved_arguments,
                                    output: None,
                                    error: Some(e.to_string()),
                                },
                            );
                        }
                    },
                    TaskOutcome::Skipped { step_id, tool_name, error } => {
                        warn!(step = %step_id, %error, "step skipped before dispatch");
                        status.insert(step_id.clone(), StepStatus::Skipped);
                        results.insert(
                            step_id.clone(),
                            StepResult {
                                step_id,
                                tool_name,
                                arguments: Value::Object(serde_json::Map::new()),
                                output: None,
                                error: Some(error),
                            },
                        );
                    }
                }
            }
        }
    }

    for step in &plan.steps {
        if status.get(&step.id) == Some(&StepStatus::Pending) {
            warn!(step = %step.id, "skipping: dependencies never satisfied");
            status.insert(step.id.clone(), StepStatus::Skipped);
            results.insert(step.id.clone(), StepResult::skipped(step));
        }
    }

    plan.steps
        .iter()
        .map(|s| results.remove(&s.id).expect("every step produces a result"))
        .collect()
}

/// Convenience wrapper over [`execute_plan_with_limit`] with no parallelism
/// cap — the default, and what spec-level concurrency semantics describe.
pub async fn execute_plan(plan: &Plan, tools: &ToolCatalog) -> Vec<StepResult> {
    execute_plan_with_limit(plan, tools, None).await
}
