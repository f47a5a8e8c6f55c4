//! Model-output extraction, JSON5-tolerant plan decoding, reference
//! normalization, and template-string compilation.

use crate::error::ParseError;
use crate::plan::types::{Plan, PlanStep, fresh_step_id};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// The `<think>`/`<plan>` split of raw model output. Either half may be
/// absent — a model that skips the `<think>` preamble, or one that emits
/// the plan body with no wrapping tag at all, are both tolerated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedModelOutput {
    pub think: Option<String>,
    pub plan: Option<String>,
}

fn think_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>(.*?)</think>").unwrap())
}

fn plan_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<plan>(.*?)</plan>").unwrap())
}

/// Splits raw model output into its `<think>` and `<plan>` sections via
/// non-greedy tag matching. Neither tag is required.
pub fn parse_model_output(raw: &str) -> ParsedModelOutput {
    let think = think_regex()
        .captures(raw)
        .map(|c| c[1].trim().to_string());
    let plan = plan_tag_regex()
        .captures(raw)
        .map(|c| c[1].trim().to_string());
    ParsedModelOutput { think, plan }
}

/// Locates the first bracket-delimited `[...]` payload in `text`, matching
/// nested brackets and skipping bracket characters that occur inside string
/// literals.
pub fn find_json_payload(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('[')?;

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i] as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if b == '\\' {
                escaped = true;
            } else if b == '"' {
                in_string = false;
            }
        } else {
            match b {
                '"' => in_string = true,
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..=i]);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// The raw, model-authored shape of a dependency reference: a zero-based
/// index into the *input* plan array rather than the fresh id assigned to
/// that step.
fn raw_dependency_index(value: &Value) -> Option<(i64, String)> {
    let obj = value.as_object()?;
    let from_step = obj.get("fromStep")?.as_i64()?;
    let output_key = obj.get("outputKey")?.as_str()?.to_string();
    if obj.len() == 2 {
        Some((from_step, output_key))
    } else {
        None
    }
}

fn template_placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{(\d+)(?:\.([^}]+))?\}").unwrap())
}

/// Compiles a raw template string (placeholders of the form `{stepIndex}`
/// or `{stepIndex.path}`) into the canonical `{$fromTemplateString,
/// $values}` shape, renumbering placeholders positionally into `$values`.
/// Placeholders whose step index has no corresponding entry in `index_map`
/// are left verbatim in the text and are not added to `$values`. If not a
/// single placeholder resolves, the original string is returned unchanged.
fn compile_template_string(raw: &str, index_map: &[String]) -> Value {
    let mut values = Vec::new();
    let mut rewritten = String::with_capacity(raw.len());
    let mut last_end = 0;

    for capture in template_placeholder_regex().captures_iter(raw) {
        let whole = capture.get(0).unwrap();
        let step_index: usize = capture[1].parse().unwrap_or(usize::MAX);
        let path = capture.get(2).map(|m| m.as_str().to_string());

        rewritten.push_str(&raw[last_end..whole.start()]);

        match index_map.get(step_index) {
            Some(id) => {
                let mut reference = Map::new();
                reference.insert("$fromStep".to_string(), Value::String(id.clone()));
                reference.insert(
                    "$outputKey".to_string(),
                    Value::String(path.as_deref().map(crate::path::normalize).unwrap_or_default()),
                );
                values.push(Value::Object(reference));
                rewritten.push('{');
                rewritten.push_str(&(values.len() - 1).to_string());
                rewritten.push('}');
            }
            None => rewritten.push_str(whole.as_str()),
        }

        last_end = whole.end();
    }
    rewritten.push_str(&raw[last_end..]);

    if values.is_empty() {
        Value::String(raw.to_string())
    } else {
        let mut obj = Map::new();
        obj.insert("$fromTemplateString".to_string(), Value::String(rewritten));
        obj.insert("$values".to_string(), Value::Array(values));
        Value::Object(obj)
    }
}

/// Recursively rewrites an argument tree: raw index-based dependency
/// references become canonical `$fromStep`/`$outputKey` objects, template
/// strings are compiled, everything else is left untouched.
fn transform_params_value(
    value: &Value,
    index_map: &[String],
) -> Result<Value, ParseError> {
    if let Some((index, output_key)) = raw_dependency_index(value) {
        let id = index_map
            .get(usize::try_from(index).unwrap_or(usize::MAX))
            .ok_or(ParseError::UnknownStepIndex { index })?;
        let mut obj = Map::new();
        obj.insert("$fromStep".to_string(), Value::String(id.clone()));
        obj.insert("$outputKey".to_string(), Value::String(crate::path::normalize(&output_key)));
        return Ok(Value::Object(obj));
    }

    match value {
        Value::String(s) => Ok(compile_template_string(s, index_map)),
        Value::Array(items) => {
            let transformed = items
                .iter()
                .map(|item| transform_params_value(item, index_map))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(transformed))
        }
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, item) in map {
                out.insert(key.clone(), transform_params_value(item, index_map)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

/// Decodes a JSON5-tolerant plan payload (array of `{toolName, arguments,
/// thought?}` entries) into [`PlanStep`]s: assigns each entry a fresh id,
/// then rewrites argument trees so every reference is keyed by id rather
/// than input-array position.
pub fn parse_plan_steps(text: &str) -> Result<Vec<PlanStep>, ParseError> {
    let payload = find_json_payload(text).ok_or(ParseError::NoPayload)?;
    let raw: Value = json5::from_str(payload).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let entries = raw.as_array().ok_or_else(|| ParseError::InvalidJson(
        "plan payload must be a JSON array of steps".to_string(),
    ))?;

    let index_map: Vec<String> = (0..entries.len()).map(|_| fresh_step_id()).collect();

    let mut steps = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let tool_name = entry
            .get("toolName")
            .and_then(Value::as_str)
            .ok_or_else(|| ParseError::MalformedStep {
                index,
                message: "missing string field `toolName`".to_string(),
            })?
            .to_string();

        let raw_arguments = entry.get("arguments").cloned().unwrap_or(Value::Object(Map::new()));
        if !raw_arguments.is_object() {
            return Err(ParseError::MalformedStep {
                index,
                message: "`arguments` must be an object".to_string(),
            });
        }

        let arguments = transform_params_value(&raw_arguments, &index_map)?;
        let thought = entry.get("thought").and_then(Value::as_str).map(str::to_string);

        let mut step = PlanStep::new(index_map[index].clone(), tool_name, arguments);
        step.thought = thought;
        steps.push(step);
    }

    Ok(steps)
}

/// Top-level entry point: splits `<think>`/`<plan>` sections (falling back
/// to the whole string when no `<plan>` tag is present), then decodes the
/// step array.
pub fn parse_plan(raw: &str) -> Result<Plan, ParseError> {
    let parsed = parse_model_output(raw);
    let body = parsed.plan.as_deref().unwrap_or(raw);
    let steps = parse_plan_steps(body)?;
    Ok(Plan::new(steps))
}
