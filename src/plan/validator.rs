//! Static validation: dependency-reference and template-reference checking
//! against each step's declared tool schemas, without executing anything.

use crate::path::{self, Path, traverse_references};
use crate::plan::schema::{self, SchemaNode, TypeTag, string_coercible_set};
use crate::plan::types::{Plan, ToolCatalog};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorCode {
    SchemaParseError,
    ToolNotFound,
    DependencyStepMissing,
    InputKeyMissing,
    OutputKeyMissing,
    TypeMismatch,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanValidationError {
    pub code: ValidationErrorCode,
    pub step_id: String,
    pub tool_name: Option<String>,
    pub argument_path: Option<String>,
    pub from_step_id: Option<String>,
    pub output_path: Option<String>,
    pub expected_type: Option<String>,
    pub actual_type: Option<String>,
    pub message: String,
}

impl PlanValidationError {
    fn new(code: ValidationErrorCode, step_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            step_id: step_id.into(),
            tool_name: None,
            argument_path: None,
            from_step_id: None,
            output_path: None,
            expected_type: None,
            actual_type: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<PlanValidationError>,
}

fn type_tags_to_string(tags: &std::collections::BTreeSet<TypeTag>) -> String {
    let mut names: Vec<&str> = tags
        .iter()
        .map(|t| match t {
            TypeTag::Any => "any",
            TypeTag::Unknown => "unknown",
            TypeTag::String => "string",
            TypeTag::Number => "number",
            TypeTag::Boolean => "boolean",
            TypeTag::Null => "null",
            TypeTag::Array => "array",
            TypeTag::Object => "object",
        })
        .collect();
    names.sort_unstable();
    names.join("|")
}

/// Validates every step's argument tree against its tool's input schema and
/// every referenced step's output schema. Returns a collected report: this
/// crate never raises an exception for a validation finding — see
/// [`crate::error::ParseError`] for what *does* remain fatal.
pub fn is_valid_plan(plan: &Plan, tools: &ToolCatalog) -> ValidationReport {
    let mut errors = Vec::new();

    for step in &plan.steps {
        let Some(tool) = tools.get(&step.tool_name) else {
            let mut err = PlanValidationError::new(
                ValidationErrorCode::ToolNotFound,
                step.id.clone(),
                format!("tool `{}` is not registered", step.tool_name),
            );
            err.tool_name = Some(step.tool_name.clone());
            errors.push(err);
            continue;
        };

        let input_schema = match schema::compile(&tool.input_schema) {
            Ok(node) => node,
            Err(e) => {
                let mut err = PlanValidationError::new(
                    ValidationErrorCode::SchemaParseError,
                    step.id.clone(),
                    format!("input schema for `{}`: {e}", step.tool_name),
                );
                err.tool_name = Some(step.tool_name.clone());
                errors.push(err);
                continue;
            }
        };

        let step_errors = std::cell::RefCell::new(Vec::new());

        let mut on_dependency = |reference: &Value, arg_path: &Path| {
            check_dependency_reference(
                reference,
                arg_path,
                step,
                &input_schema,
                plan,
                tools,
                &step_errors,
            );
        };
        let mut on_template = |reference: &Value, arg_path: &Path| {
            check_template_reference(reference, arg_path, step, plan, tools, &step_errors);
        };

        traverse_references(&step.arguments, &mut on_dependency, &mut on_template, &Path::root());
        errors.extend(step_errors.into_inner());
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

fn referenced_output_schema(
    from_step_id: &str,
    plan: &Plan,
    tools: &ToolCatalog,
) -> Result<Option<SchemaNode>, String> {
    let Some(from_step) = plan.step(from_step_id) else {
        return Ok(None);
    };
    let Some(tool) = tools.get(&from_step.tool_name) else {
        return Ok(None);
    };
    schema::compile(&tool.output_schema)
        .map(Some)
        .map_err(|e| e.to_string())
}

#[allow(clippy::too_many_arguments)]
fn check_dependency_reference(
    reference: &Value,
    arg_path: &Path,
    step: &crate::plan::types::PlanStep,
    input_schema: &SchemaNode,
    plan: &Plan,
    tools: &ToolCatalog,
    errors: &std::cell::RefCell<Vec<PlanValidationError>>,
) {
    let from_step_id = reference["$fromStep"].as_str().unwrap_or_default().to_string();
    let output_key = reference.get("$outputKey").and_then(Value::as_str);

    let expected = schema::schema_at_path(input_schema, arg_path);
    let Some(expected) = expected else {
        let mut err = PlanValidationError::new(
            ValidationErrorCode::InputKeyMissing,
            step.id.clone(),
            format!("argument path `{arg_path}` is not in `{}`'s input schema", step.tool_name),
        );
        err.tool_name = Some(step.tool_name.clone());
        err.argument_path = Some(arg_path.to_string());
        errors.borrow_mut().push(err);
        return;
    };

    if plan.step(&from_step_id).is_none() {
        let mut err = PlanValidationError::new(
            ValidationErrorCode::DependencyStepMissing,
            step.id.clone(),
            format!("references unknown step `{from_step_id}`"),
        );
        err.tool_name = Some(step.tool_name.clone());
        err.argument_path = Some(arg_path.to_string());
        err.from_step_id = Some(from_step_id);
        errors.borrow_mut().push(err);
        return;
    }

    let output_schema = match referenced_output_schema(&from_step_id, plan, tools) {
        Ok(schema) => schema,
        Err(message) => {
            let mut err = PlanValidationError::new(
                ValidationErrorCode::SchemaParseError,
                step.id.clone(),
                message,
            );
            err.from_step_id = Some(from_step_id);
            errors.borrow_mut().push(err);
            return;
        }
    };
    let Some(output_schema) = output_schema else {
        // referenced step's tool is itself unregistered; already reported
        // as a tool_not_found error on that step.
        return;
    };

    let output_path = output_key.map(path::parse).unwrap_or_default();
    let actual = schema::schema_at_path(&output_schema, &output_path);
    let Some(actual) = actual else {
        let mut err = PlanValidationError::new(
            ValidationErrorCode::OutputKeyMissing,
            step.id.clone(),
            format!(
                "`{}` has no output key `{}`",
                from_step_id,
                output_key.unwrap_or("")
            ),
        );
        err.tool_name = Some(step.tool_name.clone());
        err.argument_path = Some(arg_path.to_string());
        err.from_step_id = Some(from_step_id);
        err.output_path = output_key.map(str::to_string);
        errors.borrow_mut().push(err);
        return;
    };

    if !schema::assignable(&expected, &actual) {
        let mut err = PlanValidationError::new(
            ValidationErrorCode::TypeMismatch,
            step.id.clone(),
            format!(
                "argument `{arg_path}` expects {} but `{from_step_id}.{}` produces {}",
                type_tags_to_string(&schema::type_set(&expected)),
                output_key.unwrap_or(""),
                type_tags_to_string(&schema::type_set(&actual)),
            ),
        );
        err.tool_name = Some(step.tool_name.clone());
        err.argument_path = Some(arg_path.to_string());
        err.from_step_id = Some(from_step_id);
        err.output_path = output_key.map(str::to_string);
        err.expected_type = Some(type_tags_to_string(&schema::type_set(&expected)));
        err.actual_type = Some(type_tags_to_string(&schema::type_set(&actual)));
        errors.borrow_mut().push(err);
    }
}

fn check_template_reference(
    reference: &Value,
    arg_path: &Path,
    step: &crate::plan::types::PlanStep,
    plan: &Plan,
    tools: &ToolCatalog,
    errors: &std::cell::RefCell<Vec<PlanValidationError>>,
) {
    let Some(values) = reference.get("$values").and_then(Value::as_array) else {
        return;
    };

    let expected = string_coercible_set();
    for entry in values {
        let Some(from_step_id) = entry.get("$fromStep").and_then(Value::as_str) else {
            continue;
        };
        let output_key = entry.get("$outputKey").and_then(Value::as_str);

        if plan.step(from_step_id).is_none() {
            let mut err = PlanValidationError::new(
                ValidationErrorCode::DependencyStepMissing,
                step.id.clone(),
                format!("template references unknown step `{from_step_id}`"),
            );
            err.tool_name = Some(step.tool_name.clone());
            err.argument_path = Some(arg_path.to_string());
            err.from_step_id = Some(from_step_id.to_string());
            errors.borrow_mut().push(err);
            continue;
        }

        let output_schema = match referenced_output_schema(from_step_id, plan, tools) {
            Ok(Some(schema)) => schema,
            Ok(None) => continue,
            Err(message) => {
                let mut err = PlanValidationError::new(
                    ValidationErrorCode::SchemaParseError,
                    step.id.clone(),
                    message,
                );
                err.from_step_id = Some(from_step_id.to_string());
                errors.borrow_mut().push(err);
                continue;
            }
        };

        let output_path = output_key.map(path::parse).unwrap_or_default();
        let Some(actual) = schema::schema_at_path(&output_schema, &output_path) else {
            let mut err = PlanValidationError::new(
                ValidationErrorCode::OutputKeyMissing,
                step.id.clone(),
                format!(
                    "`{}` has no output key `{}`",
                    from_step_id,
                    output_key.unwrap_or("")
                ),
            );
            err.tool_name = Some(step.tool_name.clone());
            err.argument_path = Some(arg_path.to_string());
            err.from_step_id = Some(from_step_id.to_string());
            err.output_path = output_key.map(str::to_string);
            errors.borrow_mut().push(err);
            continue;
        };

        if !schema::assignable(&expected, &actual) {
            let mut err = PlanValidationError::new(
                ValidationErrorCode::TypeMismatch,
                step.id.clone(),
                format!(
                    "template value `{from_step_id}.{}` is not stringifiable",
                    output_key.unwrap_or("")
                ),
            );
            err.tool_name = Some(step.tool_name.clone());
            err.argument_path = Some(arg_path.to_string());
            err.from_step_id = Some(from_step_id.to_string());
            err.output_path = output_key.map(str::to_string);
            err.actual_type = Some(type_tags_to_string(&schema::type_set(&actual)));
            errors.borrow_mut().push(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::types::{PlanStep, ToolDef};
    use serde_json::json;
    use std::sync::Arc;

    fn noop_tool(name: &str, input_schema: Value, output_schema: Value) -> ToolDef {
        ToolDef {
            name: name.to_string(),
            input_schema,
            output_schema,
            handler: Arc::new(|args: Value| async move { Ok(args) }),
        }
    }

    fn catalog() -> ToolCatalog {
        let mut tools = ToolCatalog::new();
        tools.register(noop_tool(
            "get_weather",
            json!({"type": "object", "properties": {"city": {"type": "string"}}}),
            json!({"type": "object", "properties": {"temp": {"type": "number"}}}),
        ));
        tools.register(noop_tool(
            "send_email",
            json!({"type": "object", "properties": {"body": {"type": "string"}}}),
            json!({"type": "object", "properties": {}}),
        ));
        tools
    }

    #[test]
    fn valid_plan_has_no_errors() {
        let tools = catalog();
        let weather = PlanStep::new("w1", "get_weather", json!({"city": "Paris"}));
        let mut email_args = serde_json::Map::new();
        email_args.insert(
            "body".to_string(),
            json!({"$fromStep": "w1", "$outputKey": "temp"}),
        );
        // body expects string but temp is number — use a template instead to stay valid.
        email_args.insert(
            "body".to_string(),
            json!({"$fromTemplateString": "It is {0} degrees", "$values": [{"$fromStep": "w1", "$outputKey": "temp"}]}),
        );
        let email = PlanStep::new("e1", "send_email", Value::Object(email_args));
        let plan = Plan::new(vec![weather, email]);

        let report = is_valid_plan(&plan, &tools);
        assert!(report.valid, "unexpected errors: {:?}", report.errors);
    }

    #[test]
    fn missing_tool_is_reported() {
        let tools = catalog();
        let step = PlanStep::new("s1", "unregistered_tool", json!({}));
        let plan = Plan::new(vec![step]);
        let report = is_valid_plan(&plan, &tools);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, ValidationErrorCode::ToolNotFound);
    }

    #[test]
    fn dependency_on_missing_step_is_reported() {
        let tools = catalog();
        let step = PlanStep::new(
            "e1",
            "send_email",
            json!({"body": {"$fromStep": "ghost", "$outputKey": "temp"}}),
        );
        let plan = Plan::new(vec![step]);
        let report = is_valid_plan(&plan, &tools);
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.code == ValidationErrorCode::DependencyStepMissing));
    }

    #[test]
    fn unknown_output_key_is_reported() {
        let tools = catalog();
        let weather = PlanStep::new("w1", "get_weather", json!({"city": "Paris"}));
        let email = PlanStep::new(
            "e1",
            "send_email",
            json!({"body": {"$fromStep": "w1", "$outputKey": "nonexistent"}}),
        );
        let plan = Plan::new(vec![weather, email]);
        let report = is_valid_plan(&plan, &tools);
        assert!(report.errors.iter().any(|e| e.code == ValidationErrorCode::OutputKeyMissing));
    }

    #[test]
    fn type_mismatch_is_reported_when_output_is_not_assignable() {
        let tools = catalog();
        let weather = PlanStep::new("w1", "get_weather", json!({"city": "Paris"}));
        let email = PlanStep::new(
            "e1",
            "send_email",
            json!({"body": {"$fromStep": "w1", "$outputKey": "temp"}}),
        );
        let plan = Plan::new(vec![weather, email]);
        let report = is_valid_plan(&plan, &tools);
        assert!(report.errors.iter().any(|e| e.code == ValidationErrorCode::TypeMismatch));
    }

    #[test]
    fn input_key_not_in_schema_is_reported() {
        let tools = catalog();
        let weather = PlanStep::new("w1", "get_weather", json!({"city": "Paris"}));
        let email = PlanStep::new(
            "e1",
            "send_email",
            json!({"subject": {"$fromStep": "w1", "$outputKey": "temp"}}),
        );
        let plan = Plan::new(vec![weather, email]);
        let report = is_valid_plan(&plan, &tools);
        assert!(report.errors.iter().any(|e| e.code == ValidationErrorCode::InputKeyMissing));
    }

    #[test]
    fn input_key_missing_takes_priority_over_output_key_missing() {
        // Both the consumer argument path and the referenced output key are
        // absent; input_key_missing must win since it's checked first.
        let tools = catalog();
        let weather = PlanStep::new("w1", "get_weather", json!({"city": "Paris"}));
        let email = PlanStep::new(
            "e1",
            "send_email",
            json!({"subject": {"$fromStep": "w1", "$outputKey": "nonexistent"}}),
        );
        let plan = Plan::new(vec![weather, email]);
        let report = is_valid_plan(&plan, &tools);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, ValidationErrorCode::InputKeyMissing);
    }
}
