use dagplan::plan::parse_plan;

#[test]
fn parses_plan_with_dependency_and_template_references() {
    let raw = r#"
<think>
First check the weather, then email the result.
</think>
<plan>
[
  { toolName: 'get_weather', arguments: { city: 'Paris' } },
  {
    toolName: 'send_email',
    arguments: {
      to: 'user@example.com',
      body: 'Current weather in Paris: {0.temp} degrees, {0.condition}.',
    },
  },
]
</plan>
"#;

    let plan = parse_plan(raw).expect("plan should parse");
    assert_eq!(plan.steps.len(), 2);
    assert_eq!(plan.steps[0].tool_name, "get_weather");
    assert_eq!(plan.steps[1].tool_name, "send_email");

    let body = &plan.steps[1].arguments["body"];
    assert_eq!(
        body["$fromTemplateString"],
        serde_json::json!("Current weather in Paris: {0} degrees, {1}.")
    );
    assert_eq!(body["$values"][0]["$fromStep"], serde_json::json!(plan.steps[0].id));
}

#[test]
fn rejects_plan_with_no_payload_found() {
    let err = parse_plan("the model said nothing useful").unwrap_err();
    assert!(matches!(err, dagplan::error::ParseError::NoPayload));
}

#[test]
fn rejects_plan_with_invalid_json5() {
    let err = parse_plan("<plan>[{toolName: }]</plan>").unwrap_err();
    assert!(matches!(err, dagplan::error::ParseError::InvalidJson(_)));
}
