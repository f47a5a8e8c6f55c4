use dagplan::demo_tools;
use dagplan::plan::{Plan, PlanStep, ValidationErrorCode, is_valid_plan};
use serde_json::json;

#[test]
fn demo_catalog_accepts_well_typed_plan() {
    let tools = demo_tools::catalog();
    let weather = PlanStep::new("w1", "get_weather", json!({"city": "Paris"}));
    let email = PlanStep::new(
        "e1",
        "send_email",
        json!({
            "to": "user@example.com",
            "body": {
                "$fromTemplateString": "It is {0} and {1} in {2}",
                "$values": [
                    {"$fromStep": "w1", "$outputKey": "temp"},
                    {"$fromStep": "w1", "$outputKey": "condition"},
                    {"$fromStep": "w1", "$outputKey": "city"},
                ],
            },
        }),
    );
    let plan = Plan::new(vec![weather, email]);

    let report = is_valid_plan(&plan, &tools);
    assert!(report.valid, "unexpected errors: {:?}", report.errors);
}

#[test]
fn demo_catalog_rejects_number_bound_directly_to_string_argument() {
    let tools = demo_tools::catalog();
    let weather = PlanStep::new("w1", "get_weather", json!({"city": "Paris"}));
    let email = PlanStep::new(
        "e1",
        "send_email",
        json!({
            "to": "user@example.com",
            "body": {"$fromStep": "w1", "$outputKey": "temp"},
        }),
    );
    let plan = Plan::new(vec![weather, email]);

    let report = is_valid_plan(&plan, &tools);
    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.code == ValidationErrorCode::TypeMismatch));
}

#[test]
fn unregistered_tool_name_is_reported_as_tool_not_found() {
    let tools = demo_tools::catalog();
    let step = PlanStep::new("s1", "delete_everything", json!({}));
    let plan = Plan::new(vec![step]);

    let report = is_valid_plan(&plan, &tools);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].code, ValidationErrorCode::ToolNotFound);
}
