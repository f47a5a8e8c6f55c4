//! Plan parsing, static validation, and concurrent execution — the three
//! collaborators the crate's name describes.

pub mod executor;
pub mod parser;
pub mod schema;
pub mod types;
pub mod validator;

pub use executor::{execute_plan, execute_plan_with_limit, resolve_value};
pub use parser::{parse_model_output, parse_plan, parse_plan_steps, ParsedModelOutput};
pub use types::{Plan, PlanStep, StepResult, StepStatus, ToolCatalog, ToolDef, ToolHandler};
pub use validator::{is_valid_plan, PlanValidationError, ValidationErrorCode, ValidationReport};
