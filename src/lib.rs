//! dagplan — plan, validate, and execute tool-call DAGs produced by an LLM.

// ── Foundation: errors, config, logging ──
pub mod error;
pub mod config;
pub mod logging;

// ── Path traversal ──
pub mod path;

// ── Plan parsing, validation, execution ──
pub mod plan;

// ── Model transport (external collaborator) ──
pub mod transport;

pub mod demo_tools;

pub use error::{DagPlanError, Result};
pub use plan::{Plan, PlanStep, StepResult, StepStatus, ToolCatalog, ToolDef};
