use thiserror::Error;

/// Structured error hierarchy for `dagplan`.
///
/// Each subsystem defines its own error variant; callers can match on these
/// to decide recovery strategy. Validator findings and executor step
/// failures are *not* part of this tree — spec-wise they are collected data
/// (`plan::validator::ValidationReport`, `plan::executor::StepResult`), never
/// thrown.
#[derive(Debug, Error)]
pub enum DagPlanError {
    #[error("parse: {0}")]
    Parse(#[from] ParseError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Fatal failures from `plan::parser` — spec §7 classifies all of these as
/// exceptions, never collected.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no JSON payload found in model output")]
    NoPayload,

    #[error("invalid json parsing: {0}")]
    InvalidJson(String),

    #[error("plan entry {index} is malformed: {message}")]
    MalformedStep { index: usize, message: String },

    #[error("invalid dependency reference: step index {index} not found in plan")]
    UnknownStepIndex { index: i64 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("failed to save config: {0}")]
    Save(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("model request failed: {0}")]
    Request(String),

    #[error("No response from model")]
    EmptyResponse,
}

pub type Result<T> = std::result::Result<T, DagPlanError>;
