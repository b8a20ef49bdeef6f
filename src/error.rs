// Core error types for the workflow runtime

//! # Error Handling
//!
//! The runtime doesn't use exceptions. Every fallible operation returns a
//! `Result<T>` built on [`WorkflowError`]. Each variant corresponds to one of
//! the error kinds the design distinguishes: validation, registry, state
//! machine integrity, lifecycle precondition, executor/evaluator failures,
//! and the engine's step budget.

use thiserror::Error;

/// Errors produced by the workflow runtime core.
///
/// `#[from]` conversions are reserved for ambient errors (serialization, I/O)
/// that genuinely originate outside the core's own control flow; every
/// core-level failure is constructed explicitly at its call site so the
/// message can carry the context that produced it.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// A malformed atom or definition: an empty required field, a numeric
    /// bound violated, or any other structural invariant failure.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Duplicate registration, or no executor/evaluator registered for a type.
    #[error("registry error: {0}")]
    Registry(String),

    /// A transition references an unknown state, or a referenced/current
    /// state was asked to be removed.
    #[error("state machine error: {0}")]
    StateMachine(String),

    /// An operation was requested while the instance was in the wrong status.
    #[error("lifecycle precondition failed: {0}")]
    LifecyclePrecondition(String),

    /// A registered `WorkExecutor` returned an error.
    #[error("work execution error: {0}")]
    ExecutorFailed(String),

    /// A registered `ConditionEvaluator` returned an error.
    #[error("condition evaluation error: {0}")]
    EvaluatorFailed(String),

    /// `ExecuteWorkflow` exceeded the maximum step budget.
    #[error("workflow execution exceeded maximum steps ({0})")]
    BudgetExceeded(usize),

    /// An id did not resolve to anything in a registry or store.
    #[error("not found: {0}")]
    NotFound(String),

    /// Persistence-layer failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading failure.
    #[error("configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    /// Catch-all for ambient I/O failures at the CLI boundary.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for WorkflowError {
    fn from(err: std::io::Error) -> Self {
        WorkflowError::Internal(err.to_string())
    }
}

/// Shorthand for `std::result::Result<T, WorkflowError>`, used throughout the crate.
pub type Result<T> = std::result::Result<T, WorkflowError>;
