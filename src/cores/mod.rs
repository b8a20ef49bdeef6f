//! Tier B: concurrent registries/dispatchers built from Tier A atoms.
//! Each core is the same shape — type-keyed plug-in registry, an "active"
//! set, a result ledger, one readers-writer lock — parameterized by a
//! different atom and plug-in trait.

pub mod condition_evaluation;
pub mod state_machine;
pub mod work_execution;

pub use condition_evaluation::{ConditionEvaluationCore, ConditionEvaluationResult, ConditionEvaluator, DefaultContextEvaluator};
pub use state_machine::StateMachineCore;
pub use work_execution::{ExecutorMetadata, ExecutorSchema, LogEntry, WorkExecutionCore, WorkExecutionResult, WorkExecutor, WorkResult};
