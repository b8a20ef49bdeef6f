//! Tier C, part 1: the `WorkflowDefinition` that binds a `StateMachineCore`
//! to initial/final/error state designations and execution configuration.

pub mod definition;

pub use definition::{Configuration, DefinitionStatus, RetryPolicy, WorkflowDefinition};
