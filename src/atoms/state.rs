// A single node in a workflow's state graph

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::atoms::metadata::AtomMetadata;
use crate::error::{Result, WorkflowError};

/// Identity of a [`State`], newtype'd over `String` so states, transitions,
/// work items and conditions can't be mixed up at a call site by accident.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(String);

impl StateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StateId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StateId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// What role a state plays in the surrounding state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateType {
    Initial,
    Intermediate,
    Final,
    Error,
}

/// Where a state currently sits in its own lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateStatus {
    Active,
    Inactive,
    Pending,
    Complete,
    Failed,
}

/// A node in a [`crate::cores::state_machine::StateMachineCore`] graph.
///
/// Immutable: every mutator (`with_status`, `with_data`, ...) returns a new
/// `State` with `metadata.updated_at` bumped rather than mutating in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub id: StateId,
    pub state_type: StateType,
    pub status: StateStatus,
    /// Opaque payload, copied by reference per the data-model's rule that
    /// `Data`/`Input`/`Output` are handed off rather than deep-copied.
    pub data: Option<Arc<Value>>,
    pub metadata: AtomMetadata,
}

impl State {
    pub fn new(id: impl Into<StateId>, state_type: StateType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state_type,
            status: StateStatus::Inactive,
            data: None,
            metadata: AtomMetadata::new(name),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.metadata.validate()?;
        if self.id.as_str().trim().is_empty() {
            return Err(WorkflowError::Validation("state id must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn with_status(&self, status: StateStatus) -> Self {
        let mut copy = self.clone();
        copy.status = status;
        copy.metadata = copy.metadata.touch();
        copy
    }

    pub fn with_data(&self, data: Value) -> Self {
        let mut copy = self.clone();
        copy.data = Some(Arc::new(data));
        copy.metadata = copy.metadata.touch();
        copy
    }

    pub fn is_initial(&self) -> bool {
        matches!(self.state_type, StateType::Initial)
    }

    pub fn is_final(&self) -> bool {
        matches!(self.state_type, StateType::Final)
    }
}
