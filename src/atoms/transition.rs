// A guarded edge between two states, optionally carrying work to run on firing

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::atoms::condition::ConditionId;
use crate::atoms::metadata::AtomMetadata;
use crate::atoms::state::StateId;
use crate::atoms::work::WorkId;
use crate::error::{Result, WorkflowError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionId(String);

impl TransitionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TransitionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TransitionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    Automatic,
    Manual,
    Conditional,
    Compensation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStatus {
    Pending,
    Evaluating,
    Ready,
    Executing,
    Completed,
    Failed,
    Skipped,
}

/// A guarded edge in a [`crate::cores::state_machine::StateMachineCore`]
/// graph. Carries refs, not owned atoms: `conditions` names
/// [`ConditionId`]s resolved by a [`crate::cores::condition_evaluation::ConditionEvaluationCore`],
/// `actions` names [`WorkId`]s dispatched by a
/// [`crate::cores::work_execution::WorkExecutionCore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub id: TransitionId,
    pub transition_type: TransitionType,
    pub status: TransitionStatus,
    pub from: StateId,
    pub to: StateId,
    pub conditions: Vec<ConditionId>,
    pub actions: Vec<WorkId>,
    pub priority: i64,
    pub data: Option<Arc<Value>>,
    pub metadata: AtomMetadata,
}

impl Transition {
    pub fn new(
        id: impl Into<TransitionId>,
        transition_type: TransitionType,
        from: impl Into<StateId>,
        to: impl Into<StateId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            transition_type,
            status: TransitionStatus::Pending,
            from: from.into(),
            to: to.into(),
            conditions: Vec::new(),
            actions: Vec::new(),
            priority: 0,
            data: None,
            metadata: AtomMetadata::new(name),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.metadata.validate()?;
        if self.id.as_str().trim().is_empty() {
            return Err(WorkflowError::Validation(
                "transition id must not be empty".to_string(),
            ));
        }
        if self.from.as_str().trim().is_empty() || self.to.as_str().trim().is_empty() {
            return Err(WorkflowError::Validation(
                "transition must have non-empty from/to state ids".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_status(&self, status: TransitionStatus) -> Self {
        let mut copy = self.clone();
        copy.status = status;
        copy.metadata = copy.metadata.touch();
        copy
    }

    pub fn with_conditions(&self, conditions: Vec<ConditionId>) -> Self {
        let mut copy = self.clone();
        copy.conditions = conditions;
        copy.metadata = copy.metadata.touch();
        copy
    }

    pub fn with_actions(&self, actions: Vec<WorkId>) -> Self {
        let mut copy = self.clone();
        copy.actions = actions;
        copy.metadata = copy.metadata.touch();
        copy
    }

    pub fn with_priority(&self, priority: i64) -> Self {
        let mut copy = self.clone();
        copy.priority = priority;
        copy.metadata = copy.metadata.touch();
        copy
    }

    /// Eligible for evaluation iff its own status is `ready` or `pending`
    /// — the dual acceptance required by the default `TransitionEvaluator`.
    pub fn is_evaluable(&self) -> bool {
        matches!(self.status, TransitionStatus::Ready | TransitionStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_endpoints() {
        let t = Transition::new("t0", TransitionType::Automatic, "", "s1", "go");
        assert!(t.validate().is_err());
    }

    #[test]
    fn is_evaluable_accepts_ready_and_pending_only() {
        let t = Transition::new("t0", TransitionType::Automatic, "s0", "s1", "go");
        assert!(t.is_evaluable());
        assert!(t.with_status(TransitionStatus::Ready).is_evaluable());
        assert!(!t.with_status(TransitionStatus::Completed).is_evaluable());
    }

    #[test]
    fn with_actions_is_a_copy_returning_mutator() {
        let t = Transition::new("t0", TransitionType::Automatic, "s0", "s1", "go");
        let with_actions = t.with_actions(vec![WorkId::new("w1")]);
        assert!(t.actions.is_empty());
        assert_eq!(with_actions.actions.len(), 1);
    }
}
