// A predicate identifier resolved against a Context by a pluggable evaluator

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::atoms::metadata::AtomMetadata;
use crate::error::{Result, WorkflowError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConditionId(String);

impl ConditionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConditionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConditionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    Expression,
    Script,
    Service,
    Time,
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionStatus {
    Pending,
    Evaluating,
    True,
    False,
    Error,
}

/// `and`/`or`/`not` combinator applied by `ConditionEvaluationCore::evaluate_conditions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    And,
    Or,
    Not,
}

/// The `Expression` carried by an expression-typed [`Condition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expression {
    pub text: String,
    pub variables: HashMap<String, Value>,
    pub language: String,
}

impl Expression {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            variables: HashMap::new(),
            language: "javascript".to_string(),
        }
    }
}

impl Default for Expression {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// A guard evaluated by a
/// [`crate::cores::condition_evaluation::ConditionEvaluationCore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub id: ConditionId,
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub expression: Expression,
    pub result: Option<Arc<Value>>,
    pub dependencies: Vec<ConditionId>,
    pub metadata: AtomMetadata,
}

impl Condition {
    pub fn new(id: impl Into<ConditionId>, condition_type: ConditionType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            condition_type,
            status: ConditionStatus::Pending,
            expression: Expression::default(),
            result: None,
            dependencies: Vec::new(),
            metadata: AtomMetadata::new(name),
        }
    }

    /// Construct the synthesized expression-typed condition the default
    /// `TransitionEvaluator` resolves a bare condition ref against: id
    /// equal to the ref, expression text `"true"`.
    pub fn synthesize_default(id: impl Into<ConditionId>) -> Self {
        let id = id.into();
        let mut c = Self::new(id.clone(), ConditionType::Expression, id.to_string());
        c.expression = Expression::new("true");
        c
    }

    pub fn validate(&self) -> Result<()> {
        self.metadata.validate()?;
        if self.id.as_str().trim().is_empty() {
            return Err(WorkflowError::Validation(
                "condition id must not be empty".to_string(),
            ));
        }
        if matches!(self.condition_type, ConditionType::Expression) && self.expression.text.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "expression-typed condition must have non-empty expression text".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_expression(&self, expression: Expression) -> Self {
        let mut copy = self.clone();
        copy.expression = expression;
        copy.metadata = copy.metadata.touch();
        copy
    }

    pub fn with_status(&self, status: ConditionStatus) -> Self {
        let mut copy = self.clone();
        copy.status = status;
        copy.metadata = copy.metadata.touch();
        copy
    }

    pub fn with_result(&self, result: Value, status: ConditionStatus) -> Self {
        let mut copy = self.clone();
        copy.result = Some(Arc::new(result));
        copy.status = status;
        copy.metadata = copy.metadata.touch();
        copy
    }

    pub fn with_dependencies(&self, dependencies: Vec<ConditionId>) -> Self {
        let mut copy = self.clone();
        copy.dependencies = dependencies;
        copy.metadata = copy.metadata.touch();
        copy
    }
}
