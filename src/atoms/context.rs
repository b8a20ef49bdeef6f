// An immutable, scoped variable bag threaded through evaluation and execution

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::atoms::metadata::AtomMetadata;
use crate::error::{Result, WorkflowError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(String);

impl ContextId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContextId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ContextId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextScope {
    Global,
    Workflow,
    State,
    Work,
}

/// An immutable scoped variable bag. Every mutator (`set`, `delete`,
/// `clear`, `merge`) returns a new `Context` value with an independent
/// `variables` map — there is no in-place mutation, so contexts can be
/// shared across threads by reference without synchronization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub id: ContextId,
    pub scope: ContextScope,
    pub parent_id: Option<ContextId>,
    pub variables: HashMap<String, Value>,
    pub metadata: AtomMetadata,
}

impl Context {
    pub fn new(id: impl Into<ContextId>, scope: ContextScope, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scope,
            parent_id: None,
            variables: HashMap::new(),
            metadata: AtomMetadata::new(name),
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<ContextId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.metadata.validate()?;
        if self.id.as_str().trim().is_empty() {
            return Err(WorkflowError::Validation(
                "context id must not be empty".to_string(),
            ));
        }
        if matches!(self.scope, ContextScope::Global) && self.parent_id.is_some() {
            return Err(WorkflowError::Validation(
                "global-scoped context must not have a parent".to_string(),
            ));
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Return a new context with `key` bound to `value`.
    pub fn set(&self, key: impl Into<String>, value: Value) -> Self {
        let mut copy = self.clone();
        copy.variables.insert(key.into(), value);
        copy.metadata = copy.metadata.touch();
        copy
    }

    /// Return a new context with `key` removed, if present.
    pub fn delete(&self, key: &str) -> Self {
        let mut copy = self.clone();
        copy.variables.remove(key);
        copy.metadata = copy.metadata.touch();
        copy
    }

    /// Return a new context with an empty variable map.
    pub fn clear(&self) -> Self {
        let mut copy = self.clone();
        copy.variables = HashMap::new();
        copy.metadata = copy.metadata.touch();
        copy
    }

    /// Return a new context whose variables are `self`'s, overlaid with
    /// `other`'s (on key collision, `other` wins).
    pub fn merge(&self, other: &Context) -> Self {
        let mut copy = self.clone();
        for (k, v) in &other.variables {
            copy.variables.insert(k.clone(), v.clone());
        }
        copy.metadata = copy.metadata.touch();
        copy
    }
}
