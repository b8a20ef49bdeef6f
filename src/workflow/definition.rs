// A StateMachine plus execution configuration and initial/final/error states

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::atoms::{AtomMetadata, Context, ContextScope, StateId};
use crate::cores::StateMachineCore;
use crate::error::{Result, WorkflowError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionStatus {
    Draft,
    Active,
    Inactive,
    Deprecated,
}

/// Bounded-retry policy consulted by an external retry overlay — the core
/// engine itself never retries (§7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub retryable_errors: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            retryable_errors: Vec::new(),
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(WorkflowError::Validation(
                "retry policy max_delay must be >= initial_delay".to_string(),
            ));
        }
        if self.backoff_multiplier <= 0.0 {
            return Err(WorkflowError::Validation(
                "retry policy backoff_multiplier must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Engine-level execution configuration, distinct from process/CLI
/// configuration (see `crate::config::RuntimeConfig`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub max_concurrent_instances: u32,
    pub default_timeout_seconds: u64,
    pub retry_policy: RetryPolicy,
    pub compensation_enabled: bool,
    pub persistence_enabled: bool,
    pub logging_level: String,
    pub environment: HashMap<String, String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            max_concurrent_instances: 100,
            default_timeout_seconds: 30,
            retry_policy: RetryPolicy::default(),
            compensation_enabled: false,
            persistence_enabled: true,
            logging_level: "info".to_string(),
            environment: HashMap::new(),
        }
    }
}

impl Configuration {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_instances == 0 {
            return Err(WorkflowError::Validation(
                "max_concurrent_instances must be > 0".to_string(),
            ));
        }
        if self.default_timeout_seconds == 0 {
            return Err(WorkflowError::Validation(
                "default_timeout_seconds must be > 0".to_string(),
            ));
        }
        self.retry_policy.validate()
    }
}

/// A versioned, validatable process definition binding a
/// [`StateMachineCore`] to initial/final/error state designations and an
/// execution [`Configuration`].
pub struct WorkflowDefinition {
    pub id: String,
    pub version: String,
    pub status: DefinitionStatus,
    pub metadata: AtomMetadata,
    pub state_machine: StateMachineCore,
    pub initial_state_id: StateId,
    pub final_state_ids: HashSet<StateId>,
    pub error_state_ids: HashSet<StateId>,
    pub global_context: Context,
    pub configuration: Configuration,
}

impl WorkflowDefinition {
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        name: impl Into<String>,
        state_machine: StateMachineCore,
        initial_state_id: impl Into<StateId>,
    ) -> Self {
        let id = id.into();
        Self {
            global_context: Context::new(format!("{id}-global"), ContextScope::Global, "global"),
            id,
            version: version.into(),
            status: DefinitionStatus::Draft,
            metadata: AtomMetadata::new(name),
            state_machine,
            initial_state_id: initial_state_id.into(),
            final_state_ids: HashSet::new(),
            error_state_ids: HashSet::new(),
            configuration: Configuration::default(),
        }
    }

    pub fn with_final_states(mut self, ids: impl IntoIterator<Item = StateId>) -> Self {
        self.final_state_ids = ids.into_iter().collect();
        self
    }

    pub fn with_error_states(mut self, ids: impl IntoIterator<Item = StateId>) -> Self {
        self.error_state_ids = ids.into_iter().collect();
        self
    }

    pub fn with_configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn activate(mut self) -> Self {
        self.status = DefinitionStatus::Active;
        self
    }

    /// Exhaustive validation: the state machine's own invariants, every
    /// initial/final/error state reference resolving, the global context,
    /// and configuration bounds.
    pub fn validate(&self) -> Result<()> {
        self.metadata.validate()?;
        self.state_machine.validate_state_machine()?;

        if self.state_machine.get_state(&self.initial_state_id).is_none() {
            return Err(WorkflowError::Validation(format!(
                "initial state '{}' not found in state machine",
                self.initial_state_id
            )));
        }
        for id in &self.final_state_ids {
            if self.state_machine.get_state(id).is_none() {
                return Err(WorkflowError::Validation(format!(
                    "final state '{id}' not found in state machine"
                )));
            }
        }
        for id in &self.error_state_ids {
            if self.state_machine.get_state(id).is_none() {
                return Err(WorkflowError::Validation(format!(
                    "error state '{id}' not found in state machine"
                )));
            }
        }

        self.global_context.validate()?;
        self.configuration.validate()?;
        Ok(())
    }

    pub fn can_execute(&self) -> bool {
        matches!(self.status, DefinitionStatus::Active) && self.validate().is_ok()
    }
}
