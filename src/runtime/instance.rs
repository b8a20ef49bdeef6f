// One runtime execution of a WorkflowDefinition

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::atoms::{Context, StateId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Created,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl InstanceStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, InstanceStatus::Completed | InstanceStatus::Failed | InstanceStatus::Cancelled)
    }
}

/// `<DefinitionID>-<unix-nanos>`, unlike the Tier-A atoms' plain string ids.
pub fn new_instance_id(definition_id: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos();
    format!("{definition_id}-{nanos}")
}

/// Unlike the Tier-A atoms, a `WorkflowInstance` is a mutable record — it
/// is owned exclusively by the `RuntimeEngine` (and mirrored into the
/// `StatePersistenceStore`), never aliased across a suspension point
/// without the engine's own lock held.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: String,
    pub definition_id: String,
    pub definition_version: String,
    pub status: InstanceStatus,
    pub current_state_id: StateId,
    pub context: Context,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub metadata: std::collections::HashMap<String, Value>,
}

impl WorkflowInstance {
    pub fn new(definition_id: impl Into<String>, definition_version: impl Into<String>, initial_state_id: StateId, context: Context) -> Self {
        let definition_id = definition_id.into();
        let now = Utc::now();
        Self {
            id: new_instance_id(&definition_id),
            definition_id,
            definition_version: definition_version.into(),
            status: InstanceStatus::Created,
            current_state_id: initial_state_id,
            context,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            error: None,
            metadata: std::collections::HashMap::new(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn start(&mut self) {
        self.status = InstanceStatus::Running;
        self.started_at = Some(Utc::now());
        self.touch();
    }

    pub fn set_current_state(&mut self, state_id: StateId) {
        self.current_state_id = state_id;
        self.touch();
    }

    pub fn set_context(&mut self, context: Context) {
        self.context = context;
        self.touch();
    }

    pub fn complete(&mut self) {
        self.status = InstanceStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.touch();
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = InstanceStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        self.touch();
    }

    pub fn pause(&mut self) {
        self.status = InstanceStatus::Paused;
        self.touch();
    }

    pub fn resume(&mut self) {
        self.status = InstanceStatus::Running;
        self.touch();
    }

    pub fn cancel(&mut self) {
        self.status = InstanceStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        self.touch();
    }
}
