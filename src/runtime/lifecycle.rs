// Append-only per-instance lifecycle event log

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventType {
    WorkflowStarted,
    WorkflowCompleted,
    WorkflowFailed,
    WorkflowPaused,
    WorkflowResumed,
    WorkflowCancelled,
    StateChanged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub instance_id: String,
    pub event_type: LifecycleEventType,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

/// Append-only per-instance event log, one lock over the whole thing. No
/// consumers are specified by the design; a subscription API could be
/// layered on top without changing this contract.
#[derive(Default)]
pub struct LifecycleManager {
    events: RwLock<HashMap<String, Vec<LifecycleEvent>>>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self, instance_id: &str, event_type: LifecycleEventType, data: Value) {
        info!(instance_id, event_type = ?event_type, "lifecycle event");
        let event = LifecycleEvent {
            instance_id: instance_id.to_string(),
            event_type,
            timestamp: Utc::now(),
            data,
        };
        self.events
            .write()
            .expect("lifecycle manager lock poisoned")
            .entry(instance_id.to_string())
            .or_default()
            .push(event);
    }

    pub fn get_events(&self, instance_id: &str) -> Vec<LifecycleEvent> {
        self.events
            .read()
            .expect("lifecycle manager lock poisoned")
            .get(instance_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_all_events(&self) -> Vec<LifecycleEvent> {
        self.events
            .read()
            .expect("lifecycle manager lock poisoned")
            .values()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn clear_events(&self, instance_id: &str) {
        self.events.write().expect("lifecycle manager lock poisoned").remove(instance_id);
    }
}
