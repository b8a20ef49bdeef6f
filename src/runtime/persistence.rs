// Per-instance persistence of instances, states, transitions, work, and contexts

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::atoms::{Condition, ConditionId, Context, ContextId, State, StateId, Transition, TransitionId, Work, WorkId};
use crate::error::{Result, WorkflowError};
use crate::runtime::instance::WorkflowInstance;

#[derive(Default, Clone)]
struct InstanceRecord {
    states: HashMap<StateId, State>,
    transitions: HashMap<TransitionId, Transition>,
    works: HashMap<WorkId, Work>,
    contexts: HashMap<ContextId, Context>,
    conditions: HashMap<ConditionId, Condition>,
}

/// The persistence contract from §4.7: collections keyed by instance, each
/// with per-instance sub-collections. Every accessor distinguishes
/// "instance unknown" from "key unknown within a known instance" via
/// distinct `NotFound` messages.
#[async_trait]
pub trait StatePersistenceStore: Send + Sync {
    async fn save_workflow_instance(&self, instance: WorkflowInstance) -> Result<()>;
    async fn get_workflow_instance(&self, id: &str) -> Result<WorkflowInstance>;
    async fn update_workflow_instance(&self, instance: WorkflowInstance) -> Result<()>;
    async fn delete_workflow_instance(&self, id: &str) -> Result<()>;
    async fn list_workflow_instances(&self) -> Result<Vec<WorkflowInstance>>;

    async fn save_state(&self, instance_id: &str, state: State) -> Result<()>;
    async fn get_state(&self, instance_id: &str, state_id: &StateId) -> Result<State>;
    async fn list_states(&self, instance_id: &str) -> Result<Vec<State>>;

    async fn save_transition(&self, instance_id: &str, transition: Transition) -> Result<()>;
    async fn get_transition(&self, instance_id: &str, transition_id: &TransitionId) -> Result<Transition>;
    async fn list_transitions(&self, instance_id: &str) -> Result<Vec<Transition>>;

    async fn save_work(&self, instance_id: &str, work: Work) -> Result<()>;
    async fn update_work(&self, instance_id: &str, work: Work) -> Result<()>;
    async fn get_work(&self, instance_id: &str, work_id: &WorkId) -> Result<Work>;
    async fn list_work(&self, instance_id: &str) -> Result<Vec<Work>>;

    async fn save_context(&self, instance_id: &str, context: Context) -> Result<()>;
    async fn get_context(&self, instance_id: &str, context_id: &ContextId) -> Result<Context>;
    async fn list_contexts(&self, instance_id: &str) -> Result<Vec<Context>>;

    async fn cleanup(&self) -> Result<()>;
    async fn get_stats(&self) -> Result<HashMap<String, usize>>;
}

/// The in-memory reference implementation mandated by §4.7 — the only
/// persistence backend this crate ships; durable backends are out of scope.
#[derive(Default)]
pub struct InMemoryPersistenceStore {
    instances: RwLock<HashMap<String, WorkflowInstance>>,
    records: RwLock<HashMap<String, InstanceRecord>>,
}

impl InMemoryPersistenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found_instance(id: &str) -> WorkflowError {
        WorkflowError::NotFound(format!("workflow instance '{id}' not found"))
    }
}

#[async_trait]
impl StatePersistenceStore for InMemoryPersistenceStore {
    async fn save_workflow_instance(&self, instance: WorkflowInstance) -> Result<()> {
        let mut instances = self.instances.write().expect("persistence store lock poisoned");
        if instances.contains_key(&instance.id) {
            return Err(WorkflowError::Storage(format!(
                "workflow instance '{}' already exists",
                instance.id
            )));
        }
        let id = instance.id.clone();
        instances.insert(id.clone(), instance);
        self.records.write().expect("persistence store lock poisoned").entry(id).or_default();
        Ok(())
    }

    async fn get_workflow_instance(&self, id: &str) -> Result<WorkflowInstance> {
        self.instances
            .read()
            .expect("persistence store lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| Self::not_found_instance(id))
    }

    async fn update_workflow_instance(&self, instance: WorkflowInstance) -> Result<()> {
        let mut instances = self.instances.write().expect("persistence store lock poisoned");
        if !instances.contains_key(&instance.id) {
            return Err(Self::not_found_instance(&instance.id));
        }
        instances.insert(instance.id.clone(), instance);
        Ok(())
    }

    async fn delete_workflow_instance(&self, id: &str) -> Result<()> {
        let mut instances = self.instances.write().expect("persistence store lock poisoned");
        if instances.remove(id).is_none() {
            return Err(Self::not_found_instance(id));
        }
        self.records.write().expect("persistence store lock poisoned").remove(id);
        Ok(())
    }

    async fn list_workflow_instances(&self) -> Result<Vec<WorkflowInstance>> {
        Ok(self.instances.read().expect("persistence store lock poisoned").values().cloned().collect())
    }

    async fn save_state(&self, instance_id: &str, state: State) -> Result<()> {
        let mut records = self.records.write().expect("persistence store lock poisoned");
        let record = records
            .get_mut(instance_id)
            .ok_or_else(|| Self::not_found_instance(instance_id))?;
        if record.states.contains_key(&state.id) {
            return Err(WorkflowError::Storage(format!("state '{}' already saved", state.id)));
        }
        record.states.insert(state.id.clone(), state);
        Ok(())
    }

    async fn get_state(&self, instance_id: &str, state_id: &StateId) -> Result<State> {
        let records = self.records.read().expect("persistence store lock poisoned");
        let record = records.get(instance_id).ok_or_else(|| Self::not_found_instance(instance_id))?;
        record
            .states
            .get(state_id)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(format!("state '{state_id}' not found in instance '{instance_id}'")))
    }

    async fn list_states(&self, instance_id: &str) -> Result<Vec<State>> {
        let records = self.records.read().expect("persistence store lock poisoned");
        let record = records.get(instance_id).ok_or_else(|| Self::not_found_instance(instance_id))?;
        Ok(record.states.values().cloned().collect())
    }

    async fn save_transition(&self, instance_id: &str, transition: Transition) -> Result<()> {
        let mut records = self.records.write().expect("persistence store lock poisoned");
        let record = records.get_mut(instance_id).ok_or_else(|| Self::not_found_instance(instance_id))?;
        if record.transitions.contains_key(&transition.id) {
            return Err(WorkflowError::Storage(format!("transition '{}' already saved", transition.id)));
        }
        record.transitions.insert(transition.id.clone(), transition);
        Ok(())
    }

    async fn get_transition(&self, instance_id: &str, transition_id: &TransitionId) -> Result<Transition> {
        let records = self.records.read().expect("persistence store lock poisoned");
        let record = records.get(instance_id).ok_or_else(|| Self::not_found_instance(instance_id))?;
        record.transitions.get(transition_id).cloned().ok_or_else(|| {
            WorkflowError::NotFound(format!("transition '{transition_id}' not found in instance '{instance_id}'"))
        })
    }

    async fn list_transitions(&self, instance_id: &str) -> Result<Vec<Transition>> {
        let records = self.records.read().expect("persistence store lock poisoned");
        let record = records.get(instance_id).ok_or_else(|| Self::not_found_instance(instance_id))?;
        Ok(record.transitions.values().cloned().collect())
    }

    async fn save_work(&self, instance_id: &str, work: Work) -> Result<()> {
        let mut records = self.records.write().expect("persistence store lock poisoned");
        let record = records.get_mut(instance_id).ok_or_else(|| Self::not_found_instance(instance_id))?;
        if record.works.contains_key(&work.id) {
            return Err(WorkflowError::Storage(format!("work '{}' already saved", work.id)));
        }
        record.works.insert(work.id.clone(), work);
        Ok(())
    }

    async fn update_work(&self, instance_id: &str, work: Work) -> Result<()> {
        let mut records = self.records.write().expect("persistence store lock poisoned");
        let record = records.get_mut(instance_id).ok_or_else(|| Self::not_found_instance(instance_id))?;
        if !record.works.contains_key(&work.id) {
            return Err(WorkflowError::NotFound(format!("work '{}' not found in instance '{instance_id}'", work.id)));
        }
        record.works.insert(work.id.clone(), work);
        Ok(())
    }

    async fn get_work(&self, instance_id: &str, work_id: &WorkId) -> Result<Work> {
        let records = self.records.read().expect("persistence store lock poisoned");
        let record = records.get(instance_id).ok_or_else(|| Self::not_found_instance(instance_id))?;
        record
            .works
            .get(work_id)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(format!("work '{work_id}' not found in instance '{instance_id}'")))
    }

    async fn list_work(&self, instance_id: &str) -> Result<Vec<Work>> {
        let records = self.records.read().expect("persistence store lock poisoned");
        let record = records.get(instance_id).ok_or_else(|| Self::not_found_instance(instance_id))?;
        Ok(record.works.values().cloned().collect())
    }

    async fn save_context(&self, instance_id: &str, context: Context) -> Result<()> {
        let mut records = self.records.write().expect("persistence store lock poisoned");
        let record = records.get_mut(instance_id).ok_or_else(|| Self::not_found_instance(instance_id))?;
        record.contexts.insert(context.id.clone(), context);
        Ok(())
    }

    async fn get_context(&self, instance_id: &str, context_id: &ContextId) -> Result<Context> {
        let records = self.records.read().expect("persistence store lock poisoned");
        let record = records.get(instance_id).ok_or_else(|| Self::not_found_instance(instance_id))?;
        record
            .contexts
            .get(context_id)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(format!("context '{context_id}' not found in instance '{instance_id}'")))
    }

    async fn list_contexts(&self, instance_id: &str) -> Result<Vec<Context>> {
        let records = self.records.read().expect("persistence store lock poisoned");
        let record = records.get(instance_id).ok_or_else(|| Self::not_found_instance(instance_id))?;
        Ok(record.contexts.values().cloned().collect())
    }

    async fn cleanup(&self) -> Result<()> {
        self.instances.write().expect("persistence store lock poisoned").clear();
        self.records.write().expect("persistence store lock poisoned").clear();
        Ok(())
    }

    async fn get_stats(&self) -> Result<HashMap<String, usize>> {
        let instances = self.instances.read().expect("persistence store lock poisoned");
        let records = self.records.read().expect("persistence store lock poisoned");
        let mut stats = HashMap::new();
        stats.insert("workflow_instances".to_string(), instances.len());
        stats.insert("total_states".to_string(), records.values().map(|r| r.states.len()).sum());
        stats.insert("total_transitions".to_string(), records.values().map(|r| r.transitions.len()).sum());
        stats.insert("total_work".to_string(), records.values().map(|r| r.works.len()).sum());
        stats.insert("total_contexts".to_string(), records.values().map(|r| r.contexts.len()).sum());
        Ok(stats)
    }
}
