// Coordinates instances through states: evaluates guards, dispatches work,
// persists progress, and notifies lifecycle/error collaborators.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::warn;

use crate::atoms::{ConditionType, Context, StateType, Transition, Work, WorkId, WorkType};
use crate::cores::{ConditionEvaluationCore, ConditionEvaluator, StateMachineCore, WorkExecutionCore, WorkExecutor};
use crate::error::{Result, WorkflowError};
use crate::runtime::error_handler::ErrorHandler;
use crate::runtime::instance::{InstanceStatus, WorkflowInstance};
use crate::runtime::lifecycle::{LifecycleEventType, LifecycleManager};
use crate::runtime::persistence::StatePersistenceStore;
use crate::runtime::transition_evaluator::{DefaultTransitionEvaluator, TransitionEvaluator};
use crate::workflow::WorkflowDefinition;

/// Hard cap on `ExecuteWorkflow` steps, guarding against transition cycles
/// with no guard pruning (scenario 6).
pub const MAX_EXECUTION_STEPS: usize = 1000;

fn is_not_running(err: &WorkflowError) -> bool {
    matches!(err, WorkflowError::LifecyclePrecondition(msg) if msg.contains("not running"))
}

/// Owns every Tier-B core plus the Tier-C collaborators (persistence,
/// transition evaluation, error handling, lifecycle), and drives
/// `WorkflowInstance`s through their states. Per the single-shared-core
/// design: the engine adopts a definition's state machine graph wholesale
/// into its own `StateMachineCore` at `start_workflow` time rather than
/// keeping one core per definition (see the open-decision note in
/// DESIGN.md); per-instance position is tracked on the instance's own
/// `current_state_id`, not the core's single `currentState` field.
pub struct RuntimeEngine {
    state_machine: StateMachineCore,
    work_execution: WorkExecutionCore,
    condition_evaluation: Arc<ConditionEvaluationCore>,
    persistence: Arc<dyn StatePersistenceStore>,
    transition_evaluator: Arc<dyn TransitionEvaluator>,
    error_handler: ErrorHandler,
    lifecycle: LifecycleManager,
    active_instances: RwLock<HashMap<String, WorkflowInstance>>,
    in_flight_work: RwLock<HashMap<String, Vec<WorkId>>>,
}

impl RuntimeEngine {
    pub fn new(persistence: Arc<dyn StatePersistenceStore>) -> Self {
        let condition_evaluation = Arc::new(ConditionEvaluationCore::new());
        let transition_evaluator = Arc::new(DefaultTransitionEvaluator::new(condition_evaluation.clone()));
        Self {
            state_machine: StateMachineCore::new(),
            work_execution: WorkExecutionCore::new(),
            condition_evaluation,
            persistence,
            transition_evaluator,
            error_handler: ErrorHandler::new(),
            lifecycle: LifecycleManager::new(),
            active_instances: RwLock::new(HashMap::new()),
            in_flight_work: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register_work_executor(&self, work_type: WorkType, executor: Arc<dyn WorkExecutor>) -> Result<()> {
        self.work_execution.register_executor(work_type, executor).await
    }

    pub async fn register_condition_evaluator(&self, condition_type: ConditionType, evaluator: Arc<dyn ConditionEvaluator>) -> Result<()> {
        self.condition_evaluation.register_evaluator(condition_type, evaluator).await
    }

    pub fn error_handler(&self) -> &ErrorHandler {
        &self.error_handler
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    fn adopt_state_machine(&self, definition: &WorkflowDefinition) {
        self.state_machine.clear();
        for state in definition.state_machine.get_all_states() {
            // Definition states were already validated at definition.validate()
            // time; adoption failures here would indicate definition/engine
            // drift, which should surface loudly rather than be swallowed.
            self.state_machine.add_state(state).expect("adopted state failed re-validation");
        }
    }

    pub async fn start_workflow(&self, definition: &WorkflowDefinition, initial_context: Context) -> Result<String> {
        if !definition.can_execute() {
            return Err(WorkflowError::Validation(format!(
                "definition '{}' cannot execute (not active, or invalid)",
                definition.id
            )));
        }

        self.adopt_state_machine(definition);
        for transition in all_transitions(definition) {
            self.state_machine.add_transition(transition)?;
        }

        let mut instance = WorkflowInstance::new(
            definition.id.clone(),
            definition.version.clone(),
            definition.initial_state_id.clone(),
            initial_context,
        );
        instance.status = InstanceStatus::Created;
        self.persistence.save_workflow_instance(instance.clone()).await?;
        self.lifecycle
            .notify(&instance.id, LifecycleEventType::WorkflowStarted, Value::Null);

        instance.start();
        self.persistence.update_workflow_instance(instance.clone()).await?;

        let instance_id = instance.id.clone();
        self.active_instances.write().await.insert(instance_id.clone(), instance);
        Ok(instance_id)
    }

    /// Drive one step: evaluate outgoing transitions from the instance's
    /// current state and fire the first one that both passes its guard and
    /// executes successfully. Returns `Ok(())` if the instance reached a
    /// final state and was stopped, or if a transition fired successfully.
    pub async fn execute_step(&self, instance_id: &str) -> Result<()> {
        let mut instance = {
            let instances = self.active_instances.read().await;
            instances
                .get(instance_id)
                .cloned()
                .ok_or_else(|| WorkflowError::NotFound(format!("instance '{instance_id}' not found")))?
        };
        if instance.status != InstanceStatus::Running {
            return Err(WorkflowError::LifecyclePrecondition(format!(
                "instance '{instance_id}' is not running (status: {:?})",
                instance.status
            )));
        }

        let current_state = self
            .state_machine
            .get_state(&instance.current_state_id)
            .ok_or_else(|| WorkflowError::StateMachine(format!("current state '{}' not found", instance.current_state_id)))?;

        if matches!(current_state.state_type, StateType::Final) {
            return self.stop_workflow(instance_id).await;
        }

        let outgoing = self.state_machine.get_transitions_from_state(&instance.current_state_id);
        if outgoing.is_empty() {
            return Err(WorkflowError::StateMachine("no valid transitions".to_string()));
        }

        for transition in outgoing {
            match self.transition_evaluator.can_transition(&transition, &instance.context).await {
                Ok(true) => match self.execute_transition(&mut instance, &transition).await {
                    Ok(()) => {
                        self.active_instances
                            .write()
                            .await
                            .insert(instance_id.to_string(), instance.clone());
                        self.persistence.update_workflow_instance(instance).await?;
                        return Ok(());
                    }
                    Err(err) => {
                        self.error_handler.handle_error(
                            instance_id,
                            format!("transition execution error: {err}"),
                            Some(instance.context.clone()),
                        );
                        continue;
                    }
                },
                Ok(false) => continue,
                Err(err) => {
                    self.error_handler.handle_error(
                        instance_id,
                        format!("transition evaluation error: {err}"),
                        Some(instance.context.clone()),
                    );
                    continue;
                }
            }
        }

        Err(WorkflowError::StateMachine("no valid transitions".to_string()))
    }

    async fn execute_transition(&self, instance: &mut WorkflowInstance, transition: &Transition) -> Result<()> {
        let mut context = instance.context.clone();
        for work_id in &transition.actions {
            let work = Work::new(work_id.clone(), "task", format!("Action {work_id}"));
            self.in_flight_work
                .write()
                .await
                .entry(instance.id.clone())
                .or_default()
                .push(work_id.clone());

            let base_token = crate::cancellation::CancellationToken::new();
            let timeout_seconds = work.configuration.timeout_seconds;
            let token = if timeout_seconds > 0 {
                base_token.child_with_timeout(std::time::Duration::from_secs(timeout_seconds))
            } else {
                base_token
            };
            let result = self.work_execution.execute_work(&token, work, &context).await?;

            {
                let mut in_flight = self.in_flight_work.write().await;
                if let Some(ids) = in_flight.get_mut(&instance.id) {
                    ids.retain(|id| id != work_id);
                }
            }

            if matches!(result.status, crate::atoms::WorkStatus::Failed) {
                return Err(WorkflowError::ExecutorFailed(
                    result.error.unwrap_or_else(|| format!("action '{work_id}' failed")),
                ));
            }

            if let Some(output) = result.output {
                context = context.set(format!("work_{work_id}_output"), output);
            }
        }

        instance.set_context(context);
        instance.set_current_state(transition.to.clone());
        self.lifecycle.notify(
            &instance.id,
            LifecycleEventType::StateChanged,
            serde_json::json!({ "to_state": transition.to.to_string() }),
        );
        Ok(())
    }

    /// Repeatedly `execute_step`, capped at [`MAX_EXECUTION_STEPS`] to guard
    /// against unpruned cycles. A step error indicating the instance is no
    /// longer running is graceful completion; any other error propagates.
    pub async fn execute_workflow(&self, instance_id: &str) -> Result<()> {
        for _ in 0..MAX_EXECUTION_STEPS {
            match self.execute_step(instance_id).await {
                Ok(()) => {
                    let status = self.get_workflow_status(instance_id).await?;
                    if status.is_terminal() {
                        return Ok(());
                    }
                }
                Err(err) if is_not_running(&err) => return Ok(()),
                Err(err) => return Err(err),
            }
        }
        Err(WorkflowError::BudgetExceeded(MAX_EXECUTION_STEPS))
    }

    pub async fn stop_workflow(&self, instance_id: &str) -> Result<()> {
        let mut instance = self.require_active(instance_id).await?;
        if instance.status != InstanceStatus::Running {
            return Err(WorkflowError::LifecyclePrecondition(format!(
                "cannot stop instance '{instance_id}' in status {:?}",
                instance.status
            )));
        }
        instance.complete();
        self.persistence.update_workflow_instance(instance.clone()).await?;
        self.active_instances.write().await.remove(instance_id);
        self.lifecycle
            .notify(instance_id, LifecycleEventType::WorkflowCompleted, Value::Null);
        Ok(())
    }

    pub async fn pause_workflow(&self, instance_id: &str) -> Result<()> {
        let mut instance = self.require_active(instance_id).await?;
        if instance.status != InstanceStatus::Running {
            return Err(WorkflowError::LifecyclePrecondition(format!(
                "cannot pause instance '{instance_id}' in status {:?}",
                instance.status
            )));
        }
        instance.pause();
        self.persistence.update_workflow_instance(instance.clone()).await?;
        self.active_instances.write().await.insert(instance_id.to_string(), instance);
        self.lifecycle.notify(instance_id, LifecycleEventType::WorkflowPaused, Value::Null);
        Ok(())
    }

    pub async fn resume_workflow(&self, instance_id: &str) -> Result<()> {
        let mut instance = self.require_active(instance_id).await?;
        if instance.status != InstanceStatus::Paused {
            return Err(WorkflowError::LifecyclePrecondition(format!(
                "cannot resume instance '{instance_id}' in status {:?}",
                instance.status
            )));
        }
        instance.resume();
        self.persistence.update_workflow_instance(instance.clone()).await?;
        self.active_instances.write().await.insert(instance_id.to_string(), instance);
        self.lifecycle.notify(instance_id, LifecycleEventType::WorkflowResumed, Value::Null);
        Ok(())
    }

    pub async fn cancel_workflow(&self, instance_id: &str) -> Result<()> {
        let mut instance = self.require_active(instance_id).await?;
        if instance.status.is_terminal() {
            return Err(WorkflowError::LifecyclePrecondition(format!(
                "instance '{instance_id}' is already terminal ({:?})",
                instance.status
            )));
        }
        instance.cancel();
        self.persistence.update_workflow_instance(instance.clone()).await?;
        self.active_instances.write().await.remove(instance_id);

        let in_flight = self.in_flight_work.write().await.remove(instance_id).unwrap_or_default();
        for work_id in in_flight {
            if self.work_execution.is_work_active(&work_id).await {
                if let Err(err) = self.work_execution.cancel_work(&work_id).await {
                    warn!(work_id = %work_id, error = %err, "failed to cancel in-flight work");
                }
            }
        }

        self.lifecycle.notify(instance_id, LifecycleEventType::WorkflowCancelled, Value::Null);
        Ok(())
    }

    /// Cancels every active instance and clears the map in one pass;
    /// never reacquires the per-instance lock mid-shutdown.
    pub async fn shutdown(&self) -> Result<()> {
        let ids: Vec<String> = self.active_instances.read().await.keys().cloned().collect();
        for id in ids {
            if let Err(err) = self.cancel_workflow_unsafe(&id).await {
                warn!(instance_id = %id, error = %err, "failed to cancel instance during shutdown");
            }
        }
        self.active_instances.write().await.clear();
        Ok(())
    }

    /// Shutdown's private variant of `cancel_workflow`: does the same
    /// persistence/lifecycle work but leaves removal from `active_instances`
    /// to the caller's own bulk `clear()`, since `shutdown` already holds
    /// (and will continue to hold) the map across the whole pass.
    async fn cancel_workflow_unsafe(&self, instance_id: &str) -> Result<()> {
        let mut instance = {
            let instances = self.active_instances.read().await;
            instances
                .get(instance_id)
                .cloned()
                .ok_or_else(|| WorkflowError::NotFound(format!("instance '{instance_id}' not found")))?
        };
        if instance.status.is_terminal() {
            return Ok(());
        }
        instance.cancel();
        self.persistence.update_workflow_instance(instance).await?;

        let in_flight = self.in_flight_work.write().await.remove(instance_id).unwrap_or_default();
        for work_id in in_flight {
            if self.work_execution.is_work_active(&work_id).await {
                let _ = self.work_execution.cancel_work(&work_id).await;
            }
        }
        self.lifecycle.notify(instance_id, LifecycleEventType::WorkflowCancelled, Value::Null);
        Ok(())
    }

    async fn require_active(&self, instance_id: &str) -> Result<WorkflowInstance> {
        self.active_instances
            .read()
            .await
            .get(instance_id)
            .cloned()
            .ok_or_else(|| WorkflowError::NotFound(format!("instance '{instance_id}' not found")))
    }

    pub async fn get_workflow_instance(&self, instance_id: &str) -> Result<WorkflowInstance> {
        if let Some(instance) = self.active_instances.read().await.get(instance_id) {
            return Ok(instance.clone());
        }
        self.persistence.get_workflow_instance(instance_id).await
    }

    pub async fn get_workflow_status(&self, instance_id: &str) -> Result<InstanceStatus> {
        Ok(self.get_workflow_instance(instance_id).await?.status)
    }

    pub async fn list_active_workflows(&self) -> Vec<String> {
        self.active_instances.read().await.keys().cloned().collect()
    }
}

fn all_transitions(definition: &WorkflowDefinition) -> Vec<Transition> {
    definition
        .state_machine
        .get_all_states()
        .iter()
        .flat_map(|s| definition.state_machine.get_transitions_from_state(&s.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::{ContextScope, State, StateId, StateType, TransitionType};
    use crate::cores::{WorkExecutor as _, WorkResult};
    use crate::runtime::persistence::InMemoryPersistenceStore;
    use crate::workflow::WorkflowDefinition;
    use async_trait::async_trait;

    fn two_state_definition(with_guard: bool) -> WorkflowDefinition {
        let sm = StateMachineCore::new();
        sm.add_state(State::new("s0", StateType::Initial, "start")).unwrap();
        sm.add_state(State::new("s1", StateType::Final, "end")).unwrap();
        let mut t = Transition::new("t0", TransitionType::Automatic, "s0", "s1", "go");
        if with_guard {
            t = t.with_conditions(vec![crate::atoms::ConditionId::new("process_data")]);
        }
        sm.add_transition(t).unwrap();
        WorkflowDefinition::new("def0", "1.0.0", "demo", sm, "s0")
            .with_final_states(["s1".into()])
            .activate()
    }

    #[tokio::test]
    async fn trivial_two_state_workflow_completes() {
        let engine = RuntimeEngine::new(Arc::new(InMemoryPersistenceStore::new()));
        let def = two_state_definition(false);
        let ctx = Context::new("ctx0", ContextScope::Workflow, "wf");
        let instance_id = engine.start_workflow(&def, ctx).await.unwrap();
        engine.execute_workflow(&instance_id).await.unwrap();
        let instance = engine.get_workflow_instance(&instance_id).await.unwrap();
        assert_eq!(instance.status, InstanceStatus::Completed);
        assert_eq!(instance.current_state_id, StateId::new("s1"));
        let events = engine.lifecycle().get_events(&instance_id);
        assert!(events.iter().any(|e| e.event_type == LifecycleEventType::WorkflowStarted));
        assert!(events.iter().any(|e| e.event_type == LifecycleEventType::WorkflowCompleted));
    }

    #[tokio::test]
    async fn guarded_transition_blocks_on_explicit_false_flag() {
        let engine = RuntimeEngine::new(Arc::new(InMemoryPersistenceStore::new()));
        let def = two_state_definition(true);
        let ctx = Context::new("ctx0", ContextScope::Workflow, "wf").set("process_data", serde_json::json!(false));
        let instance_id = engine.start_workflow(&def, ctx).await.unwrap();
        let err = engine.execute_step(&instance_id).await.unwrap_err();
        assert!(err.to_string().contains("no valid transitions"));
    }

    #[tokio::test]
    async fn guarded_transition_fires_when_context_flag_absent() {
        let engine = RuntimeEngine::new(Arc::new(InMemoryPersistenceStore::new()));
        let def = two_state_definition(true);
        let ctx = Context::new("ctx0", ContextScope::Workflow, "wf");
        let instance_id = engine.start_workflow(&def, ctx).await.unwrap();
        engine.execute_workflow(&instance_id).await.unwrap();
        assert_eq!(engine.get_workflow_status(&instance_id).await.unwrap(), InstanceStatus::Completed);
    }

    #[tokio::test]
    async fn guarded_transition_fires_with_context_flag() {
        let engine = RuntimeEngine::new(Arc::new(InMemoryPersistenceStore::new()));
        let def = two_state_definition(true);
        let ctx = Context::new("ctx0", ContextScope::Workflow, "wf").set("process_data", serde_json::json!(true));
        let instance_id = engine.start_workflow(&def, ctx).await.unwrap();
        engine.execute_workflow(&instance_id).await.unwrap();
        assert_eq!(engine.get_workflow_status(&instance_id).await.unwrap(), InstanceStatus::Completed);
    }

    #[tokio::test]
    async fn pause_resume_then_completes() {
        let engine = RuntimeEngine::new(Arc::new(InMemoryPersistenceStore::new()));
        let def = two_state_definition(false);
        let ctx = Context::new("ctx0", ContextScope::Workflow, "wf");
        let instance_id = engine.start_workflow(&def, ctx).await.unwrap();
        engine.pause_workflow(&instance_id).await.unwrap();
        assert_eq!(engine.get_workflow_status(&instance_id).await.unwrap(), InstanceStatus::Paused);
        engine.resume_workflow(&instance_id).await.unwrap();
        assert_eq!(engine.get_workflow_status(&instance_id).await.unwrap(), InstanceStatus::Running);
        engine.execute_workflow(&instance_id).await.unwrap();
        assert_eq!(engine.get_workflow_status(&instance_id).await.unwrap(), InstanceStatus::Completed);
    }

    #[tokio::test]
    async fn cancel_removes_from_active_and_marks_cancelled() {
        let engine = RuntimeEngine::new(Arc::new(InMemoryPersistenceStore::new()));
        let def = two_state_definition(false);
        let ctx = Context::new("ctx0", ContextScope::Workflow, "wf");
        let instance_id = engine.start_workflow(&def, ctx).await.unwrap();
        engine.cancel_workflow(&instance_id).await.unwrap();
        assert!(!engine.list_active_workflows().await.contains(&instance_id));
        assert_eq!(engine.get_workflow_status(&instance_id).await.unwrap(), InstanceStatus::Cancelled);
    }

    struct FailingExecutor;

    #[async_trait]
    impl WorkExecutor for FailingExecutor {
        async fn execute(&self, _token: &crate::cancellation::CancellationToken, _work: &Work, _context: &Context) -> Result<WorkResult> {
            Ok(WorkResult::failure("executor refused to run"))
        }

        fn supported_types(&self) -> Vec<WorkType> {
            vec![WorkType::new("task")]
        }
    }

    #[tokio::test]
    async fn executor_failure_routes_through_error_handler() {
        let engine = RuntimeEngine::new(Arc::new(InMemoryPersistenceStore::new()));
        engine
            .register_work_executor(WorkType::new("task"), Arc::new(FailingExecutor))
            .await
            .unwrap();

        let sm = StateMachineCore::new();
        sm.add_state(State::new("s0", StateType::Initial, "start")).unwrap();
        sm.add_state(State::new("s1", StateType::Final, "end")).unwrap();
        let t = Transition::new("t0", TransitionType::Automatic, "s0", "s1", "go")
            .with_actions(vec![crate::atoms::WorkId::new("a1")]);
        sm.add_transition(t).unwrap();
        let def = WorkflowDefinition::new("def0", "1.0.0", "demo", sm, "s0")
            .with_final_states(["s1".into()])
            .activate();

        let ctx = Context::new("ctx0", ContextScope::Workflow, "wf");
        let instance_id = engine.start_workflow(&def, ctx).await.unwrap();
        let err = engine.execute_step(&instance_id).await.unwrap_err();
        assert!(err.to_string().contains("no valid transitions"));

        let errors = engine.error_handler().get_errors(&instance_id);
        assert!(errors.iter().any(|e| e.message.contains("transition execution error")));
    }

    #[tokio::test]
    async fn cycle_guard_hits_the_step_budget() {
        let engine = RuntimeEngine::new(Arc::new(InMemoryPersistenceStore::new()));
        let sm = StateMachineCore::new();
        sm.add_state(State::new("a", StateType::Initial, "a")).unwrap();
        sm.add_state(State::new("b", StateType::Intermediate, "b")).unwrap();
        sm.add_transition(Transition::new("a_to_b", TransitionType::Automatic, "a", "b", "go")).unwrap();
        sm.add_transition(Transition::new("b_to_a", TransitionType::Automatic, "b", "a", "back")).unwrap();
        let def = WorkflowDefinition::new("def0", "1.0.0", "cycle", sm, "a").activate();

        let ctx = Context::new("ctx0", ContextScope::Workflow, "wf");
        let instance_id = engine.start_workflow(&def, ctx).await.unwrap();
        let err = engine.execute_workflow(&instance_id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::BudgetExceeded(MAX_EXECUTION_STEPS)));
    }
}
