// Integration tests against the public API, covering the concrete
// end-to-end scenarios from the runtime's testable-properties section.

use std::sync::Arc;

use async_trait::async_trait;

use workflow_runtime::atoms::{
    ConditionId, Context, ContextScope, State, StateId, StateType, Transition, TransitionType, Work, WorkId, WorkStatus, WorkType,
};
use workflow_runtime::cancellation::CancellationToken;
use workflow_runtime::cores::{StateMachineCore, WorkExecutionCore, WorkExecutor, WorkResult};
use workflow_runtime::error::WorkflowError;
use workflow_runtime::runtime::{InMemoryPersistenceStore, InstanceStatus, LifecycleEventType, RuntimeEngine, MAX_EXECUTION_STEPS};
use workflow_runtime::workflow::WorkflowDefinition;

fn engine() -> RuntimeEngine {
    RuntimeEngine::new(Arc::new(InMemoryPersistenceStore::new()))
}

fn workflow_context() -> Context {
    Context::new("ctx", ContextScope::Workflow, "wf")
}

fn two_state_machine() -> (StateMachineCore, StateId, StateId) {
    let sm = StateMachineCore::new();
    sm.add_state(State::new("s0", StateType::Initial, "start")).unwrap();
    sm.add_state(State::new("s1", StateType::Final, "end")).unwrap();
    (sm, StateId::new("s0"), StateId::new("s1"))
}

#[tokio::test]
async fn scenario_1_trivial_two_state_workflow_completes() {
    let engine = engine();
    let (sm, s0, s1) = two_state_machine();
    sm.add_transition(Transition::new("t0", TransitionType::Automatic, s0.clone(), s1.clone(), "go"))
        .unwrap();
    let definition = WorkflowDefinition::new("def-trivial", "1.0.0", "trivial", sm, s0)
        .with_final_states([s1.clone()])
        .activate();

    let instance_id = engine.start_workflow(&definition, workflow_context()).await.unwrap();
    engine.execute_workflow(&instance_id).await.unwrap();

    let instance = engine.get_workflow_instance(&instance_id).await.unwrap();
    assert_eq!(instance.status, InstanceStatus::Completed);
    assert_eq!(instance.current_state_id, s1);

    let events = engine.lifecycle().get_events(&instance_id);
    let types: Vec<_> = events.iter().map(|e| e.event_type).collect();
    assert!(types.contains(&LifecycleEventType::WorkflowStarted));
    assert!(types.contains(&LifecycleEventType::WorkflowCompleted));
    assert!(types.iter().position(|t| *t == LifecycleEventType::WorkflowStarted) < types.iter().position(|t| *t == LifecycleEventType::WorkflowCompleted));
}

#[tokio::test]
async fn scenario_2_guard_via_context() {
    let engine = engine();
    let (sm, s0, s1) = two_state_machine();
    sm.add_transition(
        Transition::new("t0", TransitionType::Automatic, s0.clone(), s1.clone(), "go")
            .with_conditions(vec![ConditionId::new("process_data")]),
    )
    .unwrap();
    let definition = WorkflowDefinition::new("def-guard", "1.0.0", "guard", sm, s0.clone())
        .with_final_states([s1])
        .activate();

    let blocked = engine
        .start_workflow(&definition, workflow_context().set("process_data", serde_json::json!(false)))
        .await
        .unwrap();
    let err = engine.execute_step(&blocked).await.unwrap_err();
    assert!(err.to_string().contains("no valid transitions"));

    let allowed = engine
        .start_workflow(&definition, workflow_context().set("process_data", serde_json::json!(true)))
        .await
        .unwrap();
    engine.execute_workflow(&allowed).await.unwrap();
    assert_eq!(engine.get_workflow_status(&allowed).await.unwrap(), InstanceStatus::Completed);
}

#[tokio::test]
async fn scenario_3_pause_resume() {
    let engine = engine();
    let (sm, s0, s1) = two_state_machine();
    sm.add_transition(Transition::new("t0", TransitionType::Automatic, s0.clone(), s1.clone(), "go"))
        .unwrap();
    let definition = WorkflowDefinition::new("def-pause", "1.0.0", "pause", sm, s0)
        .with_final_states([s1])
        .activate();

    let instance_id = engine.start_workflow(&definition, workflow_context()).await.unwrap();
    engine.pause_workflow(&instance_id).await.unwrap();
    assert_eq!(engine.get_workflow_status(&instance_id).await.unwrap(), InstanceStatus::Paused);
    engine.resume_workflow(&instance_id).await.unwrap();
    assert_eq!(engine.get_workflow_status(&instance_id).await.unwrap(), InstanceStatus::Running);
    engine.execute_workflow(&instance_id).await.unwrap();
    assert_eq!(engine.get_workflow_status(&instance_id).await.unwrap(), InstanceStatus::Completed);
}

#[tokio::test]
async fn scenario_4_cancel_removes_from_active_and_marks_cancelled() {
    let engine = engine();
    let (sm, s0, s1) = two_state_machine();
    sm.add_transition(Transition::new("t0", TransitionType::Automatic, s0.clone(), s1.clone(), "go"))
        .unwrap();
    let definition = WorkflowDefinition::new("def-cancel", "1.0.0", "cancel", sm, s0)
        .with_final_states([s1])
        .activate();

    let instance_id = engine.start_workflow(&definition, workflow_context()).await.unwrap();
    engine.cancel_workflow(&instance_id).await.unwrap();

    assert!(!engine.list_active_workflows().await.contains(&instance_id));
    assert_eq!(engine.get_workflow_status(&instance_id).await.unwrap(), InstanceStatus::Cancelled);

    let err = engine.cancel_workflow(&instance_id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound(_)));
}

struct AlwaysFailsExecutor;

#[async_trait]
impl WorkExecutor for AlwaysFailsExecutor {
    async fn execute(&self, _token: &CancellationToken, _work: &Work, _context: &Context) -> workflow_runtime::Result<WorkResult> {
        Ok(WorkResult::failure("executor refused"))
    }

    fn supported_types(&self) -> Vec<WorkType> {
        vec![WorkType::new("task")]
    }
}

#[tokio::test]
async fn scenario_5_executor_failure_routes_via_error_handler() {
    let engine = engine();
    engine
        .register_work_executor(WorkType::new("task"), Arc::new(AlwaysFailsExecutor))
        .await
        .unwrap();

    let (sm, s0, s1) = two_state_machine();
    sm.add_transition(
        Transition::new("t0", TransitionType::Automatic, s0.clone(), s1.clone(), "go").with_actions(vec![WorkId::new("a1")]),
    )
    .unwrap();
    let definition = WorkflowDefinition::new("def-fail", "1.0.0", "fail", sm, s0)
        .with_final_states([s1])
        .activate();

    let instance_id = engine.start_workflow(&definition, workflow_context()).await.unwrap();
    let err = engine.execute_step(&instance_id).await.unwrap_err();
    assert!(err.to_string().contains("no valid transitions"));

    let errors = engine.error_handler().get_errors(&instance_id);
    assert!(!errors.is_empty());
    assert!(errors[0].message.contains("transition execution error") || errors[0].message.contains("execute"));
    assert_eq!(errors[0].severity, workflow_runtime::runtime::ErrorSeverity::Medium);
}

#[tokio::test]
async fn scenario_6_cycle_guard_hits_step_budget() {
    let engine = engine();
    let sm = StateMachineCore::new();
    sm.add_state(State::new("a", StateType::Initial, "a")).unwrap();
    sm.add_state(State::new("b", StateType::Intermediate, "b")).unwrap();
    sm.add_state(State::new("c", StateType::Intermediate, "c")).unwrap();
    sm.add_transition(Transition::new("a_to_b", TransitionType::Automatic, "a", "b", "go")).unwrap();
    sm.add_transition(Transition::new("b_to_a", TransitionType::Automatic, "b", "a", "back")).unwrap();
    let definition = WorkflowDefinition::new("def-cycle", "1.0.0", "cycle", sm, "a").activate();

    let instance_id = engine.start_workflow(&definition, workflow_context()).await.unwrap();
    let err = engine.execute_workflow(&instance_id).await.unwrap_err();
    match err {
        WorkflowError::BudgetExceeded(steps) => assert_eq!(steps, MAX_EXECUTION_STEPS),
        other => panic!("expected BudgetExceeded, got {other:?}"),
    }
}

#[tokio::test]
async fn fold_law_threads_action_outputs_into_context() {
    struct EchoExecutor;
    #[async_trait]
    impl WorkExecutor for EchoExecutor {
        async fn execute(&self, _token: &CancellationToken, work: &Work, _context: &Context) -> workflow_runtime::Result<WorkResult> {
            Ok(WorkResult::success(serde_json::json!({ "id": work.id.to_string() })))
        }
        fn supported_types(&self) -> Vec<WorkType> {
            vec![WorkType::new("task")]
        }
    }

    let engine = engine();
    engine.register_work_executor(WorkType::new("task"), Arc::new(EchoExecutor)).await.unwrap();

    let (sm, s0, s1) = two_state_machine();
    sm.add_transition(
        Transition::new("t0", TransitionType::Automatic, s0.clone(), s1.clone(), "go").with_actions(vec![WorkId::new("a1")]),
    )
    .unwrap();
    let definition = WorkflowDefinition::new("def-fold", "1.0.0", "fold", sm, s0)
        .with_final_states([s1])
        .activate();

    let instance_id = engine.start_workflow(&definition, workflow_context()).await.unwrap();
    engine.execute_step(&instance_id).await.unwrap();
    let instance = engine.get_workflow_instance(&instance_id).await.unwrap();
    assert_eq!(
        instance.context.get("work_a1_output"),
        Some(&serde_json::json!({ "id": "a1" }))
    );
}

struct BlockingExecutor;

#[async_trait]
impl WorkExecutor for BlockingExecutor {
    async fn execute(&self, token: &CancellationToken, _work: &Work, _context: &Context) -> workflow_runtime::Result<WorkResult> {
        token.cancelled().await;
        Ok(WorkResult::failure("cancelled before completion"))
    }

    fn supported_types(&self) -> Vec<WorkType> {
        vec![WorkType::new("task")]
    }
}

/// The literal scenario 4 from the runtime's testable properties: an
/// in-flight action that blocks on cancellation, cancelled while active,
/// observed as a `Cancelled` entry in `WorkExecutionCore`'s own ledger.
/// Exercised directly against the core (rather than through
/// `RuntimeEngine::cancel_workflow`, whose per-dispatch token isn't linked
/// to the instance-level cancel call) so the blocked action can actually be
/// unblocked afterward instead of leaking a forever-pending task.
#[tokio::test]
async fn scenario_4_cancel_work_mid_flight_records_cancelled_ledger_entry() {
    let core = Arc::new(WorkExecutionCore::new());
    core.register_executor(WorkType::new("task"), Arc::new(BlockingExecutor)).await.unwrap();

    let work_id = WorkId::new("blocked-action");
    let token = CancellationToken::new();

    let spawned_core = core.clone();
    let spawned_token = token.clone();
    let work = Work::new(work_id.clone(), "task", "block until cancelled");
    let handle = tokio::spawn(async move {
        spawned_core.execute_work(&spawned_token, work, &workflow_context()).await
    });

    // Give the spawned task a chance to register itself as active before
    // cancelling; the executor itself doesn't complete until cancelled.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(core.is_work_active(&work_id).await);

    let cancelled = core.cancel_work(&work_id).await.unwrap();
    assert_eq!(cancelled.status, WorkStatus::Cancelled);
    assert!(!core.is_work_active(&work_id).await);

    token.cancel();
    let result = handle.await.unwrap().unwrap();
    assert_eq!(result.status, WorkStatus::Failed);
}
