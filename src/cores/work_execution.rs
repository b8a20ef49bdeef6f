// Type-keyed registry of WorkExecutors, dispatching Work under concurrency

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::atoms::{Context, Work, WorkId, WorkStatus, WorkType};
use crate::cancellation::CancellationToken;
use crate::error::{Result, WorkflowError};

/// A log line emitted by an executor while it runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
    pub source: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkIo {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub cpu_usage: f64,
    pub memory_usage: u64,
    pub network_io: NetworkIo,
}

/// What a `WorkExecutor::execute` call returns to the core. Distinct from
/// [`WorkExecutionResult`], which is what the core records in its own
/// ledger after folding this in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkResult {
    pub success: bool,
    pub outputs: HashMap<String, Value>,
    pub logs: Vec<LogEntry>,
    pub metrics: Option<ExecutionMetrics>,
    pub error: Option<String>,
}

impl WorkResult {
    pub fn success(output: Value) -> Self {
        let mut outputs = HashMap::new();
        outputs.insert("result".to_string(), output);
        Self {
            success: true,
            outputs,
            logs: Vec::new(),
            metrics: None,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            outputs: HashMap::new(),
            logs: Vec::new(),
            metrics: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorSchema {
    pub json_schema: String,
    pub examples: Vec<Value>,
    pub documentation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorMetadata {
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub work_types: Vec<String>,
}

/// The reconciled executor contract: core-facing `execute`/`can_execute`/
/// `supported_types` (§4.2) plus the external plug-in's `validate`/
/// `schema`/`metadata` (§6), unified under one trait with the
/// cancellation token threaded as the first argument to every call (§5).
#[async_trait]
pub trait WorkExecutor: Send + Sync {
    async fn execute(&self, token: &CancellationToken, work: &Work, context: &Context) -> Result<WorkResult>;

    fn can_execute(&self, work_type: &WorkType) -> bool {
        self.supported_types().contains(work_type)
    }

    fn supported_types(&self) -> Vec<WorkType>;

    /// Pre-flight validation of a work item before dispatch. Defaults to a
    /// no-op; concrete executors override it to check their own envelope.
    fn validate(&self, _work: &Work) -> Result<()> {
        Ok(())
    }

    fn schema(&self) -> ExecutorSchema {
        ExecutorSchema::default()
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata::default()
    }
}

/// The core's own record of one completed or cancelled dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkExecutionResult {
    pub work_id: WorkId,
    pub status: WorkStatus,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

#[derive(Default)]
struct Inner {
    executors: HashMap<WorkType, Arc<dyn WorkExecutor>>,
    active_work: HashMap<WorkId, Work>,
    execution_results: HashMap<WorkId, WorkExecutionResult>,
}

/// Maintains the executor registry, the in-flight `activeWork` set, and the
/// `executionResults` ledger, all behind one lock. `ExecuteWork` records
/// "active" membership, releases the lock, awaits the plug-in, then
/// reacquires the lock to finalize — the one suspension point this core has.
pub struct WorkExecutionCore {
    inner: RwLock<Inner>,
}

impl Default for WorkExecutionCore {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkExecutionCore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    pub async fn register_executor(&self, work_type: WorkType, executor: Arc<dyn WorkExecutor>) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.executors.contains_key(&work_type) {
            return Err(WorkflowError::Registry(format!(
                "executor for work type '{work_type}' already registered"
            )));
        }
        debug!(work_type = %work_type, "registering work executor");
        inner.executors.insert(work_type, executor);
        Ok(())
    }

    pub async fn unregister_executor(&self, work_type: &WorkType) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.executors.remove(work_type).is_none() {
            return Err(WorkflowError::Registry(format!(
                "no executor registered for work type '{work_type}'"
            )));
        }
        Ok(())
    }

    pub async fn execute_work(
        &self,
        token: &CancellationToken,
        work: Work,
        context: &Context,
    ) -> Result<WorkExecutionResult> {
        work.validate()?;
        if !work.is_executable() {
            return Err(WorkflowError::Validation(format!(
                "work '{}' is not executable in status {:?}",
                work.id, work.status
            )));
        }

        let executor = {
            let mut inner = self.inner.write().await;
            if inner.active_work.contains_key(&work.id) {
                return Err(WorkflowError::Registry(format!(
                    "work '{}' is already active",
                    work.id
                )));
            }
            let executor = inner
                .executors
                .get(&work.work_type)
                .cloned()
                .ok_or_else(|| WorkflowError::Registry(format!("no executor for work type '{}'", work.work_type)))?;
            let started = work.start();
            inner.active_work.insert(started.id.clone(), started);
            executor
        };
        // Lock released across the plug-in call so registrations and
        // queries against other work items don't stall on this one.

        let started_at = Utc::now();
        let outcome = executor.execute(token, &work, context).await;

        let mut inner = self.inner.write().await;
        inner.active_work.remove(&work.id);
        let completed_at = Utc::now();
        let duration_ms = (completed_at - started_at).num_milliseconds();

        let result = match outcome {
            Ok(work_result) if work_result.success => WorkExecutionResult {
                work_id: work.id.clone(),
                status: WorkStatus::Completed,
                output: work_result.outputs.get("result").cloned(),
                error: None,
                started_at,
                completed_at,
                duration_ms,
            },
            Ok(work_result) => WorkExecutionResult {
                work_id: work.id.clone(),
                status: WorkStatus::Failed,
                output: None,
                error: Some(work_result.error.unwrap_or_else(|| "work executor reported failure".to_string())),
                started_at,
                completed_at,
                duration_ms,
            },
            Err(err) => {
                warn!(work_id = %work.id, error = %err, "work executor returned an error");
                WorkExecutionResult {
                    work_id: work.id.clone(),
                    status: WorkStatus::Failed,
                    output: None,
                    error: Some(err.to_string()),
                    started_at,
                    completed_at,
                    duration_ms,
                }
            }
        };
        inner.execution_results.insert(work.id.clone(), result.clone());
        Ok(result)
    }

    pub async fn cancel_work(&self, id: &WorkId) -> Result<WorkExecutionResult> {
        let mut inner = self.inner.write().await;
        let active = inner
            .active_work
            .remove(id)
            .ok_or_else(|| WorkflowError::NotFound(format!("work '{id}' is not active")))?;
        let completed_at = Utc::now();
        let started_at = active.started_at.unwrap_or(completed_at);
        let result = WorkExecutionResult {
            work_id: id.clone(),
            status: WorkStatus::Cancelled,
            output: None,
            error: Some("work was cancelled".to_string()),
            started_at,
            completed_at,
            duration_ms: (completed_at - started_at).num_milliseconds(),
        };
        inner.execution_results.insert(id.clone(), result.clone());
        Ok(result)
    }

    pub async fn is_work_active(&self, id: &WorkId) -> bool {
        self.inner.read().await.active_work.contains_key(id)
    }

    pub async fn get_active_work(&self) -> Vec<Work> {
        self.inner.read().await.active_work.values().cloned().collect()
    }

    pub async fn get_execution_result(&self, id: &WorkId) -> Option<WorkExecutionResult> {
        self.inner.read().await.execution_results.get(id).cloned()
    }

    pub async fn get_all_execution_results(&self) -> Vec<WorkExecutionResult> {
        self.inner.read().await.execution_results.values().cloned().collect()
    }

    pub async fn get_supported_work_types(&self) -> Vec<WorkType> {
        self.inner.read().await.executors.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::ContextScope;

    struct EchoExecutor;

    #[async_trait]
    impl WorkExecutor for EchoExecutor {
        async fn execute(&self, _token: &CancellationToken, work: &Work, _context: &Context) -> Result<WorkResult> {
            Ok(WorkResult::success(serde_json::json!({ "echoed": work.id.to_string() })))
        }

        fn supported_types(&self) -> Vec<WorkType> {
            vec![WorkType::new("task")]
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl WorkExecutor for FailingExecutor {
        async fn execute(&self, _token: &CancellationToken, _work: &Work, _context: &Context) -> Result<WorkResult> {
            Ok(WorkResult::failure("boom"))
        }

        fn supported_types(&self) -> Vec<WorkType> {
            vec![WorkType::new("task")]
        }
    }

    fn ctx() -> Context {
        Context::new("ctx0", ContextScope::Workflow, "wf")
    }

    #[tokio::test]
    async fn register_rejects_duplicate_type() {
        let core = WorkExecutionCore::new();
        core.register_executor(WorkType::new("task"), Arc::new(EchoExecutor)).await.unwrap();
        let err = core
            .register_executor(WorkType::new("task"), Arc::new(EchoExecutor))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Registry(_)));
    }

    #[tokio::test]
    async fn execute_work_completes_and_clears_active_set() {
        let core = WorkExecutionCore::new();
        core.register_executor(WorkType::new("task"), Arc::new(EchoExecutor)).await.unwrap();
        let work = Work::new("w0", "task", "do it");
        let token = CancellationToken::new();
        let result = core.execute_work(&token, work.clone(), &ctx()).await.unwrap();
        assert_eq!(result.status, WorkStatus::Completed);
        assert!(!core.is_work_active(&work.id).await);
        assert!(core.get_execution_result(&work.id).await.is_some());
    }

    #[tokio::test]
    async fn executor_error_lands_in_result_not_as_call_error() {
        let core = WorkExecutionCore::new();
        core.register_executor(WorkType::new("task"), Arc::new(FailingExecutor)).await.unwrap();
        let work = Work::new("w0", "task", "do it");
        let token = CancellationToken::new();
        let result = core.execute_work(&token, work, &ctx()).await.unwrap();
        assert_eq!(result.status, WorkStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn execute_work_rejects_non_executable_status() {
        let core = WorkExecutionCore::new();
        core.register_executor(WorkType::new("task"), Arc::new(EchoExecutor)).await.unwrap();
        let work = Work::new("w0", "task", "do it").with_status(WorkStatus::Completed);
        let token = CancellationToken::new();
        assert!(core.execute_work(&token, work, &ctx()).await.is_err());
    }

    #[tokio::test]
    async fn cancel_work_requires_active_membership() {
        let core = WorkExecutionCore::new();
        let err = core.cancel_work(&WorkId::new("missing")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }
}
