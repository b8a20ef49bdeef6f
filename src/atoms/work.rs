// A unit of computation dispatched to a pluggable WorkExecutor

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::atoms::metadata::AtomMetadata;
use crate::error::{Result, WorkflowError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkId(String);

impl WorkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WorkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Open-ended work classification — whatever string a `WorkExecutor`
/// registers itself under (e.g. `"task"`, `"cloud_function"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkType(String);

impl WorkType {
    pub fn new(t: impl Into<String>) -> Self {
        Self(t.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WorkType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Pending,
    Scheduled,
    Executing,
    Completed,
    Failed,
    Cancelled,
    Retrying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i32)]
pub enum WorkPriority {
    Low = 1,
    Normal = 5,
    High = 10,
    Critical = 15,
}

/// `Work.Configuration`: timeout/retry envelope plus the free-form
/// `Parameters` bag that carries e.g. the cloud-function `executor_config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkConfiguration {
    pub timeout_seconds: u64,
    pub retry_count: u32,
    pub retry_delay_seconds: u64,
    pub parameters: HashMap<String, Value>,
    pub environment: HashMap<String, String>,
}

impl Default for WorkConfiguration {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_count: 0,
            retry_delay_seconds: 0,
            parameters: HashMap::new(),
            environment: HashMap::new(),
        }
    }
}

impl WorkConfiguration {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_seconds == 0 {
            return Err(WorkflowError::Validation(
                "work configuration timeout_seconds must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// A dispatchable unit of computation, owned by a
/// [`crate::cores::work_execution::WorkExecutionCore`] registry while in
/// flight. Opaque `input`/`output`/`error` are reference-copied per the
/// data-model's opaque-payload rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Work {
    pub id: WorkId,
    pub work_type: WorkType,
    pub status: WorkStatus,
    pub priority: WorkPriority,
    pub input: Option<Arc<Value>>,
    pub output: Option<Arc<Value>>,
    pub error: Option<String>,
    pub compensation_work_id: Option<WorkId>,
    pub configuration: WorkConfiguration,
    pub started_at: Option<DateTime<Utc>>,
    pub metadata: AtomMetadata,
}

impl Work {
    pub fn new(id: impl Into<WorkId>, work_type: impl Into<WorkType>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            work_type: work_type.into(),
            status: WorkStatus::Pending,
            priority: WorkPriority::Normal,
            input: None,
            output: None,
            error: None,
            compensation_work_id: None,
            configuration: WorkConfiguration::default(),
            started_at: None,
            metadata: AtomMetadata::new(name),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.metadata.validate()?;
        if self.id.as_str().trim().is_empty() {
            return Err(WorkflowError::Validation("work id must not be empty".to_string()));
        }
        self.configuration.validate()
    }

    /// True iff `ExecuteWork` is permitted to dispatch this item.
    pub fn is_executable(&self) -> bool {
        matches!(self.status, WorkStatus::Pending | WorkStatus::Scheduled | WorkStatus::Retrying)
    }

    /// True iff this work both names a compensating action and has
    /// completed — the condition under which compensation may run.
    pub fn requires_compensation(&self) -> bool {
        self.compensation_work_id.is_some() && matches!(self.status, WorkStatus::Completed)
    }

    pub fn with_input(&self, input: Value) -> Self {
        let mut copy = self.clone();
        copy.input = Some(Arc::new(input));
        copy.metadata = copy.metadata.touch();
        copy
    }

    pub fn with_status(&self, status: WorkStatus) -> Self {
        let mut copy = self.clone();
        copy.status = status;
        copy.metadata = copy.metadata.touch();
        copy
    }

    /// Produce the "executing" copy `ExecuteWork` inserts into `activeWork`:
    /// status flips to `executing` and `started_at` is stamped.
    pub fn start(&self) -> Self {
        let mut copy = self.clone();
        copy.status = WorkStatus::Executing;
        copy.started_at = Some(Utc::now());
        copy.metadata = copy.metadata.touch();
        copy
    }

    pub fn with_output(&self, output: Value) -> Self {
        let mut copy = self.clone();
        copy.output = Some(Arc::new(output));
        copy.status = WorkStatus::Completed;
        copy.metadata = copy.metadata.touch();
        copy
    }

    pub fn with_error(&self, error: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.error = Some(error.into());
        copy.status = WorkStatus::Failed;
        copy.metadata = copy.metadata.touch();
        copy
    }

    pub fn with_compensation(&self, compensation_work_id: impl Into<WorkId>) -> Self {
        let mut copy = self.clone();
        copy.compensation_work_id = Some(compensation_work_id.into());
        copy.metadata = copy.metadata.touch();
        copy
    }
}
