// Reference cloud-function executor: envelope parsing and provider
// projection only — no network I/O. Concrete AWS/GCP/Azure invokers are
// out of scope; this exists so the work-configuration envelope in §6 has
// somewhere real to be validated and projected.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::atoms::{Context, Work, WorkType};
use crate::cancellation::CancellationToken;
use crate::cores::{ExecutorMetadata, ExecutorSchema, WorkExecutor, WorkResult};
use crate::error::{Result, WorkflowError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Aws,
    Gcp,
    Azure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    AwsIam { access_key: String, secret_key: String },
    AwsRole { role_arn: String },
    ServiceAccount {
        #[serde(default)]
        key_file: Option<String>,
        #[serde(default)]
        client_id: Option<String>,
    },
    ManagedIdentity,
    ServicePrincipal {
        client_id: String,
        client_secret: String,
        tenant_id: String,
    },
}

impl Credentials {
    fn validate(&self) -> Result<()> {
        match self {
            Credentials::ServiceAccount { key_file, client_id } if key_file.is_none() && client_id.is_none() => {
                Err(WorkflowError::Validation(
                    "service_account credentials require key_file or client_id".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudFunctionConfig {
    pub provider: Provider,
    pub function: String,
    #[serde(default)]
    pub region: Option<String>,
    pub credentials: Credentials,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default)]
    pub runtime: Option<String>,
    pub memory: u32,
    #[serde(rename = "async", default)]
    pub async_invoke: bool,
    #[serde(default)]
    pub qualifier: Option<String>,
}

impl CloudFunctionConfig {
    fn memory_bounds(&self) -> (u32, u32) {
        match self.provider {
            Provider::Aws => (128, 10240),
            Provider::Gcp => (128, 8192),
            Provider::Azure => (128, 1536),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.function.trim().is_empty() {
            return Err(WorkflowError::Validation("executor_config.function must not be empty".to_string()));
        }
        if matches!(self.provider, Provider::Aws | Provider::Gcp) && self.region.as_deref().unwrap_or("").is_empty() {
            return Err(WorkflowError::Validation(format!(
                "executor_config.region is required for provider {:?}",
                self.provider
            )));
        }
        let (min, max) = self.memory_bounds();
        if self.memory < min || self.memory > max {
            return Err(WorkflowError::Validation(format!(
                "executor_config.memory {} out of bounds [{min}, {max}] for provider {:?}",
                self.memory, self.provider
            )));
        }
        self.credentials.validate()
    }

    /// Project the provider-agnostic envelope into the shape each
    /// provider's invoker actually expects.
    pub fn project(&self) -> Value {
        match self.provider {
            Provider::Aws => serde_json::json!({
                "function_name": self.function,
                "region": self.region,
                "qualifier": self.qualifier,
                "invocation_type": if self.async_invoke { "Event" } else { "RequestResponse" },
            }),
            Provider::Gcp => serde_json::json!({
                "name": self.function,
                "location": self.region,
                "project_id": self.qualifier,
            }),
            Provider::Azure => serde_json::json!({
                "function_name": self.function,
                "location": self.region,
            }),
        }
    }
}

/// Parses `work.Configuration.Parameters["executor_config"]`, validates it,
/// and projects it — as a `WorkExecutor` so it can be registered and
/// dispatched through `WorkExecutionCore` like any other plug-in.
pub struct CloudFunctionExecutor;

impl CloudFunctionExecutor {
    fn parse(work: &Work) -> Result<CloudFunctionConfig> {
        let raw = work
            .configuration
            .parameters
            .get("executor_config")
            .ok_or_else(|| WorkflowError::Validation("work is missing executor_config parameter".to_string()))?;
        let config: CloudFunctionConfig = serde_json::from_value(raw.clone())?;
        config.validate()?;
        Ok(config)
    }
}

#[async_trait]
impl WorkExecutor for CloudFunctionExecutor {
    async fn execute(&self, _token: &CancellationToken, work: &Work, _context: &Context) -> Result<WorkResult> {
        let config = Self::parse(work)?;
        Ok(WorkResult::success(serde_json::json!({
            "provider": config.provider,
            "provider_config": config.project(),
        })))
    }

    fn supported_types(&self) -> Vec<WorkType> {
        vec![WorkType::new("cloud_function")]
    }

    fn validate(&self, work: &Work) -> Result<()> {
        Self::parse(work).map(|_| ())
    }

    fn schema(&self) -> ExecutorSchema {
        ExecutorSchema {
            json_schema: include_str!("cloud_function_schema.json").to_string(),
            examples: Vec::new(),
            documentation: "Validates and projects a provider-neutral cloud-function invocation envelope.".to_string(),
        }
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            name: "cloud_function".to_string(),
            version: "1.0.0".to_string(),
            author: "workflow_runtime".to_string(),
            description: "Reference cloud-function executor (parsing/projection only, no network I/O)".to_string(),
            work_types: vec!["cloud_function".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::ContextScope;

    fn work_with(config: Value) -> Work {
        let mut w = Work::new("w0", "cloud_function", "invoke");
        w.configuration.parameters.insert("executor_config".to_string(), config);
        w
    }

    #[tokio::test]
    async fn aws_requires_region() {
        let work = work_with(serde_json::json!({
            "provider": "aws",
            "function": "my-fn",
            "credentials": { "type": "aws_iam", "access_key": "a", "secret_key": "b" },
            "memory": 256,
        }));
        let executor = CloudFunctionExecutor;
        assert!(executor.validate(&work).is_err());
    }

    #[tokio::test]
    async fn aws_projection_sets_invocation_type_from_async_flag() {
        let work = work_with(serde_json::json!({
            "provider": "aws",
            "function": "my-fn",
            "region": "us-east-1",
            "credentials": { "type": "aws_role", "role_arn": "arn:aws:iam::123:role/x" },
            "memory": 512,
            "async": true,
        }));
        let executor = CloudFunctionExecutor;
        let context = Context::new("ctx0", ContextScope::Workflow, "wf");
        let token = CancellationToken::new();
        let result = executor.execute(&token, &work, &context).await.unwrap();
        let projected = &result.outputs["result"]["provider_config"];
        assert_eq!(projected["invocation_type"], "Event");
    }

    #[tokio::test]
    async fn memory_out_of_bounds_for_provider_is_rejected() {
        let work = work_with(serde_json::json!({
            "provider": "azure",
            "function": "my-fn",
            "credentials": { "type": "managed_identity" },
            "memory": 4096,
        }));
        let executor = CloudFunctionExecutor;
        assert!(executor.validate(&work).is_err());
    }

    #[tokio::test]
    async fn service_account_requires_key_file_or_client_id() {
        let work = work_with(serde_json::json!({
            "provider": "gcp",
            "function": "my-fn",
            "region": "us-central1",
            "credentials": { "type": "service_account" },
            "memory": 256,
        }));
        let executor = CloudFunctionExecutor;
        assert!(executor.validate(&work).is_err());
    }
}
