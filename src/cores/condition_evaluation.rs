// Type-keyed registry of ConditionEvaluators, mirroring WorkExecutionCore

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::atoms::{Condition, ConditionId, ConditionOperator, ConditionStatus, ConditionType, Context};
use crate::error::{Result, WorkflowError};

/// `Evaluate(condition, context) -> (any, error)` from §4.3/§6.
#[async_trait]
pub trait ConditionEvaluator: Send + Sync {
    async fn evaluate(&self, condition: &Condition, context: &Context) -> Result<Option<Value>>;

    fn can_evaluate(&self, condition_type: &ConditionType) -> bool {
        self.supported_types().contains(condition_type)
    }

    fn supported_types(&self) -> Vec<ConditionType>;
}

/// The lazily-registered default evaluator the `TransitionEvaluator`
/// resolves bare condition refs against: reads the context at the
/// condition's own id. Per §4.5, an absent key defaults to true, a bool
/// passes through as itself, and any other non-nil value is true — so
/// this evaluator never produces `None`, leaving only the bool-passthrough
/// and "other non-nil value" cases to
/// [`ConditionEvaluationCore::evaluate_condition`]'s status-derivation rule.
pub struct DefaultContextEvaluator;

#[async_trait]
impl ConditionEvaluator for DefaultContextEvaluator {
    async fn evaluate(&self, condition: &Condition, context: &Context) -> Result<Option<Value>> {
        Ok(Some(context.get(condition.id.as_str()).cloned().unwrap_or(Value::Bool(true))))
    }

    fn supported_types(&self) -> Vec<ConditionType> {
        vec![ConditionType::Expression]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionEvaluationResult {
    pub condition_id: ConditionId,
    pub status: ConditionStatus,
    pub value: Option<Value>,
    pub error: Option<String>,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    evaluators: HashMap<ConditionType, Arc<dyn ConditionEvaluator>>,
    active_evaluations: HashMap<ConditionId, Condition>,
    evaluation_results: HashMap<ConditionId, ConditionEvaluationResult>,
}

pub struct ConditionEvaluationCore {
    inner: RwLock<Inner>,
}

impl Default for ConditionEvaluationCore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionEvaluationCore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    pub async fn register_evaluator(
        &self,
        condition_type: ConditionType,
        evaluator: Arc<dyn ConditionEvaluator>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.evaluators.contains_key(&condition_type) {
            return Err(WorkflowError::Registry(format!(
                "evaluator for condition type '{condition_type:?}' already registered"
            )));
        }
        debug!(condition_type = ?condition_type, "registering condition evaluator");
        inner.evaluators.insert(condition_type, evaluator);
        Ok(())
    }

    pub async fn unregister_evaluator(&self, condition_type: &ConditionType) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.evaluators.remove(condition_type).is_none() {
            return Err(WorkflowError::Registry(format!(
                "no evaluator registered for condition type '{condition_type:?}'"
            )));
        }
        Ok(())
    }

    /// Status is derived, never taken from the evaluator directly: an
    /// evaluator error maps to `error`; a `null`/absent value to `false`;
    /// an explicit bool passes through; any other non-null value to `true`.
    /// Unlike `execute_work`, an evaluator error does **not** propagate as
    /// a call error — it's folded into the returned result's status.
    pub async fn evaluate_condition(&self, condition: Condition, context: &Context) -> Result<ConditionEvaluationResult> {
        condition.validate()?;

        let evaluator = {
            let mut inner = self.inner.write().await;
            if inner.active_evaluations.contains_key(&condition.id) {
                return Err(WorkflowError::Registry(format!(
                    "condition '{}' is already being evaluated",
                    condition.id
                )));
            }
            let evaluator = inner
                .evaluators
                .get(&condition.condition_type)
                .cloned()
                .ok_or_else(|| {
                    WorkflowError::Registry(format!(
                        "no evaluator for condition type '{:?}'",
                        condition.condition_type
                    ))
                })?;
            inner
                .active_evaluations
                .insert(condition.id.clone(), condition.with_status(ConditionStatus::Evaluating));
            evaluator
        };

        let outcome = evaluator.evaluate(&condition, context).await;

        let mut inner = self.inner.write().await;
        inner.active_evaluations.remove(&condition.id);

        let result = match outcome {
            Err(err) => ConditionEvaluationResult {
                condition_id: condition.id.clone(),
                status: ConditionStatus::Error,
                value: None,
                error: Some(err.to_string()),
                evaluated_at: Utc::now(),
            },
            Ok(None) => ConditionEvaluationResult {
                condition_id: condition.id.clone(),
                status: ConditionStatus::False,
                value: None,
                error: None,
                evaluated_at: Utc::now(),
            },
            Ok(Some(Value::Bool(b))) => ConditionEvaluationResult {
                condition_id: condition.id.clone(),
                status: if b { ConditionStatus::True } else { ConditionStatus::False },
                value: Some(Value::Bool(b)),
                error: None,
                evaluated_at: Utc::now(),
            },
            Ok(Some(other)) => ConditionEvaluationResult {
                condition_id: condition.id.clone(),
                status: ConditionStatus::True,
                value: Some(other),
                error: None,
                evaluated_at: Utc::now(),
            },
        };
        inner.evaluation_results.insert(condition.id.clone(), result.clone());
        Ok(result)
    }

    /// Empty list => true. `and`: all true. `or`: any true. `not`: exactly
    /// one operand required. An evaluator error on any member condition
    /// (status=error) is promoted to an outer call error here, unlike
    /// `evaluate_condition` itself.
    pub async fn evaluate_conditions(
        &self,
        conditions: Vec<Condition>,
        context: &Context,
        op: ConditionOperator,
    ) -> Result<bool> {
        if conditions.is_empty() {
            return Ok(true);
        }
        if matches!(op, ConditionOperator::Not) && conditions.len() != 1 {
            return Err(WorkflowError::Validation(format!(
                "'not' requires exactly one operand, got {}",
                conditions.len()
            )));
        }

        let mut results = Vec::with_capacity(conditions.len());
        for condition in conditions {
            let result = self.evaluate_condition(condition, context).await?;
            if matches!(result.status, ConditionStatus::Error) {
                return Err(WorkflowError::EvaluatorFailed(
                    result.error.unwrap_or_else(|| "condition evaluation failed".to_string()),
                ));
            }
            results.push(matches!(result.status, ConditionStatus::True));
        }

        Ok(match op {
            ConditionOperator::And => results.iter().all(|v| *v),
            ConditionOperator::Or => results.iter().any(|v| *v),
            ConditionOperator::Not => !results[0],
        })
    }

    pub async fn is_evaluating(&self, id: &ConditionId) -> bool {
        self.inner.read().await.active_evaluations.contains_key(id)
    }

    pub async fn get_evaluation_result(&self, id: &ConditionId) -> Option<ConditionEvaluationResult> {
        self.inner.read().await.evaluation_results.get(id).cloned()
    }

    pub async fn get_all_evaluation_results(&self) -> Vec<ConditionEvaluationResult> {
        self.inner.read().await.evaluation_results.values().cloned().collect()
    }
}
