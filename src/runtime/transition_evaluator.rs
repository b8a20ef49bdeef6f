// Decides whether a guarded Transition may fire

use std::sync::Arc;

use async_trait::async_trait;

use crate::atoms::{Condition, ConditionId, ConditionOperator, ConditionType, Context, Transition};
use crate::cores::{ConditionEvaluationCore, DefaultContextEvaluator};
use crate::error::{Result, WorkflowError};

/// `CanTransition`/`EvaluateConditions` contract from §4.5.
#[async_trait]
pub trait TransitionEvaluator: Send + Sync {
    async fn can_transition(&self, transition: &Transition, context: &Context) -> Result<bool>;
    async fn evaluate_conditions(&self, condition_ids: &[ConditionId], context: &Context) -> Result<bool>;
}

/// The default policy: AND-joins referenced conditions, accepts both
/// `ready` and `pending` transitions as eligible (an intentionally
/// preserved ambiguity — see the design notes), and resolves each bare
/// condition ref by synthesizing an expression-typed condition whose id
/// equals the ref and whose text is `"true"`, evaluated by a lazily
/// registered [`DefaultContextEvaluator`].
pub struct DefaultTransitionEvaluator {
    condition_core: Arc<ConditionEvaluationCore>,
}

impl DefaultTransitionEvaluator {
    pub fn new(condition_core: Arc<ConditionEvaluationCore>) -> Self {
        Self { condition_core }
    }

    async fn ensure_default_evaluator_registered(&self) {
        match self
            .condition_core
            .register_evaluator(ConditionType::Expression, Arc::new(DefaultContextEvaluator))
            .await
        {
            Ok(()) | Err(WorkflowError::Registry(_)) => {}
            Err(other) => panic!("unexpected error registering default condition evaluator: {other}"),
        }
    }
}

#[async_trait]
impl TransitionEvaluator for DefaultTransitionEvaluator {
    async fn can_transition(&self, transition: &Transition, context: &Context) -> Result<bool> {
        if !transition.is_evaluable() {
            return Ok(false);
        }
        if transition.conditions.is_empty() {
            return Ok(true);
        }
        self.evaluate_conditions(&transition.conditions, context).await
    }

    async fn evaluate_conditions(&self, condition_ids: &[ConditionId], context: &Context) -> Result<bool> {
        self.ensure_default_evaluator_registered().await;
        let conditions: Vec<Condition> = condition_ids
            .iter()
            .map(|id| Condition::synthesize_default(id.clone()))
            .collect();
        self.condition_core
            .evaluate_conditions(conditions, context, ConditionOperator::And)
            .await
    }
}
