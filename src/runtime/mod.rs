//! Tier C, part 2: the runtime engine and its collaborators — persistence,
//! error handling, lifecycle events, and transition evaluation.

pub mod engine;
pub mod error_handler;
pub mod instance;
pub mod lifecycle;
pub mod persistence;
pub mod transition_evaluator;

pub use engine::{RuntimeEngine, MAX_EXECUTION_STEPS};
pub use error_handler::{ErrorHandler, ErrorRecord, ErrorSeverity};
pub use instance::{new_instance_id, InstanceStatus, WorkflowInstance};
pub use lifecycle::{LifecycleEvent, LifecycleEventType, LifecycleManager};
pub use persistence::{InMemoryPersistenceStore, StatePersistenceStore};
pub use transition_evaluator::{DefaultTransitionEvaluator, TransitionEvaluator};
