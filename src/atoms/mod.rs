//! Tier A: immutable, value-semantic atoms (`State`, `Transition`, `Work`,
//! `Condition`, `Context`) with validation and copy-returning mutators.
//! Nothing in this module depends on the cores or runtime built on top of it.

pub mod condition;
pub mod context;
pub mod metadata;
pub mod state;
pub mod transition;
pub mod work;

pub use condition::{Condition, ConditionId, ConditionOperator, ConditionStatus, ConditionType, Expression};
pub use context::{Context, ContextId, ContextScope};
pub use metadata::AtomMetadata;
pub use state::{State, StateId, StateStatus, StateType};
pub use transition::{Transition, TransitionId, TransitionStatus, TransitionType};
pub use work::{Work, WorkConfiguration, WorkId, WorkPriority, WorkStatus, WorkType};
