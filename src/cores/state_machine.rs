// Concurrent in-memory directed graph of States and Transitions

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::atoms::{State, StateId, StateType, Transition, TransitionId};
use crate::error::{Result, WorkflowError};

#[derive(Default)]
struct Inner {
    states: HashMap<StateId, State>,
    transitions: HashMap<TransitionId, Transition>,
    current_state: Option<StateId>,
}

/// A concurrent directed graph of [`State`]s and [`Transition`]s, guarded by
/// a single readers-writer lock. Every read-only query takes a read guard;
/// every mutation takes a write guard for the duration of the in-memory
/// update only — there is no suspension point here, unlike the work/
/// condition cores, so the lock is never released mid-call.
pub struct StateMachineCore {
    inner: RwLock<Inner>,
}

impl Default for StateMachineCore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachineCore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("state machine core lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("state machine core lock poisoned")
    }

    pub fn add_state(&self, state: State) -> Result<()> {
        state.validate()?;
        let mut inner = self.write();
        if inner.states.contains_key(&state.id) {
            return Err(WorkflowError::Registry(format!(
                "state '{}' already exists",
                state.id
            )));
        }
        debug!(state_id = %state.id, "registering state");
        inner.states.insert(state.id.clone(), state);
        Ok(())
    }

    pub fn remove_state(&self, id: &StateId) -> Result<()> {
        let mut inner = self.write();
        if !inner.states.contains_key(id) {
            return Err(WorkflowError::NotFound(format!("state '{id}' not found")));
        }
        if inner.current_state.as_ref() == Some(id) {
            return Err(WorkflowError::StateMachine(format!(
                "cannot remove current state '{id}'"
            )));
        }
        let referenced = inner
            .transitions
            .values()
            .any(|t| &t.from == id || &t.to == id);
        if referenced {
            return Err(WorkflowError::StateMachine(format!(
                "cannot remove state '{id}': referenced by a transition"
            )));
        }
        inner.states.remove(id);
        Ok(())
    }

    pub fn get_state(&self, id: &StateId) -> Option<State> {
        self.read().states.get(id).cloned()
    }

    pub fn get_all_states(&self) -> Vec<State> {
        self.read().states.values().cloned().collect()
    }

    pub fn add_transition(&self, transition: Transition) -> Result<()> {
        transition.validate()?;
        let mut inner = self.write();
        if inner.transitions.contains_key(&transition.id) {
            return Err(WorkflowError::Registry(format!(
                "transition '{}' already exists",
                transition.id
            )));
        }
        if !inner.states.contains_key(&transition.from) {
            return Err(WorkflowError::StateMachine(format!(
                "transition '{}' references unknown from-state '{}'",
                transition.id, transition.from
            )));
        }
        if !inner.states.contains_key(&transition.to) {
            return Err(WorkflowError::StateMachine(format!(
                "transition '{}' references unknown to-state '{}'",
                transition.id, transition.to
            )));
        }
        debug!(transition_id = %transition.id, from = %transition.from, to = %transition.to, "registering transition");
        inner.transitions.insert(transition.id.clone(), transition);
        Ok(())
    }

    pub fn remove_transition(&self, id: &TransitionId) -> Result<()> {
        let mut inner = self.write();
        if inner.transitions.remove(id).is_none() {
            return Err(WorkflowError::NotFound(format!("transition '{id}' not found")));
        }
        Ok(())
    }

    pub fn get_transition(&self, id: &TransitionId) -> Option<Transition> {
        self.read().transitions.get(id).cloned()
    }

    /// Linear scan; order unspecified (see the transition-selection open
    /// question).
    pub fn get_transitions_from_state(&self, id: &StateId) -> Vec<Transition> {
        self.read()
            .transitions
            .values()
            .filter(|t| &t.from == id)
            .cloned()
            .collect()
    }

    pub fn get_transitions_to_state(&self, id: &StateId) -> Vec<Transition> {
        self.read()
            .transitions
            .values()
            .filter(|t| &t.to == id)
            .cloned()
            .collect()
    }

    pub fn set_current_state(&self, id: StateId) -> Result<()> {
        let mut inner = self.write();
        if !inner.states.contains_key(&id) {
            return Err(WorkflowError::NotFound(format!("state '{id}' not found")));
        }
        inner.current_state = Some(id);
        Ok(())
    }

    pub fn get_current_state(&self) -> Option<StateId> {
        self.read().current_state.clone()
    }

    /// Existence only — does not consult guards.
    pub fn can_transition(&self, from: &StateId, to: &StateId) -> bool {
        self.read()
            .transitions
            .values()
            .any(|t| &t.from == from && &t.to == to)
    }

    /// All transitions leaving `currentState`, or empty if unset.
    pub fn get_available_transitions(&self) -> Vec<Transition> {
        let inner = self.read();
        match &inner.current_state {
            Some(id) => inner.transitions.values().filter(|t| &t.from == id).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Wholesale-replace the graph: used by the `RuntimeEngine` to adopt a
    /// `WorkflowDefinition`'s state machine into the engine's own shared
    /// core at `StartWorkflow` time.
    pub fn clear(&self) {
        let mut inner = self.write();
        inner.states.clear();
        inner.transitions.clear();
        inner.current_state = None;
    }

    pub fn validate_state_machine(&self) -> Result<()> {
        let inner = self.read();
        if inner.states.is_empty() {
            return Err(WorkflowError::Validation(
                "state machine has no states".to_string(),
            ));
        }
        if !inner.states.values().any(|s| matches!(s.state_type, StateType::Initial)) {
            return Err(WorkflowError::Validation(
                "state machine has no initial state".to_string(),
            ));
        }
        for state in inner.states.values() {
            state.validate()?;
        }
        for transition in inner.transitions.values() {
            transition.validate()?;
            if !inner.states.contains_key(&transition.from) {
                return Err(WorkflowError::Validation(format!(
                    "transition '{}' references unknown from-state '{}'",
                    transition.id, transition.from
                )));
            }
            if !inner.states.contains_key(&transition.to) {
                return Err(WorkflowError::Validation(format!(
                    "transition '{}' references unknown to-state '{}'",
                    transition.id, transition.to
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::TransitionType;

    fn state(id: &str, t: StateType) -> State {
        State::new(id, t, id)
    }

    #[test]
    fn add_state_rejects_duplicate_id() {
        let core = StateMachineCore::new();
        core.add_state(state("s0", StateType::Initial)).unwrap();
        let err = core.add_state(state("s0", StateType::Intermediate)).unwrap_err();
        assert!(matches!(err, WorkflowError::Registry(_)));
    }

    #[test]
    fn add_transition_requires_known_endpoints() {
        let core = StateMachineCore::new();
        core.add_state(state("s0", StateType::Initial)).unwrap();
        let t = Transition::new("t0", TransitionType::Automatic, "s0", "s1", "go");
        let err = core.add_transition(t).unwrap_err();
        assert!(matches!(err, WorkflowError::StateMachine(_)));
    }

    #[test]
    fn remove_state_blocked_by_referencing_transition_or_current() {
        let core = StateMachineCore::new();
        core.add_state(state("s0", StateType::Initial)).unwrap();
        core.add_state(state("s1", StateType::Final)).unwrap();
        core.add_transition(Transition::new("t0", TransitionType::Automatic, "s0", "s1", "go"))
            .unwrap();
        assert!(core.remove_state(&StateId::new("s0")).is_err());

        core.add_state(state("s2", StateType::Intermediate)).unwrap();
        core.set_current_state(StateId::new("s2")).unwrap();
        assert!(core.remove_state(&StateId::new("s2")).is_err());
    }

    #[test]
    fn validate_state_machine_requires_initial_state() {
        let core = StateMachineCore::new();
        core.add_state(state("s0", StateType::Intermediate)).unwrap();
        assert!(core.validate_state_machine().is_err());
        core.add_state(state("s1", StateType::Initial)).unwrap();
        assert!(core.validate_state_machine().is_ok());
    }

    #[test]
    fn can_transition_is_existence_only() {
        let core = StateMachineCore::new();
        core.add_state(state("s0", StateType::Initial)).unwrap();
        core.add_state(state("s1", StateType::Final)).unwrap();
        core.add_transition(Transition::new("t0", TransitionType::Automatic, "s0", "s1", "go"))
            .unwrap();
        assert!(core.can_transition(&StateId::new("s0"), &StateId::new("s1")));
        assert!(!core.can_transition(&StateId::new("s1"), &StateId::new("s0")));
    }

    #[test]
    fn available_transitions_follow_current_state() {
        let core = StateMachineCore::new();
        core.add_state(state("s0", StateType::Initial)).unwrap();
        core.add_state(state("s1", StateType::Final)).unwrap();
        core.add_transition(Transition::new("t0", TransitionType::Automatic, "s0", "s1", "go"))
            .unwrap();
        assert!(core.get_available_transitions().is_empty());
        core.set_current_state(StateId::new("s0")).unwrap();
        assert_eq!(core.get_available_transitions().len(), 1);
    }
}
