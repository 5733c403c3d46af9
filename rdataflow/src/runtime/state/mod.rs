//! Finite state machines of the execution entities of a job.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::api::error::{Error, Result};

pub mod job_state;
pub mod stage_state;
pub mod task_group_state;

pub use job_state::JobState;
pub use stage_state::StageState;
pub use task_group_state::TaskGroupState;

pub type TransitionTable<S> = HashMap<S, Vec<S>>;

pub trait State: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    fn transitions() -> &'static TransitionTable<Self>;

    fn can_transition_to(&self, to: Self) -> bool {
        Self::transitions()
            .get(self)
            .map(|targets| targets.contains(&to))
            .unwrap_or(false)
    }

    /// No outgoing transition at all.
    fn is_terminal(&self) -> bool {
        Self::transitions()
            .get(self)
            .map(|targets| targets.is_empty())
            .unwrap_or(true)
    }
}

/// The current state of one entity, mutated only through its transition table.
#[derive(Clone, Debug)]
pub struct StateMachine<S: State> {
    entity: String,
    current: S,
}

impl<S: State> StateMachine<S> {
    pub fn new(entity: String, initial: S) -> Self {
        StateMachine {
            entity,
            current: initial,
        }
    }

    pub fn entity(&self) -> &str {
        self.entity.as_str()
    }

    pub fn state(&self) -> S {
        self.current
    }

    /// Apply `to`, returning the previous state.
    pub fn set_state(&mut self, to: S) -> Result<S> {
        if !self.current.can_transition_to(to) {
            metrics::counter!("state.transition.rejected", 1);
            warn!(
                "reject transition of {}: {:?} -> {:?}",
                self.entity, self.current, to
            );
            return Err(Error::illegal_transition(&self.entity, self.current, to));
        }

        let from = self.current;
        self.current = to;
        Ok(from)
    }
}

#[cfg(test)]
mod tests {
    use crate::api::error::Error;
    use crate::runtime::state::{JobState, State, StateMachine};

    #[test]
    pub fn state_machine_test() {
        let mut machine = StateMachine::new("Job-1".to_string(), JobState::Ready);
        assert_eq!(machine.set_state(JobState::Executing).unwrap(), JobState::Ready);
        assert_eq!(machine.state(), JobState::Executing);

        match machine.set_state(JobState::Ready) {
            Err(Error::IllegalStateTransition { entity, from, to }) => {
                assert_eq!(entity, "Job-1");
                assert_eq!(from, "Executing");
                assert_eq!(to, "Ready");
            }
            rt => panic!("unexpected {:?}", rt),
        }
        assert_eq!(machine.state(), JobState::Executing);

        machine.set_state(JobState::Complete).unwrap();
        assert!(machine.state().is_terminal());
        assert!(machine.set_state(JobState::Failed).is_err());
    }
}
