use crate::runtime::state::{State, TransitionTable};

#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, Hash)]
pub enum JobState {
    Ready,
    Executing,
    Complete,
    Failed,
}

lazy_static! {
    static ref JOB_TRANSITIONS: TransitionTable<JobState> = transitions! {
        JobState::Ready => [JobState::Executing, JobState::Failed],
        JobState::Executing => [JobState::Complete, JobState::Failed],
    };
}

impl State for JobState {
    fn transitions() -> &'static TransitionTable<Self> {
        &JOB_TRANSITIONS
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Ready => write!(f, "READY"),
            JobState::Executing => write!(f, "EXECUTING"),
            JobState::Complete => write!(f, "COMPLETE"),
            JobState::Failed => write!(f, "FAILED"),
        }
    }
}
