use crate::runtime::state::{State, TransitionTable};

#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, Hash)]
pub enum StageState {
    Ready,
    Executing,
    Complete,
    Failed,
}

lazy_static! {
    // Complete -> Executing re-opens a stage whose output was lost.
    static ref STAGE_TRANSITIONS: TransitionTable<StageState> = transitions! {
        StageState::Ready => [StageState::Executing, StageState::Failed],
        StageState::Executing => [StageState::Complete, StageState::Failed],
        StageState::Complete => [StageState::Executing],
    };
}

impl State for StageState {
    fn transitions() -> &'static TransitionTable<Self> {
        &STAGE_TRANSITIONS
    }
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageState::Ready => write!(f, "READY"),
            StageState::Executing => write!(f, "EXECUTING"),
            StageState::Complete => write!(f, "COMPLETE"),
            StageState::Failed => write!(f, "FAILED"),
        }
    }
}
