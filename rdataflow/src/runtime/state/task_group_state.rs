use crate::runtime::state::{State, TransitionTable};

#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, Hash)]
pub enum TaskGroupState {
    Ready,
    Executing,
    Complete,
    /// the task group may be rescheduled
    FailedRecoverable,
    FailedUnrecoverable,
    /// finished its tasks but waits on an external condition before completing
    OnHold,
}

lazy_static! {
    static ref TASK_GROUP_TRANSITIONS: TransitionTable<TaskGroupState> = transitions! {
        TaskGroupState::Ready => [
            TaskGroupState::Executing,
            TaskGroupState::FailedRecoverable,
            TaskGroupState::FailedUnrecoverable,
        ],
        TaskGroupState::Executing => [
            TaskGroupState::Complete,
            TaskGroupState::FailedRecoverable,
            TaskGroupState::FailedUnrecoverable,
            TaskGroupState::OnHold,
        ],
        TaskGroupState::OnHold => [
            TaskGroupState::Complete,
            TaskGroupState::FailedRecoverable,
            TaskGroupState::FailedUnrecoverable,
        ],
        TaskGroupState::Complete => [TaskGroupState::FailedRecoverable],
        TaskGroupState::FailedRecoverable => [
            TaskGroupState::Ready,
            TaskGroupState::FailedUnrecoverable,
        ],
    };
}

impl State for TaskGroupState {
    fn transitions() -> &'static TransitionTable<Self> {
        &TASK_GROUP_TRANSITIONS
    }
}

impl std::fmt::Display for TaskGroupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskGroupState::Ready => write!(f, "READY"),
            TaskGroupState::Executing => write!(f, "EXECUTING"),
            TaskGroupState::Complete => write!(f, "COMPLETE"),
            TaskGroupState::FailedRecoverable => write!(f, "FAILED_RECOVERABLE"),
            TaskGroupState::FailedUnrecoverable => write!(f, "FAILED_UNRECOVERABLE"),
            TaskGroupState::OnHold => write!(f, "ON_HOLD"),
        }
    }
}
