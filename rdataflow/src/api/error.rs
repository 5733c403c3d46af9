use thiserror::Error;

use crate::api::runtime::{PartitionId, WorkerId};

pub type Result<T> = core::result::Result<T, Error>;

/// Runtime error taxonomy.
///
/// Fetch failures are reported to the caller, which decides whether to retry or
/// to trigger recomputation upstream. Write, codec and transition failures are
/// fatal to the call that produced them.
#[derive(Debug, Error)]
pub enum Error {
    /// A reported transition is not in the entity's transition table.
    #[error("illegal state transition of {entity}: {from} -> {to}")]
    IllegalStateTransition {
        entity: String,
        from: String,
        to: String,
    },

    #[error("job {0} already terminated")]
    JobTerminated(String),

    #[error("unknown entity {0}")]
    UnknownEntity(String),

    /// The partition is not present at the queried worker.
    #[error("partition {0} not found")]
    PartitionNotFound(PartitionId),

    /// Declared but not committed yet.
    #[error("partition {0} is not committed yet")]
    PartitionPending(PartitionId),

    #[error("partition {0} has been removed")]
    PartitionRemoved(PartitionId),

    /// Write-once violation in a partition store.
    #[error("partition {0} already exists")]
    PartitionAlreadyExists(PartitionId),

    /// A racing or repeated commit.
    #[error("partition {0} already committed")]
    PartitionAlreadyCommitted(PartitionId),

    /// The partition id was never declared to the master.
    #[error("unknown partition {0}")]
    UnknownPartition(PartitionId),

    #[error("unknown worker {0}")]
    UnknownWorker(WorkerId),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("dag error: {0}")]
    Dag(#[from] crate::dag::DagError),
}

impl Error {
    pub fn illegal_transition<E, F, T>(entity: E, from: F, to: T) -> Self
    where
        E: std::fmt::Display,
        F: std::fmt::Debug,
        T: std::fmt::Debug,
    {
        Error::IllegalStateTransition {
            entity: entity.to_string(),
            from: format!("{:?}", from),
            to: format!("{:?}", to),
        }
    }

    /// Whether the failure is about locating or moving data, which a scheduler
    /// may answer with a retry or an upstream recomputation.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::PartitionNotFound(_)
            | Error::PartitionPending(_)
            | Error::PartitionRemoved(_)
            | Error::Transport(_) => true,
            _ => false,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Codec(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::api::error::Error;
    use crate::api::runtime::{EdgeId, PartitionId};

    #[test]
    pub fn retryable_test() {
        let id = PartitionId::new(EdgeId::from("e"), 0);
        assert!(Error::PartitionRemoved(id.clone()).is_retryable());
        assert!(Error::Transport("closed".to_string()).is_retryable());
        assert!(!Error::PartitionAlreadyExists(id).is_retryable());
        assert!(!Error::illegal_transition("Job-1", "Ready", "Complete").is_retryable());
    }

    #[test]
    pub fn illegal_transition_message_test() {
        #[derive(Debug)]
        enum S {
            Ready,
            Complete,
        }
        let e = Error::illegal_transition("TaskGroup-0-1", S::Ready, S::Complete);
        assert_eq!(
            e.to_string(),
            "illegal state transition of TaskGroup-0-1: Ready -> Complete"
        );
    }
}
