//! Physical plan handed over by the compiler:
//! a DAG of stages, each stage a list of parallel task groups.

use std::error::Error;

use crate::api::runtime::{EdgeId, StageId, TaskGroupId};

pub mod physical_plan;
pub mod stage;

pub use physical_plan::{PhysicalPlan, PhysicalPlanBuilder};
pub use stage::{PhysicalStage, PhysicalStageEdge, ScheduledTaskGroup, Task, TaskGroup};

#[derive(Debug)]
pub enum DagError {
    DuplicateStage(StageId),
    StageNotFound(StageId),
    TaskGroupNotFound(TaskGroupId),
    /// a stage without task groups can never complete
    EmptyStage(StageId),
    /// task group indices must be `0..parallelism` in order
    IllegalTaskGroupIndex(TaskGroupId),
    WouldCycle(String),
    DuplicateEdge(EdgeId),
    /// a one-to-one edge pairs producer `i` with consumer `i`
    ParallelismMismatch {
        edge_id: EdgeId,
        src_parallelism: u32,
        dst_parallelism: u32,
    },
}

impl Error for DagError {}

impl std::fmt::Display for DagError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DagError::DuplicateStage(id) => write!(f, "DuplicateStage({})", id),
            DagError::StageNotFound(id) => write!(f, "StageNotFound({})", id),
            DagError::TaskGroupNotFound(id) => write!(f, "TaskGroupNotFound({})", id),
            DagError::EmptyStage(id) => write!(f, "EmptyStage({})", id),
            DagError::IllegalTaskGroupIndex(id) => write!(f, "IllegalTaskGroupIndex({})", id),
            DagError::WouldCycle(s) => write!(f, "WouldCycle({})", s),
            DagError::DuplicateEdge(id) => write!(f, "DuplicateEdge({})", id),
            DagError::ParallelismMismatch {
                edge_id,
                src_parallelism,
                dst_parallelism,
            } => write!(
                f,
                "ParallelismMismatch({}, {} -> {})",
                edge_id, src_parallelism, dst_parallelism
            ),
        }
    }
}
