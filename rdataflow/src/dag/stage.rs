use crate::api::attribute::{EdgeAttributes, VertexAttributes};
use crate::api::runtime::{EdgeId, PartitionId, StageId, TaskGroupId};
use crate::io;

/// A task-level transform. The runtime treats it as opaque.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub transform: String,
}

impl Task {
    pub fn new(id: &str, transform: &str) -> Self {
        Task {
            id: id.to_string(),
            transform: transform.to_string(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct TaskGroup {
    pub(crate) id: TaskGroupId,
    pub(crate) tasks: Vec<Task>,
}

impl TaskGroup {
    pub fn new(id: TaskGroupId, tasks: Vec<Task>) -> Self {
        TaskGroup { id, tasks }
    }

    pub fn id(&self) -> TaskGroupId {
        self.id
    }

    pub fn stage_id(&self) -> StageId {
        self.id.stage_id
    }

    pub fn index(&self) -> u32 {
        self.id.index
    }

    pub fn tasks(&self) -> &Vec<Task> {
        &self.tasks
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct PhysicalStage {
    pub(crate) id: StageId,
    pub(crate) task_groups: Vec<TaskGroup>,
}

impl PhysicalStage {
    /// A stage of `parallelism` task groups, each running the same chain of transforms.
    pub fn new(id: StageId, parallelism: u32, transforms: &[&str]) -> Self {
        let task_groups = (0..parallelism)
            .map(|index| {
                let task_group_id = TaskGroupId::new(id, index);
                let tasks = transforms
                    .iter()
                    .enumerate()
                    .map(|(n, transform)| {
                        Task::new(format!("{}-Task-{}", task_group_id, n).as_str(), transform)
                    })
                    .collect();
                TaskGroup::new(task_group_id, tasks)
            })
            .collect();

        PhysicalStage { id, task_groups }
    }

    pub fn with_task_groups(id: StageId, task_groups: Vec<TaskGroup>) -> Self {
        PhysicalStage { id, task_groups }
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn parallelism(&self) -> u32 {
        self.task_groups.len() as u32
    }

    pub fn task_groups(&self) -> &Vec<TaskGroup> {
        &self.task_groups
    }

    pub fn task_group_ids(&self) -> Vec<TaskGroupId> {
        self.task_groups.iter().map(|t| t.id).collect()
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct PhysicalStageEdge {
    pub(crate) id: EdgeId,
    pub(crate) src_stage: StageId,
    pub(crate) dst_stage: StageId,
    pub(crate) attributes: EdgeAttributes,
    pub(crate) src_parallelism: u32,
    pub(crate) dst_parallelism: u32,
}

impl PhysicalStageEdge {
    pub fn id(&self) -> &EdgeId {
        &self.id
    }

    pub fn src_stage(&self) -> StageId {
        self.src_stage
    }

    pub fn dst_stage(&self) -> StageId {
        self.dst_stage
    }

    pub fn attributes(&self) -> &EdgeAttributes {
        &self.attributes
    }

    pub fn src_vertex_attributes(&self) -> VertexAttributes {
        VertexAttributes::new(self.src_parallelism)
    }

    pub fn dst_vertex_attributes(&self) -> VertexAttributes {
        VertexAttributes::new(self.dst_parallelism)
    }

    /// Every partition id the producers of this edge will commit.
    pub fn partition_ids(&self) -> Vec<PartitionId> {
        (0..self.src_parallelism)
            .flat_map(|src_task_index| {
                io::output_partition_ids(
                    &self.id,
                    &self.attributes,
                    src_task_index,
                    self.dst_parallelism,
                )
            })
            .collect()
    }
}

/// A task group together with the edges of its stage, which is what an
/// executor needs to build its readers and writers.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ScheduledTaskGroup {
    pub(crate) task_group: TaskGroup,
    pub(crate) incoming_edges: Vec<PhysicalStageEdge>,
    pub(crate) outgoing_edges: Vec<PhysicalStageEdge>,
}

impl ScheduledTaskGroup {
    pub fn task_group(&self) -> &TaskGroup {
        &self.task_group
    }

    pub fn incoming_edges(&self) -> &Vec<PhysicalStageEdge> {
        &self.incoming_edges
    }

    pub fn outgoing_edges(&self) -> &Vec<PhysicalStageEdge> {
        &self.outgoing_edges
    }
}
