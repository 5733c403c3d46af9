use std::collections::HashMap;

use daggy::petgraph::algo::toposort;
use daggy::{Dag, EdgeIndex, NodeIndex, Walker};

use crate::api::attribute::{CommunicationPattern, EdgeAttributes};
use crate::api::error::Result;
use crate::api::runtime::{EdgeId, JobId, StageId, TaskGroupId};
use crate::dag::stage::{PhysicalStage, PhysicalStageEdge, ScheduledTaskGroup, TaskGroup};
use crate::dag::DagError;
use crate::runtime::master::BlockManagerMaster;

/// Immutable DAG of stages produced by the compiler for one job.
#[derive(Debug)]
pub struct PhysicalPlan {
    id: JobId,
    dag: Dag<PhysicalStage, PhysicalStageEdge>,
    stage_indices: HashMap<StageId, NodeIndex>,
    topological_order: Vec<NodeIndex>,
}

impl PhysicalPlan {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Stages in topological order.
    pub fn stages(&self) -> Vec<&PhysicalStage> {
        self.topological_order
            .iter()
            .map(|node_index| &self.dag[*node_index])
            .collect()
    }

    pub fn stage(&self, stage_id: StageId) -> Option<&PhysicalStage> {
        self.stage_indices
            .get(&stage_id)
            .map(|node_index| &self.dag[*node_index])
    }

    pub fn edges(&self) -> Vec<&PhysicalStageEdge> {
        self.dag.raw_edges().iter().map(|edge| &edge.weight).collect()
    }

    pub fn edge(&self, edge_id: &EdgeId) -> Option<&PhysicalStageEdge> {
        self.dag
            .raw_edges()
            .iter()
            .map(|edge| &edge.weight)
            .find(|edge| edge.id.eq(edge_id))
    }

    pub fn incoming_edges(&self, stage_id: StageId) -> Result<Vec<&PhysicalStageEdge>> {
        let node_index = self.node_index(stage_id)?;
        let parents: Vec<(EdgeIndex, NodeIndex)> =
            self.dag.parents(node_index).iter(&self.dag).collect();
        Ok(parents
            .into_iter()
            .map(|(edge_index, _node_index)| &self.dag[edge_index])
            .collect())
    }

    pub fn outgoing_edges(&self, stage_id: StageId) -> Result<Vec<&PhysicalStageEdge>> {
        let node_index = self.node_index(stage_id)?;
        let children: Vec<(EdgeIndex, NodeIndex)> =
            self.dag.children(node_index).iter(&self.dag).collect();
        Ok(children
            .into_iter()
            .map(|(edge_index, _node_index)| &self.dag[edge_index])
            .collect())
    }

    pub fn task_group(&self, task_group_id: TaskGroupId) -> Result<&TaskGroup> {
        let stage = self
            .stage(task_group_id.stage_id)
            .ok_or(DagError::StageNotFound(task_group_id.stage_id))?;
        stage
            .task_groups
            .get(task_group_id.index as usize)
            .ok_or_else(|| DagError::TaskGroupNotFound(task_group_id).into())
    }

    /// Everything an executor needs to run one task group.
    pub fn schedule(&self, task_group_id: TaskGroupId) -> Result<ScheduledTaskGroup> {
        let task_group = self.task_group(task_group_id)?.clone();
        let incoming_edges = self
            .incoming_edges(task_group_id.stage_id)?
            .into_iter()
            .map(|edge| edge.clone())
            .collect();
        let outgoing_edges = self
            .outgoing_edges(task_group_id.stage_id)?
            .into_iter()
            .map(|edge| edge.clone())
            .collect();

        Ok(ScheduledTaskGroup {
            task_group,
            incoming_edges,
            outgoing_edges,
        })
    }

    /// Pre-declare every partition of every edge, so that lookups issued before
    /// the producers run answer "pending" instead of "unknown".
    pub fn initialize_partitions(&self, master: &BlockManagerMaster) -> Result<usize> {
        let mut count = 0;
        for edge in self.edges() {
            for partition_id in edge.partition_ids() {
                master.initialize_state(
                    &partition_id.edge_id,
                    partition_id.producer_index,
                    partition_id.consumer_index,
                )?;
                count += 1;
            }
        }

        info!("job {} declared {} partitions", self.id, count);
        Ok(count)
    }

    fn node_index(&self, stage_id: StageId) -> Result<NodeIndex> {
        self.stage_indices
            .get(&stage_id)
            .map(|node_index| *node_index)
            .ok_or_else(|| DagError::StageNotFound(stage_id).into())
    }
}

pub struct PhysicalPlanBuilder {
    id: JobId,
    dag: Dag<PhysicalStage, PhysicalStageEdge>,
    stage_indices: HashMap<StageId, NodeIndex>,
}

impl PhysicalPlanBuilder {
    pub fn new(id: JobId) -> Self {
        PhysicalPlanBuilder {
            id,
            dag: Dag::new(),
            stage_indices: HashMap::new(),
        }
    }

    pub fn add_stage(&mut self, stage: PhysicalStage) -> Result<StageId> {
        let stage_id = stage.id;
        if self.stage_indices.contains_key(&stage_id) {
            return Err(DagError::DuplicateStage(stage_id).into());
        }
        if stage.task_groups.is_empty() {
            return Err(DagError::EmptyStage(stage_id).into());
        }
        for (index, task_group) in stage.task_groups.iter().enumerate() {
            if task_group.id.stage_id != stage_id || task_group.id.index as usize != index {
                return Err(DagError::IllegalTaskGroupIndex(task_group.id).into());
            }
        }

        let node_index = self.dag.add_node(stage);
        self.stage_indices.insert(stage_id, node_index);
        Ok(stage_id)
    }

    /// Connect two stages with an edge named `Edge-<n>`.
    pub fn connect(
        &mut self,
        src_stage: StageId,
        dst_stage: StageId,
        attributes: EdgeAttributes,
    ) -> Result<EdgeId> {
        let edge_id = EdgeId(format!("Edge-{}", self.dag.edge_count()));
        self.connect_with_id(edge_id, src_stage, dst_stage, attributes)
    }

    pub fn connect_with_id(
        &mut self,
        edge_id: EdgeId,
        src_stage: StageId,
        dst_stage: StageId,
        attributes: EdgeAttributes,
    ) -> Result<EdgeId> {
        let src_index = *self
            .stage_indices
            .get(&src_stage)
            .ok_or(DagError::StageNotFound(src_stage))?;
        let dst_index = *self
            .stage_indices
            .get(&dst_stage)
            .ok_or(DagError::StageNotFound(dst_stage))?;

        if self
            .dag
            .raw_edges()
            .iter()
            .any(|edge| edge.weight.id.eq(&edge_id))
        {
            return Err(DagError::DuplicateEdge(edge_id).into());
        }

        let src_parallelism = self.dag[src_index].parallelism();
        let dst_parallelism = self.dag[dst_index].parallelism();
        if attributes.comm_pattern == CommunicationPattern::OneToOne
            && src_parallelism != dst_parallelism
        {
            return Err(DagError::ParallelismMismatch {
                edge_id,
                src_parallelism,
                dst_parallelism,
            }
            .into());
        }

        let edge = PhysicalStageEdge {
            id: edge_id.clone(),
            src_stage,
            dst_stage,
            attributes,
            src_parallelism,
            dst_parallelism,
        };

        self.dag
            .add_edge(src_index, dst_index, edge)
            .map_err(|_| DagError::WouldCycle(edge_id.to_string()))?;
        Ok(edge_id)
    }

    pub fn build(self) -> Result<PhysicalPlan> {
        let topological_order = toposort(self.dag.graph(), None)
            .map_err(|cycle| DagError::WouldCycle(format!("{:?}", cycle.node_id())))?;

        Ok(PhysicalPlan {
            id: self.id,
            dag: self.dag,
            stage_indices: self.stage_indices,
            topological_order,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::api::attribute::{CommunicationPattern, EdgeAttributes, ShuffleLayout};
    use crate::api::error::Error;
    use crate::api::runtime::{EdgeId, JobId, StageId, TaskGroupId};
    use crate::dag::stage::PhysicalStage;
    use crate::dag::{DagError, PhysicalPlanBuilder};

    #[test]
    pub fn build_plan_test() {
        let mut builder = PhysicalPlanBuilder::new(JobId::from("plan"));
        let s2 = builder
            .add_stage(PhysicalStage::new(StageId(2), 3, &["reduce"]))
            .unwrap();
        let s1 = builder
            .add_stage(PhysicalStage::new(StageId(1), 2, &["read", "map"]))
            .unwrap();
        let edge_id = builder
            .connect(
                s1,
                s2,
                EdgeAttributes::new(CommunicationPattern::ScatterGather),
            )
            .unwrap();
        let plan = builder.build().unwrap();

        let order: Vec<StageId> = plan.stages().iter().map(|s| s.id()).collect();
        assert_eq!(order, vec![StageId(1), StageId(2)]);

        let edge = plan.edge(&edge_id).unwrap();
        assert_eq!(edge.src_vertex_attributes().parallelism, 2);
        assert_eq!(edge.dst_vertex_attributes().parallelism, 3);
        assert_eq!(edge.partition_ids().len(), 6);

        let scheduled = plan.schedule(TaskGroupId::new(StageId(2), 1)).unwrap();
        assert_eq!(scheduled.incoming_edges().len(), 1);
        assert!(scheduled.outgoing_edges().is_empty());
        assert_eq!(scheduled.task_group().tasks().len(), 1);

        let scheduled = plan.schedule(TaskGroupId::new(StageId(1), 0)).unwrap();
        assert_eq!(scheduled.outgoing_edges()[0].id(), &edge_id);
        assert_eq!(scheduled.task_group().tasks()[1].transform, "map");

        assert!(plan.schedule(TaskGroupId::new(StageId(1), 7)).is_err());
    }

    #[test]
    pub fn hash_ranged_partition_ids_test() {
        let mut builder = PhysicalPlanBuilder::new(JobId::from("plan"));
        builder
            .add_stage(PhysicalStage::new(StageId(1), 4, &["map"]))
            .unwrap();
        builder
            .add_stage(PhysicalStage::new(StageId(2), 5, &["reduce"]))
            .unwrap();
        let edge_id = builder
            .connect(
                StageId(1),
                StageId(2),
                EdgeAttributes::new(CommunicationPattern::ScatterGather)
                    .with_shuffle_layout(ShuffleLayout::HashRanged),
            )
            .unwrap();
        let plan = builder.build().unwrap();

        let ids = plan.edge(&edge_id).unwrap().partition_ids();
        assert_eq!(ids.len(), 4);
        assert!(ids.iter().all(|id| id.consumer_index().is_none()));
    }

    #[test]
    pub fn illegal_plan_test() {
        let mut builder = PhysicalPlanBuilder::new(JobId::from("plan"));
        builder
            .add_stage(PhysicalStage::new(StageId(1), 1, &["map"]))
            .unwrap();
        builder
            .add_stage(PhysicalStage::new(StageId(2), 1, &["map"]))
            .unwrap();

        match builder.add_stage(PhysicalStage::new(StageId(1), 1, &["map"])) {
            Err(Error::Dag(DagError::DuplicateStage(StageId(1)))) => {}
            rt => panic!("unexpected {:?}", rt),
        }
        match builder.add_stage(PhysicalStage::new(StageId(3), 0, &["map"])) {
            Err(Error::Dag(DagError::EmptyStage(StageId(3)))) => {}
            rt => panic!("unexpected {:?}", rt),
        }

        let attributes = EdgeAttributes::new(CommunicationPattern::OneToOne);
        builder
            .connect(StageId(1), StageId(2), attributes.clone())
            .unwrap();
        match builder.connect(StageId(2), StageId(1), attributes.clone()) {
            Err(Error::Dag(DagError::WouldCycle(_))) => {}
            rt => panic!("unexpected {:?}", rt),
        }
        assert!(builder.connect(StageId(2), StageId(9), attributes).is_err());
    }

    #[test]
    pub fn one_to_one_parallelism_test() {
        let mut builder = PhysicalPlanBuilder::new(JobId::from("plan"));
        builder
            .add_stage(PhysicalStage::new(StageId(1), 3, &["map"]))
            .unwrap();
        builder
            .add_stage(PhysicalStage::new(StageId(2), 2, &["map"]))
            .unwrap();

        match builder.connect(
            StageId(1),
            StageId(2),
            EdgeAttributes::new(CommunicationPattern::OneToOne),
        ) {
            Err(Error::Dag(DagError::ParallelismMismatch {
                src_parallelism: 3,
                dst_parallelism: 2,
                ..
            })) => {}
            rt => panic!("unexpected {:?}", rt),
        }

        // the other patterns connect any parallelism
        for pattern in vec![
            CommunicationPattern::Broadcast,
            CommunicationPattern::ScatterGather,
        ] {
            let mut builder = PhysicalPlanBuilder::new(JobId::from("plan"));
            builder
                .add_stage(PhysicalStage::new(StageId(1), 3, &["map"]))
                .unwrap();
            builder
                .add_stage(PhysicalStage::new(StageId(2), 2, &["map"]))
                .unwrap();
            builder
                .connect(StageId(1), StageId(2), EdgeAttributes::new(pattern))
                .unwrap();
        }
    }

    #[test]
    pub fn duplicate_edge_test() {
        let mut builder = PhysicalPlanBuilder::new(JobId::from("plan"));
        for id in 1..=3 {
            builder
                .add_stage(PhysicalStage::new(StageId(id), 2, &["map"]))
                .unwrap();
        }
        let attributes = EdgeAttributes::new(CommunicationPattern::ScatterGather);
        builder
            .connect_with_id(EdgeId::from("shuffle"), StageId(1), StageId(2), attributes.clone())
            .unwrap();
        match builder.connect_with_id(EdgeId::from("shuffle"), StageId(2), StageId(3), attributes) {
            Err(Error::Dag(DagError::DuplicateEdge(edge_id))) => {
                assert_eq!(edge_id, EdgeId::from("shuffle"))
            }
            rt => panic!("unexpected {:?}", rt),
        }
        assert_eq!(builder.build().unwrap().edges().len(), 1);
    }
}
