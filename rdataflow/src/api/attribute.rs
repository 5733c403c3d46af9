use std::convert::TryFrom;

use crate::api::coder::CoderKind;
use crate::api::error::{Error, Result};

/// Fan-in/fan-out contract of an edge.
#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, Hash)]
pub enum CommunicationPattern {
    /// producer `i` feeds consumer `i`
    OneToOne,
    /// every consumer reads every producer's single partition
    Broadcast,
    /// all-to-all exchange keyed by destination index
    ScatterGather,
}

impl<'a> TryFrom<&'a str> for CommunicationPattern {
    type Error = Error;

    fn try_from(mode_str: &'a str) -> Result<Self> {
        let mode_str = mode_str.to_ascii_lowercase();
        match mode_str.as_str() {
            "onetoone" | "one_to_one" => Ok(CommunicationPattern::OneToOne),
            "broadcast" => Ok(CommunicationPattern::Broadcast),
            "scattergather" | "scatter_gather" | "shuffle" => {
                Ok(CommunicationPattern::ScatterGather)
            }
            _ => Err(Error::Config(format!(
                "Unsupported communication pattern {}",
                mode_str
            ))),
        }
    }
}

impl std::fmt::Display for CommunicationPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommunicationPattern::OneToOne => write!(f, "OneToOne"),
            CommunicationPattern::Broadcast => write!(f, "Broadcast"),
            CommunicationPattern::ScatterGather => write!(f, "ScatterGather"),
        }
    }
}

/// How a scatter-gather producer assigns elements to destination indices.
#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, Hash)]
pub enum PartitionerKind {
    /// murmur3 of the element key modulo the downstream parallelism
    Hash,
    RoundRobin,
}

impl Default for PartitionerKind {
    fn default() -> Self {
        PartitionerKind::Hash
    }
}

impl<'a> TryFrom<&'a str> for PartitionerKind {
    type Error = Error;

    fn try_from(mode_str: &'a str) -> Result<Self> {
        let mode_str = mode_str.to_ascii_lowercase();
        match mode_str.as_str() {
            "hash" => Ok(PartitionerKind::Hash),
            "roundrobin" | "round_robin" => Ok(PartitionerKind::RoundRobin),
            _ => Err(Error::Config(format!("Unsupported partitioner {}", mode_str))),
        }
    }
}

/// Which per-worker partition store keeps the edge's data.
#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, Hash)]
pub enum StoreKind {
    Memory,
    LocalFile,
}

impl Default for StoreKind {
    fn default() -> Self {
        StoreKind::Memory
    }
}

impl<'a> TryFrom<&'a str> for StoreKind {
    type Error = Error;

    fn try_from(mode_str: &'a str) -> Result<Self> {
        let mode_str = mode_str.to_ascii_lowercase();
        match mode_str.as_str() {
            "memory" => Ok(StoreKind::Memory),
            "localfile" | "local_file" | "file" => Ok(StoreKind::LocalFile),
            _ => Err(Error::Config(format!("Unsupported store {}", mode_str))),
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Memory => write!(f, "Memory"),
            StoreKind::LocalFile => write!(f, "LocalFile"),
        }
    }
}

/// Physical layout of a scatter-gather edge's partitions.
#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, Hash)]
pub enum ShuffleLayout {
    /// one partition `(edge, producer, destination)` per destination
    PerDestination,
    /// one partition `(edge, producer)` made of blocks tagged by destination
    HashRanged,
}

impl Default for ShuffleLayout {
    fn default() -> Self {
        ShuffleLayout::PerDestination
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Eq, PartialEq)]
pub struct EdgeAttributes {
    pub comm_pattern: CommunicationPattern,
    #[serde(default)]
    pub partitioner: PartitionerKind,
    #[serde(default)]
    pub coder: CoderKind,
    #[serde(default)]
    pub store: StoreKind,
    #[serde(default)]
    pub shuffle_layout: ShuffleLayout,
}

impl EdgeAttributes {
    pub fn new(comm_pattern: CommunicationPattern) -> Self {
        EdgeAttributes {
            comm_pattern,
            partitioner: PartitionerKind::default(),
            coder: CoderKind::default(),
            store: StoreKind::default(),
            shuffle_layout: ShuffleLayout::default(),
        }
    }

    pub fn with_partitioner(mut self, partitioner: PartitionerKind) -> Self {
        self.partitioner = partitioner;
        self
    }

    pub fn with_coder(mut self, coder: CoderKind) -> Self {
        self.coder = coder;
        self
    }

    pub fn with_store(mut self, store: StoreKind) -> Self {
        self.store = store;
        self
    }

    pub fn with_shuffle_layout(mut self, shuffle_layout: ShuffleLayout) -> Self {
        self.shuffle_layout = shuffle_layout;
        self
    }
}

/// Attributes of the task groups on the other side of an edge.
#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq)]
pub struct VertexAttributes {
    pub parallelism: u32,
}

impl VertexAttributes {
    pub fn new(parallelism: u32) -> Self {
        VertexAttributes { parallelism }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;

    use crate::api::attribute::{
        CommunicationPattern, EdgeAttributes, PartitionerKind, ShuffleLayout, StoreKind,
    };

    #[test]
    pub fn parse_attribute_test() {
        assert_eq!(
            CommunicationPattern::try_from("Shuffle").unwrap(),
            CommunicationPattern::ScatterGather
        );
        assert_eq!(
            PartitionerKind::try_from("round_robin").unwrap(),
            PartitionerKind::RoundRobin
        );
        assert_eq!(StoreKind::try_from("LocalFile").unwrap(), StoreKind::LocalFile);
        assert!(StoreKind::try_from("hdfs").is_err());
    }

    #[test]
    pub fn edge_attributes_serde_test() {
        let json = r#"{"comm_pattern":"ScatterGather","store":"LocalFile"}"#;
        let attributes: EdgeAttributes = serde_json::from_str(json).unwrap();
        assert_eq!(
            attributes,
            EdgeAttributes::new(CommunicationPattern::ScatterGather)
                .with_store(StoreKind::LocalFile)
        );
        assert_eq!(attributes.shuffle_layout, ShuffleLayout::PerDestination);
    }
}
