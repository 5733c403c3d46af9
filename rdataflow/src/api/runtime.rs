use std::str::FromStr;

use crate::api::error::Error;

#[derive(Clone, Serialize, Deserialize, Debug, Eq, PartialEq, Hash, Default)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        JobId(id.to_string())
    }
}

#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
pub struct StageId(pub u32);

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Stage-{}", self.0)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(id: &str) -> Self {
        EdgeId(id.to_string())
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
pub struct WorkerId(pub String);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(id: &str) -> Self {
        WorkerId(id.to_string())
    }
}

/// A task group is addressed by its stage and its stable index inside that stage.
#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
pub struct TaskGroupId {
    pub(crate) stage_id: StageId,
    pub(crate) index: u32,
}

impl TaskGroupId {
    pub fn new(stage_id: StageId, index: u32) -> Self {
        TaskGroupId { stage_id, index }
    }

    pub fn stage_id(&self) -> StageId {
        self.stage_id
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl std::fmt::Display for TaskGroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TaskGroup-{}-{}", self.stage_id.0, self.index)
    }
}

/// Composite key of a partition (block).
///
/// `consumer_index` is only set for partitions of a scatter-gather edge that
/// are written once per destination task.
#[derive(Clone, Serialize, Deserialize, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PartitionId {
    pub(crate) edge_id: EdgeId,
    pub(crate) producer_index: u32,
    pub(crate) consumer_index: Option<u32>,
}

impl PartitionId {
    pub fn new(edge_id: EdgeId, producer_index: u32) -> Self {
        PartitionId {
            edge_id,
            producer_index,
            consumer_index: None,
        }
    }

    pub fn with_consumer(edge_id: EdgeId, producer_index: u32, consumer_index: u32) -> Self {
        PartitionId {
            edge_id,
            producer_index,
            consumer_index: Some(consumer_index),
        }
    }

    pub fn edge_id(&self) -> &EdgeId {
        &self.edge_id
    }

    pub fn producer_index(&self) -> u32 {
        self.producer_index
    }

    pub fn consumer_index(&self) -> Option<u32> {
        self.consumer_index
    }

    /// A name that is safe to use as a file name. Distinct ids always map
    /// to distinct names.
    pub fn file_name(&self) -> String {
        self.to_string()
    }
}

/// Bytes of an edge id outside `[A-Za-z0-9-]` are written as `%XX`, so the
/// `_` separators of a partition id stay unambiguous.
fn escape_edge_id(edge_id: &str) -> String {
    let mut escaped = String::with_capacity(edge_id.len());
    for b in edge_id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' {
            escaped.push(b as char);
        } else {
            escaped.push_str(format!("%{:02X}", b).as_str());
        }
    }
    escaped
}

fn unescape_edge_id(escaped: &str) -> Option<String> {
    let raw = escaped.as_bytes();
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'%' => {
                let hex = escaped.get(i + 1..i + 3)?;
                if !hex.bytes().all(|c| c.is_ascii_hexdigit()) {
                    return None;
                }
                bytes.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b if b.is_ascii_alphanumeric() || b == b'-' => {
                bytes.push(b);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(bytes).ok()
}

impl std::fmt::Display for PartitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let edge_id = escape_edge_id(self.edge_id.as_str());
        match self.consumer_index {
            Some(consumer_index) => write!(
                f,
                "{}_{}_{}",
                edge_id, self.producer_index, consumer_index
            ),
            None => write!(f, "{}_{}", edge_id, self.producer_index),
        }
    }
}

impl FromStr for PartitionId {
    type Err = Error;

    /// Parse `<escaped edge>_<producer>[_<consumer>]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let illegal = || Error::Config(format!("illegal partition id `{}`", s));

        let fields: Vec<&str> = s.split('_').collect();
        if fields.len() < 2 || fields.len() > 3 || fields[0].is_empty() {
            return Err(illegal());
        }

        let edge_id = unescape_edge_id(fields[0]).ok_or_else(illegal)?;
        let producer_index = u32::from_str(fields[1]).map_err(|_| illegal())?;
        match fields.get(2) {
            Some(consumer_index) => {
                let consumer_index = u32::from_str(consumer_index).map_err(|_| illegal())?;
                Ok(PartitionId::with_consumer(
                    EdgeId(edge_id),
                    producer_index,
                    consumer_index,
                ))
            }
            None => Ok(PartitionId::new(EdgeId(edge_id), producer_index)),
        }
    }
}
