use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use dashmap::DashMap;

use crate::api::coder::Coder;
use crate::api::element::Element;
use crate::api::error::{Error, Result};
use crate::api::runtime::PartitionId;
use crate::storage::block::{checked_block_len, Block, BlockWriter, UNTAGGED};
use crate::storage::{PartitionStore, TaggedElements};
use crate::utils::fs::create_dir;

/// `[u64 element count][u32 length]` in front of every block on disk.
const BLOCK_HEADER_LEN: u64 = 12;

#[derive(Clone, Debug)]
struct BlockMeta {
    tag: u32,
    /// offset of the block header in the partition file
    offset: u64,
    len: u32,
    element_count: u64,
}

#[derive(Debug)]
struct FilePartition {
    path: PathBuf,
    blocks: Vec<BlockMeta>,
}

impl FilePartition {
    fn size(&self) -> u64 {
        self.blocks
            .iter()
            .map(|b| BLOCK_HEADER_LEN + b.len as u64)
            .sum()
    }
}

/// Appends blocks to a new partition file, synchronously on the calling thread.
struct FilePartitionWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    offset: u64,
    blocks: Vec<BlockMeta>,
}

impl FilePartitionWriter {
    /// Fails with `PartitionAlreadyExists` when the file is there already.
    fn create(partition_id: &PartitionId, path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => Error::PartitionAlreadyExists(partition_id.clone()),
                _ => Error::Io(e),
            })?;

        Ok(FilePartitionWriter {
            path,
            writer: BufWriter::new(file),
            offset: 0,
            blocks: Vec::new(),
        })
    }

    fn append(&mut self, block: Block) -> Result<()> {
        let len = checked_block_len(block.len())?;
        let mut header = BytesMut::with_capacity(BLOCK_HEADER_LEN as usize);
        header.put_u64(block.element_count());
        header.put_u32(len);
        self.writer.write_all(header.as_ref())?;
        self.writer.write_all(block.data().as_ref())?;

        self.blocks.push(BlockMeta {
            tag: block.tag(),
            offset: self.offset,
            len,
            element_count: block.element_count(),
        });
        self.offset += BLOCK_HEADER_LEN + len as u64;
        Ok(())
    }

    /// Returns only after the data reached the disk.
    fn finish(self) -> Result<FilePartition> {
        let file = self
            .writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;
        file.sync_data()?;

        Ok(FilePartition {
            path: self.path,
            blocks: self.blocks,
        })
    }

    fn abort(self) {
        let path = self.path.clone();
        drop(self.writer);
        if let Err(e) = std::fs::remove_file(&path) {
            warn!("remove broken partition file {:?} error. {}", path, e);
        }
    }
}

/// One file per partition under `file_directory`. The tag, offset and
/// element count of every block stay in memory, so range reads seek straight
/// to the blocks they need.
#[derive(Debug)]
pub struct LocalFileStore {
    file_directory: PathBuf,
    /// bytes buffered before a block is sealed and appended
    block_size: usize,
    partitions: DashMap<PartitionId, Arc<FilePartition>>,
}

impl LocalFileStore {
    pub fn new(file_directory: PathBuf, block_size: usize) -> Result<Self> {
        create_dir(&file_directory)?;
        Ok(LocalFileStore {
            file_directory,
            block_size,
            partitions: DashMap::new(),
        })
    }

    pub fn file_directory(&self) -> &PathBuf {
        &self.file_directory
    }

    fn partition_path(&self, partition_id: &PartitionId) -> PathBuf {
        self.file_directory.join(partition_id.file_name())
    }

    fn write_partition<F>(&self, partition_id: &PartitionId, write_fn: F) -> Result<Option<u64>>
    where
        F: FnOnce(&mut FilePartitionWriter) -> Result<()>,
    {
        if self.partitions.contains_key(partition_id) {
            return Err(Error::PartitionAlreadyExists(partition_id.clone()));
        }

        let mut writer = FilePartitionWriter::create(partition_id, self.partition_path(partition_id))?;
        if let Err(e) = write_fn(&mut writer) {
            writer.abort();
            return Err(e);
        }
        let partition = writer.finish()?;
        let size = partition.size();

        self.partitions
            .insert(partition_id.clone(), Arc::new(partition));
        metrics::counter!("partition.write.bytes", size);
        debug!("write partition {} to file, size={}", partition_id, size);
        Ok(Some(size))
    }

    fn read_blocks(
        &self,
        partition_id: &PartitionId,
        hash_range: Option<(u32, u32)>,
    ) -> Result<Option<Vec<Block>>> {
        let partition = match self.partitions.get(partition_id) {
            Some(partition) => partition.value().clone(),
            None => return Ok(None),
        };

        let mut file = File::open(&partition.path)?;
        let mut blocks = Vec::new();
        for meta in &partition.blocks {
            let selected = match hash_range {
                Some((start, end)) => meta.tag >= start && meta.tag < end,
                None => true,
            };
            if selected {
                blocks.push(read_block(&mut file, meta)?);
            }
        }
        Ok(Some(blocks))
    }

    fn decode_blocks(
        &self,
        partition_id: &PartitionId,
        coder: &dyn Coder,
        hash_range: Option<(u32, u32)>,
    ) -> Result<Option<Vec<Element>>> {
        match self.read_blocks(partition_id, hash_range)? {
            Some(blocks) => {
                let mut elements = Vec::new();
                for block in blocks {
                    elements.extend(block.decode(coder)?);
                }
                Ok(Some(elements))
            }
            None => Ok(None),
        }
    }
}

fn read_block(file: &mut File, meta: &BlockMeta) -> Result<Block> {
    file.seek(SeekFrom::Start(meta.offset))?;

    let mut header = [0u8; BLOCK_HEADER_LEN as usize];
    file.read_exact(&mut header)?;
    let mut header = &header[..];
    let element_count = header.get_u64();
    let len = header.get_u32();
    if element_count != meta.element_count || len != meta.len {
        return Err(Error::Codec(format!(
            "block header mismatch at offset {}: count {} len {}, expect count {} len {}",
            meta.offset, element_count, len, meta.element_count, meta.len
        )));
    }

    let mut data = vec![0u8; len as usize];
    file.read_exact(data.as_mut_slice())?;
    Ok(Block::new(meta.tag, element_count, Bytes::from(data)))
}

impl PartitionStore for LocalFileStore {
    fn put_data_as_partition(
        &self,
        partition_id: &PartitionId,
        coder: &dyn Coder,
        elements: Vec<Element>,
    ) -> Result<Option<u64>> {
        let block_size = self.block_size;
        self.write_partition(partition_id, |writer| {
            let mut block_writer = BlockWriter::new(coder, block_size, UNTAGGED);
            for element in &elements {
                if let Some(block) = block_writer.write(element)? {
                    writer.append(block)?;
                }
            }
            if let Some(block) = block_writer.finish() {
                writer.append(block)?;
            }
            Ok(())
        })
    }

    fn put_sorted_data_as_partition(
        &self,
        partition_id: &PartitionId,
        coder: &dyn Coder,
        sorted_elements: Vec<TaggedElements>,
    ) -> Result<Option<u64>> {
        self.write_partition(partition_id, |writer| {
            for (tag, elements) in &sorted_elements {
                writer.append(Block::encode(*tag, coder, elements.as_slice())?)?;
            }
            Ok(())
        })
    }

    fn get_partition(
        &self,
        partition_id: &PartitionId,
        coder: &dyn Coder,
    ) -> Result<Option<Vec<Element>>> {
        self.decode_blocks(partition_id, coder, None)
    }

    fn retrieve_data_from_partition(
        &self,
        partition_id: &PartitionId,
        coder: &dyn Coder,
        hash_range_start: u32,
        hash_range_end: u32,
    ) -> Result<Option<Vec<Element>>> {
        self.decode_blocks(
            partition_id,
            coder,
            Some((hash_range_start, hash_range_end)),
        )
    }

    fn get_blocks(
        &self,
        partition_id: &PartitionId,
        _coder: &dyn Coder,
        hash_range: Option<(u32, u32)>,
    ) -> Result<Option<Vec<Block>>> {
        self.read_blocks(partition_id, hash_range)
    }

    fn remove_partition(&self, partition_id: &PartitionId) -> Result<bool> {
        match self.partitions.remove(partition_id) {
            Some((_, partition)) => {
                std::fs::remove_file(&partition.path)?;
                debug!("remove partition file {:?}", partition.path);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn contains(&self, partition_id: &PartitionId) -> bool {
        self.partitions.contains_key(partition_id)
    }
}

#[cfg(test)]
mod tests {
    use crate::api::coder::CoderKind;
    use crate::api::element::{Element, Value};
    use crate::api::error::Error;
    use crate::api::runtime::{EdgeId, PartitionId};
    use crate::storage::local_file_store::LocalFileStore;
    use crate::storage::PartitionStore;

    #[test]
    pub fn local_file_store_test() {
        let dir = tempfile::tempdir().unwrap();
        // small blocks force several flushes
        let store = LocalFileStore::new(dir.path().join("blocks"), 64).unwrap();
        let coder = CoderKind::Binary.create();
        let partition_id = PartitionId::new(EdgeId::from("Edge-0"), 2);
        let elements: Vec<Element> = (0..100).map(|i| Element::with_key(i % 7, i)).collect();

        let size = store
            .put_data_as_partition(&partition_id, coder.as_ref(), elements.clone())
            .unwrap()
            .unwrap();
        assert!(size > 64);
        assert!(store.partitions.get(&partition_id).unwrap().blocks.len() > 1);

        let path = dir.path().join("blocks").join(partition_id.file_name());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), size);

        assert_eq!(
            store
                .get_partition(&partition_id, coder.as_ref())
                .unwrap()
                .unwrap(),
            elements
        );

        match store.put_data_as_partition(&partition_id, coder.as_ref(), vec![Element::new(1)]) {
            Err(Error::PartitionAlreadyExists(_)) => {}
            rt => panic!("unexpected {:?}", rt),
        }

        assert!(store.remove_partition(&partition_id).unwrap());
        assert!(!path.exists());
        assert!(!store.remove_partition(&partition_id).unwrap());
        assert!(store
            .get_partition(&partition_id, coder.as_ref())
            .unwrap()
            .is_none());

        // the id may be written again once removed
        store
            .put_data_as_partition(&partition_id, coder.as_ref(), vec![Element::new(1)])
            .unwrap();
    }

    #[test]
    pub fn local_file_store_sorted_test() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path().to_path_buf(), 1).unwrap();
        let coder = CoderKind::Json.create();
        let partition_id = PartitionId::new(EdgeId::from("Edge-1"), 0);

        let sorted = (0..5u32)
            .map(|tag| {
                let elements = (0..3).map(|i| Element::with_key(tag as i64, i)).collect();
                (tag, elements)
            })
            .collect();
        store
            .put_sorted_data_as_partition(&partition_id, coder.as_ref(), sorted)
            .unwrap();

        // one block per sub-sequence regardless of the block size
        let partition = store.partitions.get(&partition_id).unwrap().value().clone();
        assert_eq!(partition.blocks.len(), 5);
        assert!(partition.blocks.iter().all(|b| b.element_count == 3));

        let range = store
            .retrieve_data_from_partition(&partition_id, coder.as_ref(), 2, 4)
            .unwrap()
            .unwrap();
        assert_eq!(range.len(), 6);
        assert!(range
            .iter()
            .all(|e| e.key() == &Value::Int(2) || e.key() == &Value::Int(3)));

        let blocks = store
            .get_blocks(&partition_id, coder.as_ref(), Some((4, 5)))
            .unwrap()
            .unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0].decode(coder.as_ref()).unwrap(),
            (0..3)
                .map(|i| Element::with_key(4, i))
                .collect::<Vec<Element>>()
        );
    }
}
