use bytes::{BufMut, Bytes, BytesMut};

use crate::api::coder::Coder;
use crate::api::element::{read_sized, read_u32, read_u64, Element};
use crate::api::error::{Error, Result};

/// Tag of the blocks of a partition that is not split by destination.
pub const UNTAGGED: u32 = 0;

/// Largest block the `u32` length fields on disk and on the wire can describe.
pub const MAX_BLOCK_LEN: usize = u32::MAX as usize;

/// The length of a block as written in headers.
pub(crate) fn checked_block_len(len: usize) -> Result<u32> {
    if len > MAX_BLOCK_LEN {
        return Err(Error::Codec(format!(
            "block of {} bytes exceeds the max block length {}",
            len, MAX_BLOCK_LEN
        )));
    }
    Ok(len as u32)
}

/// A sealed run of elements serialized back to back by the edge's coder.
/// The element count lets a reader find element boundaries without a scan.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Block {
    tag: u32,
    element_count: u64,
    data: Bytes,
}

impl Block {
    pub fn new(tag: u32, element_count: u64, data: Bytes) -> Self {
        Block {
            tag,
            element_count,
            data,
        }
    }

    /// Serialize all `elements` into exactly one block.
    pub fn encode(tag: u32, coder: &dyn Coder, elements: &[Element]) -> Result<Self> {
        let mut buffer = BytesMut::new();
        for element in elements {
            coder.encode(element, &mut buffer)?;
        }
        checked_block_len(buffer.len())?;
        Ok(Block::new(tag, elements.len() as u64, buffer.freeze()))
    }

    pub fn tag(&self) -> u32 {
        self.tag
    }

    pub fn element_count(&self) -> u64 {
        self.element_count
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.element_count == 0
    }

    pub fn in_range(&self, hash_range_start: u32, hash_range_end: u32) -> bool {
        self.tag >= hash_range_start && self.tag < hash_range_end
    }

    pub fn decode(&self, coder: &dyn Coder) -> Result<Vec<Element>> {
        let mut data = self.data.clone();
        // every element takes at least one byte
        let capacity = self.element_count.min(data.len() as u64) as usize;
        let mut elements = Vec::with_capacity(capacity);
        for _ in 0..self.element_count {
            elements.push(coder.decode(&mut data)?);
        }
        if !data.is_empty() {
            return Err(Error::Codec(format!(
                "{} trailing bytes after {} elements",
                data.len(),
                self.element_count
            )));
        }
        Ok(elements)
    }

    /// `[u32 tag][u64 element count][u32 length][data]`. The length was
    /// checked against `MAX_BLOCK_LEN` when the block was sealed.
    pub(crate) fn serialize(&self, buffer: &mut BytesMut) {
        buffer.reserve(16 + self.data.len());
        buffer.put_u32(self.tag);
        buffer.put_u64(self.element_count);
        buffer.put_u32(self.data.len() as u32);
        buffer.put_slice(self.data.as_ref());
    }

    pub(crate) fn deserialize(bytes: &mut Bytes) -> Result<Self> {
        let tag = read_u32(bytes)?;
        let element_count = read_u64(bytes)?;
        let data = read_sized(bytes)?;
        if element_count > data.len() as u64 {
            return Err(Error::Codec(format!(
                "block claims {} elements in {} bytes",
                element_count,
                data.len()
            )));
        }
        Ok(Block::new(tag, element_count, data))
    }
}

/// Serializes elements into blocks, sealing the current block as soon as it
/// reaches `block_size` bytes so that a writer never buffers much more.
pub struct BlockWriter<'a> {
    coder: &'a dyn Coder,
    block_size: usize,
    tag: u32,
    buffer: BytesMut,
    element_count: u64,
}

impl<'a> BlockWriter<'a> {
    pub fn new(coder: &'a dyn Coder, block_size: usize, tag: u32) -> Self {
        BlockWriter {
            coder,
            block_size,
            tag,
            buffer: BytesMut::with_capacity(block_size.min(64 * 1024)),
            element_count: 0,
        }
    }

    pub fn write(&mut self, element: &Element) -> Result<Option<Block>> {
        self.coder.encode(element, &mut self.buffer)?;
        self.element_count += 1;
        checked_block_len(self.buffer.len())?;

        if self.buffer.len() >= self.block_size {
            Ok(Some(self.seal()))
        } else {
            Ok(None)
        }
    }

    /// The last, partially filled block.
    pub fn finish(mut self) -> Option<Block> {
        if self.element_count == 0 {
            None
        } else {
            Some(self.seal())
        }
    }

    fn seal(&mut self) -> Block {
        let data = self.buffer.split().freeze();
        let element_count = self.element_count;
        self.element_count = 0;
        Block::new(self.tag, element_count, data)
    }
}

#[cfg(test)]
mod tests {
    use crate::api::coder::CoderKind;
    use crate::api::element::Element;
    use bytes::{Bytes, BytesMut};

    use crate::api::error::Error;
    use crate::storage::block::{checked_block_len, Block, BlockWriter, MAX_BLOCK_LEN, UNTAGGED};

    #[test]
    pub fn block_writer_threshold_test() {
        let coder = CoderKind::Binary.create();
        // a keyless int element takes 1 + 1 + 8 bytes
        let mut writer = BlockWriter::new(coder.as_ref(), 25, UNTAGGED);

        let mut blocks = Vec::new();
        for i in 0..7 {
            if let Some(block) = writer.write(&Element::new(i)).unwrap() {
                blocks.push(block);
            }
        }
        blocks.extend(writer.finish());

        let counts: Vec<u64> = blocks.iter().map(|b| b.element_count()).collect();
        assert_eq!(counts, vec![3, 3, 1]);

        let decoded: Vec<Element> = blocks
            .iter()
            .flat_map(|b| b.decode(coder.as_ref()).unwrap())
            .collect();
        assert_eq!(decoded, (0..7).map(Element::new).collect::<Vec<Element>>());
    }

    #[test]
    pub fn block_decode_test() {
        let coder = CoderKind::Json.create();
        let elements = vec![Element::with_key("a", 1), Element::with_key("b", 2)];
        let block = Block::encode(4, coder.as_ref(), elements.as_slice()).unwrap();
        assert_eq!(block.tag(), 4);
        assert!(block.in_range(4, 5));
        assert!(!block.in_range(0, 4));
        assert_eq!(block.decode(coder.as_ref()).unwrap(), elements);

        // a wrong element count is detected
        let broken = Block::new(4, 1, block.data().clone());
        assert!(broken.decode(coder.as_ref()).is_err());
        assert!(BlockWriter::new(coder.as_ref(), 8, 0).finish().is_none());
    }

    #[test]
    pub fn corrupt_block_header_test() {
        let coder = CoderKind::Binary.create();
        let hostile = Block::new(0, u64::MAX, Bytes::new());
        match hostile.decode(coder.as_ref()) {
            Err(Error::Codec(_)) => {}
            rt => panic!("unexpected {:?}", rt),
        }

        let mut buffer = BytesMut::new();
        Block::new(3, 1_000, Bytes::from_static(b"abc")).serialize(&mut buffer);
        match Block::deserialize(&mut buffer.freeze()) {
            Err(Error::Codec(_)) => {}
            rt => panic!("unexpected {:?}", rt),
        }
    }

    #[test]
    pub fn max_block_len_test() {
        assert_eq!(checked_block_len(MAX_BLOCK_LEN).unwrap(), u32::MAX);
        match checked_block_len(MAX_BLOCK_LEN + 1) {
            Err(Error::Codec(_)) => {}
            rt => panic!("unexpected {:?}", rt),
        }
    }
}
