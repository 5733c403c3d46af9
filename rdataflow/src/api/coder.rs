use std::convert::TryFrom;
use std::fmt::Debug;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use crate::api::element::{read_sized, Element, Value};
use crate::api::error::{Error, Result};

/// Element encoding used by an edge. Every encoded element must be self-delimiting
/// so that a block of `n` elements can be decoded by calling `decode` `n` times.
pub trait Coder: Send + Sync + Debug {
    fn encode(&self, element: &Element, buffer: &mut BytesMut) -> Result<()>;
    fn decode(&self, buffer: &mut Bytes) -> Result<Element>;
}

#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, Hash)]
pub enum CoderKind {
    Binary,
    Json,
}

impl CoderKind {
    pub fn create(&self) -> Arc<dyn Coder> {
        match self {
            CoderKind::Binary => Arc::new(BinaryCoder),
            CoderKind::Json => Arc::new(JsonCoder),
        }
    }
}

impl Default for CoderKind {
    fn default() -> Self {
        CoderKind::Binary
    }
}

impl<'a> TryFrom<&'a str> for CoderKind {
    type Error = Error;

    fn try_from(mode_str: &'a str) -> Result<Self> {
        let mode_str = mode_str.to_ascii_lowercase();
        match mode_str.as_str() {
            "binary" => Ok(CoderKind::Binary),
            "json" => Ok(CoderKind::Json),
            _ => Err(Error::Config(format!("Unsupported coder {}", mode_str))),
        }
    }
}

impl std::fmt::Display for CoderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoderKind::Binary => write!(f, "Binary"),
            CoderKind::Json => write!(f, "Json"),
        }
    }
}

/// Compact tagged encoding: key then value.
#[derive(Copy, Clone, Debug, Default)]
pub struct BinaryCoder;

impl Coder for BinaryCoder {
    fn encode(&self, element: &Element, buffer: &mut BytesMut) -> Result<()> {
        element.key().serialize(buffer);
        element.value().serialize(buffer);
        Ok(())
    }

    fn decode(&self, buffer: &mut Bytes) -> Result<Element> {
        let key = Value::deserialize(buffer)?;
        let value = Value::deserialize(buffer)?;
        Ok(Element::with_key(key, value))
    }
}

/// `serde_json` document prefixed with its `u32` length.
#[derive(Copy, Clone, Debug, Default)]
pub struct JsonCoder;

impl Coder for JsonCoder {
    fn encode(&self, element: &Element, buffer: &mut BytesMut) -> Result<()> {
        let json = serde_json::to_vec(element)?;
        buffer.put_u32(json.len() as u32);
        buffer.put_slice(json.as_slice());
        Ok(())
    }

    fn decode(&self, buffer: &mut Bytes) -> Result<Element> {
        let json = read_sized(buffer)?;
        let element = serde_json::from_slice(json.as_ref())?;
        Ok(element)
    }
}
