use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::api::error::{Error, Result};

const TYPE_NULL: u8 = 0;
const TYPE_BOOL: u8 = 1;
const TYPE_INT: u8 = 2;
const TYPE_STRING: u8 = 3;
const TYPE_BYTES: u8 = 4;

#[derive(Clone, Serialize, Deserialize, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            _ => false,
        }
    }

    pub(crate) fn serialize(&self, bytes: &mut BytesMut) {
        match self {
            Value::Null => bytes.put_u8(TYPE_NULL),
            Value::Bool(v) => {
                bytes.put_u8(TYPE_BOOL);
                bytes.put_u8(*v as u8);
            }
            Value::Int(v) => {
                bytes.put_u8(TYPE_INT);
                bytes.put_i64(*v);
            }
            Value::String(v) => {
                bytes.put_u8(TYPE_STRING);
                bytes.put_u32(v.len() as u32);
                bytes.put_slice(v.as_bytes());
            }
            Value::Bytes(v) => {
                bytes.put_u8(TYPE_BYTES);
                bytes.put_u32(v.len() as u32);
                bytes.put_slice(v.as_slice());
            }
        }
    }

    pub(crate) fn deserialize(bytes: &mut Bytes) -> Result<Self> {
        let value_type = read_u8(bytes)?;
        match value_type {
            TYPE_NULL => Ok(Value::Null),
            TYPE_BOOL => Ok(Value::Bool(read_u8(bytes)? != 0)),
            TYPE_INT => {
                ensure_remaining(bytes, 8)?;
                Ok(Value::Int(bytes.get_i64()))
            }
            TYPE_STRING => {
                let raw = read_sized(bytes)?;
                String::from_utf8(raw.to_vec())
                    .map(Value::String)
                    .map_err(|e| Error::Codec(format!("illegal utf8 string. {}", e)))
            }
            TYPE_BYTES => Ok(Value::Bytes(read_sized(bytes)?.to_vec())),
            _ => Err(Error::Codec(format!("unknown value type {}", value_type))),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

/// A unit of data flowing over an edge. Elements without a key carry `Value::Null`.
#[derive(Clone, Serialize, Deserialize, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Element {
    key: Value,
    value: Value,
}

impl Element {
    pub fn new<V: Into<Value>>(value: V) -> Self {
        Element {
            key: Value::Null,
            value: value.into(),
        }
    }

    pub fn with_key<K: Into<Value>, V: Into<Value>>(key: K, value: V) -> Self {
        Element {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &Value {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_parts(self) -> (Value, Value) {
        (self.key, self.value)
    }

    /// Bytes the partitioners hash on.
    pub(crate) fn key_bytes(&self) -> BytesMut {
        let mut bytes = BytesMut::with_capacity(16);
        self.key.serialize(&mut bytes);
        bytes
    }
}

fn ensure_remaining(bytes: &Bytes, len: usize) -> Result<()> {
    if bytes.remaining() < len {
        Err(Error::Codec(format!(
            "unexpected end of buffer, need {} bytes, remaining {}",
            len,
            bytes.remaining()
        )))
    } else {
        Ok(())
    }
}

pub(crate) fn read_u8(bytes: &mut Bytes) -> Result<u8> {
    ensure_remaining(bytes, 1)?;
    Ok(bytes.get_u8())
}

pub(crate) fn read_u32(bytes: &mut Bytes) -> Result<u32> {
    ensure_remaining(bytes, 4)?;
    Ok(bytes.get_u32())
}

pub(crate) fn read_u64(bytes: &mut Bytes) -> Result<u64> {
    ensure_remaining(bytes, 8)?;
    Ok(bytes.get_u64())
}

/// Read a `u32` length followed by that many bytes.
pub(crate) fn read_sized(bytes: &mut Bytes) -> Result<Bytes> {
    let len = read_u32(bytes)? as usize;
    ensure_remaining(bytes, len)?;
    Ok(bytes.split_to(len))
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use crate::api::element::{Element, Value};

    #[test]
    pub fn value_serde_test() {
        let values = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(-42),
            Value::from("shuffle"),
            Value::Bytes(vec![0, 1, 2]),
        ];

        let mut buffer = BytesMut::new();
        for value in &values {
            value.serialize(&mut buffer);
        }

        let mut bytes = buffer.freeze();
        for value in &values {
            assert_eq!(&Value::deserialize(&mut bytes).unwrap(), value);
        }
        assert!(bytes.is_empty());
    }

    #[test]
    pub fn truncated_value_test() {
        let mut buffer = BytesMut::new();
        Value::from("truncated").serialize(&mut buffer);
        let mut bytes = buffer.freeze().slice(0..6);
        assert!(Value::deserialize(&mut bytes).is_err());
    }

    #[test]
    pub fn element_key_test() {
        let keyed = Element::with_key(7, "seven");
        assert_eq!(keyed.key(), &Value::Int(7));
        assert!(Element::new(1).key().is_null());
        assert_ne!(keyed.key_bytes(), Element::with_key(8, "seven").key_bytes());
    }
}
