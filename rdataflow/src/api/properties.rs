use std::collections::HashMap;
use std::convert::TryFrom;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::str::FromStr;

use crate::api::attribute::StoreKind;

pub(crate) const SYSTEM_BLOCK_SIZE_KB: &str = "SYSTEM_BLOCK_SIZE_KB";
pub(crate) const SYSTEM_FILE_DIRECTORY: &str = "SYSTEM_FILE_DIRECTORY";
pub(crate) const SYSTEM_MAX_SCHEDULE_ATTEMPT: &str = "SYSTEM_MAX_SCHEDULE_ATTEMPT";
pub(crate) const SYSTEM_DEFAULT_STORE: &str = "SYSTEM_DEFAULT_STORE";

pub const DEFAULT_BLOCK_SIZE_KB: u32 = 128;
pub const DEFAULT_MAX_SCHEDULE_ATTEMPT: u32 = 3;

/// Runtime knobs stored in a `Properties` map.
pub trait SystemProperties {
    /// Local-file flush threshold in units of 1000 bytes.
    fn set_block_size_kb(&mut self, block_size_kb: u32);
    fn get_block_size_kb(&self) -> Result<u32, PropertiesError>;

    fn set_file_directory(&mut self, file_directory: PathBuf);
    fn get_file_directory(&self) -> Result<PathBuf, PropertiesError>;

    fn set_max_schedule_attempt(&mut self, max_schedule_attempt: u32);
    fn get_max_schedule_attempt(&self) -> Result<u32, PropertiesError>;

    fn set_default_store(&mut self, store: StoreKind);
    fn get_default_store(&self) -> Result<StoreKind, PropertiesError>;
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Properties {
    properties: HashMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Properties {
            properties: HashMap::new(),
        }
    }

    pub fn as_map(&self) -> &HashMap<String, String> {
        &self.properties
    }

    pub fn set_str(&mut self, key: &str, value: &str) {
        self.properties.insert(key.to_string(), value.to_string());
    }

    pub fn set_string(&mut self, key: String, value: String) {
        self.properties.insert(key, value);
    }

    pub fn get_string(&self, key: &str) -> Result<String, PropertiesError> {
        match self.properties.get(key) {
            Some(v) => Ok(v.clone()),
            None => Err(PropertiesError::None(key.to_string())),
        }
    }

    pub fn set_u32(&mut self, key: &str, value: u32) {
        self.set_string(key.to_string(), value.to_string());
    }

    pub fn get_u32(&self, key: &str) -> Result<u32, PropertiesError> {
        match self.properties.get(key) {
            Some(v) => u32::from_str(v).map_err(|e| PropertiesError::from(e)),
            None => Err(PropertiesError::None(key.to_string())),
        }
    }

    pub fn get_u64(&self, key: &str) -> Result<u64, PropertiesError> {
        match self.properties.get(key) {
            Some(v) => u64::from_str(v).map_err(|e| PropertiesError::from(e)),
            None => Err(PropertiesError::None(key.to_string())),
        }
    }
}

impl SystemProperties for Properties {
    fn set_block_size_kb(&mut self, block_size_kb: u32) {
        self.set_u32(SYSTEM_BLOCK_SIZE_KB, block_size_kb)
    }

    fn get_block_size_kb(&self) -> Result<u32, PropertiesError> {
        match self.get_u32(SYSTEM_BLOCK_SIZE_KB) {
            Err(PropertiesError::None(_)) => Ok(DEFAULT_BLOCK_SIZE_KB),
            rt => rt,
        }
    }

    fn set_file_directory(&mut self, file_directory: PathBuf) {
        self.set_string(
            SYSTEM_FILE_DIRECTORY.to_string(),
            file_directory.to_string_lossy().to_string(),
        )
    }

    fn get_file_directory(&self) -> Result<PathBuf, PropertiesError> {
        self.get_string(SYSTEM_FILE_DIRECTORY).map(PathBuf::from)
    }

    fn set_max_schedule_attempt(&mut self, max_schedule_attempt: u32) {
        self.set_u32(SYSTEM_MAX_SCHEDULE_ATTEMPT, max_schedule_attempt)
    }

    fn get_max_schedule_attempt(&self) -> Result<u32, PropertiesError> {
        match self.get_u32(SYSTEM_MAX_SCHEDULE_ATTEMPT) {
            Err(PropertiesError::None(_)) => Ok(DEFAULT_MAX_SCHEDULE_ATTEMPT),
            rt => rt,
        }
    }

    fn set_default_store(&mut self, store: StoreKind) {
        self.set_string(SYSTEM_DEFAULT_STORE.to_string(), store.to_string())
    }

    fn get_default_store(&self) -> Result<StoreKind, PropertiesError> {
        match self.get_string(SYSTEM_DEFAULT_STORE) {
            Ok(value) => StoreKind::try_from(value.as_str())
                .map_err(|e| PropertiesError::Illegal(e.to_string())),
            Err(PropertiesError::None(_)) => Ok(StoreKind::default()),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug)]
pub enum PropertiesError {
    None(String),
    ParseIntError(ParseIntError),
    Illegal(String),
}

impl std::fmt::Display for PropertiesError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            PropertiesError::None(ref key) => write!(f, "`{}` field not found", key),
            PropertiesError::ParseIntError(ref err) => write!(f, "ParseIntError error: {}", err),
            PropertiesError::Illegal(ref err) => write!(f, "Illegal value: {}", err),
        }
    }
}

impl std::error::Error for PropertiesError {}

impl From<ParseIntError> for PropertiesError {
    fn from(e: ParseIntError) -> Self {
        PropertiesError::ParseIntError(e)
    }
}

impl From<PropertiesError> for crate::api::error::Error {
    fn from(e: PropertiesError) -> Self {
        crate::api::error::Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::api::attribute::StoreKind;
    use crate::api::properties::{
        Properties, PropertiesError, SystemProperties, DEFAULT_BLOCK_SIZE_KB,
        DEFAULT_MAX_SCHEDULE_ATTEMPT,
    };

    #[test]
    pub fn system_properties_default_test() {
        let properties = Properties::new();
        assert_eq!(properties.get_block_size_kb().unwrap(), DEFAULT_BLOCK_SIZE_KB);
        assert_eq!(
            properties.get_max_schedule_attempt().unwrap(),
            DEFAULT_MAX_SCHEDULE_ATTEMPT
        );
        assert_eq!(properties.get_default_store().unwrap(), StoreKind::Memory);
        match properties.get_file_directory() {
            Err(PropertiesError::None(_)) => {}
            rt => panic!("unexpected {:?}", rt),
        }
    }

    #[test]
    pub fn system_properties_test() {
        let mut properties = Properties::new();
        properties.set_block_size_kb(4);
        properties.set_max_schedule_attempt(2);
        properties.set_default_store(StoreKind::LocalFile);
        properties.set_file_directory(PathBuf::from("/tmp/blocks"));

        assert_eq!(properties.get_block_size_kb().unwrap(), 4);
        assert_eq!(properties.get_max_schedule_attempt().unwrap(), 2);
        assert_eq!(properties.get_default_store().unwrap(), StoreKind::LocalFile);
        assert_eq!(
            properties.get_file_directory().unwrap(),
            PathBuf::from("/tmp/blocks")
        );

        properties.set_str("SYSTEM_BLOCK_SIZE_KB", "many");
        assert!(properties.get_block_size_kb().is_err());
    }
}
