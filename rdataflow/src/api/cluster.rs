use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;

use crate::api::attribute::StoreKind;
use crate::api::properties::{
    Properties, SystemProperties, DEFAULT_BLOCK_SIZE_KB, DEFAULT_MAX_SCHEDULE_ATTEMPT,
};
use crate::api::runtime::WorkerId;
use crate::runtime::ClusterMode;

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_work_dir() -> String {
    "./".to_string()
}

fn default_file_directory() -> String {
    "./blocks".to_string()
}

fn default_block_size_kb() -> u32 {
    DEFAULT_BLOCK_SIZE_KB
}

fn default_max_schedule_attempt() -> u32 {
    DEFAULT_MAX_SCHEDULE_ATTEMPT
}

fn default_bind_ip() -> String {
    "127.0.0.1".to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub cluster_mode: ClusterMode,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_work_dir")]
    pub work_dir: String,

    /// root directory of the local-file partition store
    #[serde(default = "default_file_directory")]
    pub file_directory: String,
    /// local-file flush threshold in units of 1000 bytes
    #[serde(default = "default_block_size_kb")]
    pub block_size_kb: u32,
    #[serde(default)]
    pub default_store: StoreKind,

    #[serde(default = "default_max_schedule_attempt")]
    pub max_schedule_attempt: u32,

    #[serde(default = "default_bind_ip")]
    pub network_bind_ip: String,
}

impl RuntimeConfig {
    pub fn new_local() -> Self {
        RuntimeConfig {
            cluster_mode: ClusterMode::Local,
            log_level: default_log_level(),
            work_dir: default_work_dir(),
            file_directory: default_file_directory(),
            block_size_kb: DEFAULT_BLOCK_SIZE_KB,
            default_store: StoreKind::Memory,
            max_schedule_attempt: DEFAULT_MAX_SCHEDULE_ATTEMPT,
            network_bind_ip: default_bind_ip(),
        }
    }

    pub fn to_properties(&self) -> Properties {
        let mut properties = Properties::new();
        properties.set_block_size_kb(self.block_size_kb);
        properties.set_file_directory(PathBuf::from(self.file_directory.as_str()));
        properties.set_max_schedule_attempt(self.max_schedule_attempt);
        properties.set_default_store(self.default_store);
        properties
    }

    /// Per-worker view: every worker keeps its files in its own sub directory.
    pub fn worker_config(&self, worker_id: WorkerId) -> WorkerConfig {
        let file_directory = PathBuf::from(self.file_directory.as_str()).join(worker_id.0.as_str());
        WorkerConfig {
            worker_id,
            file_directory,
            block_size: self.block_size_kb as usize * 1000,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkerConfig {
    pub worker_id: WorkerId,
    pub file_directory: PathBuf,
    /// flush threshold in bytes
    pub block_size: usize,
}

impl WorkerConfig {
    pub fn new(worker_id: WorkerId, file_directory: PathBuf) -> Self {
        WorkerConfig {
            worker_id,
            file_directory,
            block_size: DEFAULT_BLOCK_SIZE_KB as usize * 1000,
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }
}

pub fn load_config(path: PathBuf) -> anyhow::Result<RuntimeConfig> {
    let context = read_config_from_path(&path)
        .with_context(|| format!("read runtime config {:?} error", path))?;
    serde_yaml::from_str(&context).with_context(|| format!("parse runtime config {:?} error", path))
}

pub fn read_config_from_path(path: &PathBuf) -> Result<String, std::io::Error> {
    let mut file = File::open(path)?;
    let mut buffer = String::new();
    file.read_to_string(&mut buffer)?;
    Ok(buffer)
}
