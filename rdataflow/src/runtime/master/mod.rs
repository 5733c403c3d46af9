pub mod block_manager_master;
pub mod job_state_manager;

pub use block_manager_master::{BlockManagerMaster, PartitionLocation, PartitionState};
pub use job_state_manager::JobStateManager;
