pub mod block_manager_worker;

pub use block_manager_worker::BlockManagerWorker;
