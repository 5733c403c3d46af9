pub mod fs;
pub mod hash;
pub mod thread;
