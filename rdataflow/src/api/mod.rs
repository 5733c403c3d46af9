pub mod attribute;
pub mod cluster;
pub mod coder;
pub mod element;
pub mod error;
pub mod properties;
pub mod runtime;
