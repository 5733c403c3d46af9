#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

#[macro_use]
mod macros;

pub mod api;
pub mod dag;
pub mod io;
pub mod message;
pub mod runtime;
pub mod storage;
pub mod utils;
