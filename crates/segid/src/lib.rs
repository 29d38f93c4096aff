#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod buffer;
mod config;
mod error;
mod mutex;
mod registry;
mod segment;
mod spawn;
mod store;
#[cfg(test)]
mod testing;

pub use crate::buffer::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::registry::*;
pub use crate::segment::*;
pub use crate::spawn::*;
pub use crate::store::*;
