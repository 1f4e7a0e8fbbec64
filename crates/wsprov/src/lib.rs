#![doc = include_str!("../README.md")]
mod error;
mod pool;
mod provisioner;
mod rand;
mod record;
mod sync;
mod token;

pub use crate::error::*;
pub use crate::pool::*;
pub use crate::provisioner::*;
pub use crate::rand::*;
pub use crate::record::*;
pub use crate::token::*;
