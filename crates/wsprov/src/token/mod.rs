mod registry;
#[allow(clippy::module_inception)]
mod token;

pub use registry::*;
pub use token::*;
