mod config;
#[allow(clippy::module_inception)]
mod pool;
#[cfg(test)]
mod tests;

pub use config::*;
pub use pool::*;
