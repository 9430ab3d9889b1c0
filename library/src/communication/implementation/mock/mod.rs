//! In-process implementations for tests and local experiments

mod factory;
mod queue;

pub use factory::*;
pub use queue::*;
