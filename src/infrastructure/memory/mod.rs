//! Memory guard infrastructure

mod guard;
mod probe;

pub use guard::MemoryGuardedExecutor;
pub use probe::{MemoryProbe, MemorySnapshot, ProcessMemoryProbe};
