//! Process-local, thread-safe implementations of the `credo-core`
//! repository traits.
//!
//! Backed by `RwLock`-guarded maps; suitable for tests, demos, and
//! single-process deployments. Nothing here survives a restart.

pub mod memory;

pub use memory::{
    MemoryAuditEventRepository, MemoryBlocklist, MemoryLoginAttemptRepository,
    MemorySessionRepository, MemoryUserRepository,
};
