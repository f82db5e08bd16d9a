//! Mix Core
//!
//! Stateful half of the shielded pool: the commitment tree bookkeeper, the
//! versioned key registry, the spend-tag set, and the operation processing
//! the host executor calls into.
//!
//! ```text
//! host executor ──OperationRecord──▶ ShieldedPool ──▶ ProofVerifier (external)
//!                                         │
//!                      ┌──────────────────┼──────────────────┐
//!                      ▼                  ▼                  ▼
//!                 CommitTree         KeyRegistry        spend tags
//!                      └──────────── PoolStore ─────────────┘
//!                              (MemoryStore | RocksDbStore)
//! ```

pub mod error;
pub mod pool;
pub mod registry;
pub mod storage;
pub mod tree;

pub use error::PoolError;
pub use pool::{
    Action, OperationRecord, Outcome, ProofEnvelope, ProofVerifier, Receipt, ShieldedPool,
};
pub use registry::{KeyBlob, KeyKind, KeyRegistry};
pub use storage::{DbBatch, LeafLog, LeafRecord, MemoryStore, PoolStore, RocksDbStore, SpendTag};
pub use tree::CommitTree;

#[cfg(test)]
mod tests;
