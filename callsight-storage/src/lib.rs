//! Callsight Storage - Store Trait, Entity Locks and In-Memory Store
//!
//! Defines the storage abstraction behind the insight pipeline and the
//! read models. The Postgres implementation lives in callsight-api.

pub mod locks;
pub mod memory;
pub mod store;

pub use locks::{EntityGuard, EntityLocks};
pub use memory::InMemoryStore;
pub use store::{CallTotals, InsightMutator, InsightStore};
