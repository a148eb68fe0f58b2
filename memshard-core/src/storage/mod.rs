//! Storage modules for Memshard
//!
//! Provides the in-memory chunk repository that backs a storage node.

pub mod node_store;

pub use node_store::{NodeStore, STORAGE_TYPE_MEMORY, StoreInfo};
