//! Keyed counter store capability and implementations.

mod backend;
mod memory;
mod pattern;

pub use backend::{
    CounterStore, ExpiryPolicy, MessageStream, StoreError, StoreMessage, StoreResult,
};
pub use memory::MemoryStore;
pub use pattern::key_matches;
