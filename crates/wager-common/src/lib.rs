//! Shared types and storage for the wager bot.
//!
//! This crate contains:
//! - Common types (Side, ChannelRef, MessageRef)
//! - Namespaced key-value store with memory and file backends

pub mod store;
pub mod types;

pub use store::{Collection, FileBackend, KvBackend, MemoryBackend, StoreError};
pub use types::*;
