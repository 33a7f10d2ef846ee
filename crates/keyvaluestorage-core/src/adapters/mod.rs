//! Backing store adapters.
//!
//! Each adapter implements [`AsyncStorage`](crate::AsyncStorage), the raw
//! string key-value primitive consumed by the async-storage and namespaced
//! backends.

mod atomic;
mod json_file;
mod memory;

pub use json_file::JsonFileAsyncStorage;
pub use memory::MemoryAsyncStorage;
