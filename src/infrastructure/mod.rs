//! Storage and signature-provider adapters.

pub mod esign;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
