//! docqa-vector
//!
//! Dense retrieval over a [`VectorStore`](docqa_core::traits::VectorStore).
//! [`VectorIndex`] wraps a store with connection retries, collection setup and
//! embedding; stores decide where points live:
//!
//! - [`MemoryStore`]: brute-force cosine in process, optionally snapshotted to JSON
//! - `LanceStore` (feature `lance`): a LanceDB table on local disk
pub mod adapter;
pub mod memory;

#[cfg(feature = "lance")]
pub mod lance;
#[cfg(feature = "lance")]
pub mod schema;

pub use adapter::VectorIndex;
pub use memory::MemoryStore;

#[cfg(feature = "lance")]
pub use lance::LanceStore;
