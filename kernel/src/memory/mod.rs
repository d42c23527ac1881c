//! Memory services.
//!
//! Drivers never call the global allocator directly: everything goes
//! through a tagged [`Pool`] so allocations are attributed and accounted.

pub mod pool;

pub use pool::{Pool, PoolBuffer, PoolFlags, PoolStats, PoolTag, NON_PAGED_POOL, WDMKIT_POOL_TAG};
