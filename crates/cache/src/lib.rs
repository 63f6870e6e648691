//! Tilestore Cache Library
//!
//! Bounded-memory tile store: a lazily populated grid of tiles produced on
//! demand and retained under an LRU eviction policy.
//!
//! - [`TileGrid`] maps tile coordinates to [`CacheSlot`]s and runs the
//!   generator on a miss.
//! - [`LruCache`] orders slots by recency and evicts to stay within its
//!   [`CacheBudget`]; it may be shared by several grids.
//! - [`MemoryPressure`] lets the environment reclaim memory early.

mod sync;

pub mod config;
pub mod error;
pub mod grid;
pub mod lru;
pub mod metrics;
pub mod pressure;
pub mod slot;

pub use config::{CacheConfig, ConfigError};
pub use error::{TileError, TileResult};
pub use grid::{GridBounds, TileGrid, TileStore};
pub use lru::{CacheBudget, LruCache, LruStats};
pub use metrics::{AtomicGridMetrics, GridMetrics, GridStats, NoopMetrics};
pub use pressure::MemoryPressure;
pub use slot::CacheSlot;
