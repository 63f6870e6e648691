//! Per-coordinate cache slots
//!
//! A slot is created the first time a grid coordinate is touched and lives as
//! long as the grid. Its payload comes and goes: the LRU cache clears it on
//! eviction, and an external reclaim signal may clear it at any time.
//!
//! ```text
//! Empty --set_payload--> Resident + tracked --evict / reclaim--> Empty + untracked
//!   ^                                                                 |
//!   +-----------------------------------------------------------------+
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tilestore_render::{Tile, TileCoord};

use crate::sync::lock;

const NOT_TRACKED: usize = usize::MAX;

/// Persistent tracking node for one grid coordinate
///
/// The payload is a reclaimable reference: it may be cleared by the cache
/// without affecting the slot itself. The tracking position is the slot's
/// index in the owning [`LruCache`](crate::LruCache) ordering and is only
/// written while that cache's lock is held.
#[derive(Debug)]
pub struct CacheSlot {
    coord: TileCoord,
    payload: Mutex<Option<Arc<Tile>>>,
    position: AtomicUsize,
    gate: Mutex<()>,
}

impl CacheSlot {
    /// Create an empty, untracked slot for an absolute coordinate
    pub fn new(coord: TileCoord) -> Self {
        Self {
            coord,
            payload: Mutex::new(None),
            position: AtomicUsize::new(NOT_TRACKED),
            gate: Mutex::new(()),
        }
    }

    /// Absolute coordinate this slot belongs to
    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    /// Store or replace the payload
    ///
    /// Does not touch recency tracking; callers follow up with
    /// [`LruCache::insert_or_promote`](crate::LruCache::insert_or_promote).
    pub fn set_payload(&self, tile: Arc<Tile>) {
        *lock(&self.payload) = Some(tile);
    }

    /// Current payload, if any, without altering recency
    pub fn try_get_payload(&self) -> Option<Arc<Tile>> {
        lock(&self.payload).clone()
    }

    /// Whether the slot currently holds a payload
    pub fn is_resident(&self) -> bool {
        lock(&self.payload).is_some()
    }

    /// Position in the LRU ordering, or `None` when untracked
    pub fn tracking_position(&self) -> Option<usize> {
        match self.position.load(Ordering::Acquire) {
            NOT_TRACKED => None,
            index => Some(index),
        }
    }

    pub(crate) fn set_tracking_position(&self, position: Option<usize>) {
        self.position
            .store(position.unwrap_or(NOT_TRACKED), Ordering::Release);
    }

    /// Drop the payload and hand it back so it can be freed outside any lock
    pub(crate) fn clear_payload(&self) -> Option<Arc<Tile>> {
        lock(&self.payload).take()
    }

    /// Size of the current payload in bytes
    pub(crate) fn payload_bytes(&self) -> Option<usize> {
        lock(&self.payload).as_ref().map(|tile| tile.byte_size())
    }

    /// Serializes generation for this coordinate
    pub(crate) fn lock_gate(&self) -> MutexGuard<'_, ()> {
        lock(&self.gate)
    }
}
