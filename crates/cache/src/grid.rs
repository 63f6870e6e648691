//! Grid-indexed tile store
//!
//! A [`TileGrid`] maps absolute tile coordinates inside its bounds to
//! [`CacheSlot`]s, creating slots lazily the first time a coordinate is
//! touched. Missing tiles are produced by the grid's [`TileGenerator`] and
//! handed to a shared [`LruCache`], which decides how long they stay.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use tilestore_render::{Tile, TileCoord, TileGenerator};

use crate::error::{TileError, TileResult};
use crate::lru::LruCache;
use crate::metrics::{GridMetrics, NoopMetrics};
use crate::slot::CacheSlot;
use crate::sync::lock;

/// Rectangular region of tile space covered by a grid
///
/// Covers columns `min_col..min_col + width` and rows `min_row..min_row + height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridBounds {
    pub min_col: i32,
    pub min_row: i32,
    pub width: u32,
    pub height: u32,
}

impl GridBounds {
    pub fn new(min_col: i32, min_row: i32, width: u32, height: u32) -> Self {
        Self {
            min_col,
            min_row,
            width,
            height,
        }
    }

    /// Whether `(col, row)` lies inside the bounds
    pub fn contains(&self, col: i32, row: i32) -> bool {
        self.to_local(col, row).is_some()
    }

    /// Translate an absolute coordinate to a local `(col, row)` index
    pub fn to_local(&self, col: i32, row: i32) -> Option<(u32, u32)> {
        let local_col = col as i64 - self.min_col as i64;
        let local_row = row as i64 - self.min_row as i64;

        if local_col < 0 || local_col >= self.width as i64 {
            return None;
        }
        if local_row < 0 || local_row >= self.height as i64 {
            return None;
        }

        Some((local_col as u32, local_row as u32))
    }

    /// Number of cells covered
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }
}

/// Abstract tile storage addressed by absolute coordinates
///
/// Out-of-range coordinates are defined behavior for every operation: a
/// no-op, `false` and `Ok(None)` respectively.
pub trait TileStore {
    /// Store externally produced content
    fn set_tile(&self, col: i32, row: i32, tile: Arc<Tile>);

    /// Whether the tile is resident right now
    ///
    /// A point-in-time observation only: the tile may be evicted or
    /// reclaimed before any later call, including a `get_tile` for the same
    /// coordinate on the same thread.
    fn check_tile(&self, col: i32, row: i32) -> bool;

    /// Return the tile, generating it on a miss
    fn get_tile(&self, col: i32, row: i32) -> TileResult<Option<Arc<Tile>>>;
}

/// Lazily populated tile grid backed by an LRU cache
///
/// Only coordinates that have been touched cost memory: the slot index is a
/// hash map keyed by local coordinate, so huge extents are cheap.
///
/// Thread-safe. At most one generator call runs per coordinate at a time;
/// concurrent requests for the same coordinate wait for it and share its
/// result if the tile is still resident when they get their turn.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tilestore_cache::{GridBounds, LruCache, TileGrid};
/// use tilestore_render::CheckerboardGenerator;
///
/// let cache = Arc::new(LruCache::with_tile_limit(64));
/// let generator = Arc::new(CheckerboardGenerator::new().with_tile_size(16));
/// let grid = TileGrid::new(GridBounds::new(0, 0, 100, 100), generator, cache);
///
/// let tile = grid.get_tile(3, 4).unwrap().expect("inside bounds");
/// assert_eq!(tile.width(), 16);
/// assert!(grid.check_tile(3, 4));
///
/// // Outside the grid: absent, nothing generated
/// assert!(grid.get_tile(-1, 0).unwrap().is_none());
/// ```
pub struct TileGrid {
    bounds: GridBounds,
    slots: Mutex<HashMap<(u32, u32), Arc<CacheSlot>>>,
    generator: Arc<dyn TileGenerator>,
    cache: Arc<LruCache>,
    metrics: Arc<dyn GridMetrics>,
}

impl TileGrid {
    /// Create a grid over `bounds`
    ///
    /// The generator and cache are shared handles; a cache may back several
    /// grids, in which case its budget applies to all of them together.
    pub fn new(
        bounds: GridBounds,
        generator: Arc<dyn TileGenerator>,
        cache: Arc<LruCache>,
    ) -> Self {
        Self {
            bounds,
            slots: Mutex::new(HashMap::new()),
            generator,
            cache,
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Report request events to `metrics`
    pub fn with_metrics(mut self, metrics: Arc<dyn GridMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    pub fn cache(&self) -> &Arc<LruCache> {
        &self.cache
    }

    /// Number of coordinates that have a slot
    pub fn slot_count(&self) -> usize {
        lock(&self.slots).len()
    }

    /// Number of slots currently holding a tile
    pub fn resident_count(&self) -> usize {
        let slots: Vec<_> = lock(&self.slots).values().cloned().collect();
        slots.iter().filter(|slot| slot.is_resident()).count()
    }

    /// Existing slot for a local index
    fn slot(&self, local: (u32, u32)) -> Option<Arc<CacheSlot>> {
        lock(&self.slots).get(&local).cloned()
    }

    /// Existing slot for a local index, created on first use
    fn slot_or_insert(&self, local: (u32, u32), coord: TileCoord) -> Arc<CacheSlot> {
        let mut slots = lock(&self.slots);
        Arc::clone(
            slots
                .entry(local)
                .or_insert_with(|| Arc::new(CacheSlot::new(coord))),
        )
    }

    /// Store externally produced content
    ///
    /// Out-of-bounds coordinates are ignored. The first store into a slot
    /// inserts it into the cache; later stores promote it instead of adding
    /// a second entry.
    pub fn set_tile(&self, col: i32, row: i32, tile: impl Into<Arc<Tile>>) {
        let Some(local) = self.bounds.to_local(col, row) else {
            return;
        };

        let slot = self.slot_or_insert(local, TileCoord::new(col, row));
        let _gate = slot.lock_gate();

        slot.set_payload(tile.into());
        self.cache.insert_or_promote(&slot);

        trace!("stored tile ({}, {})", col, row);
    }

    /// Whether the tile at `(col, row)` is resident right now
    ///
    /// Never creates a slot, changes recency or generates. The answer is
    /// advisory: by the time a subsequent [`get_tile`](Self::get_tile) runs,
    /// the tile may have been evicted or reclaimed.
    pub fn check_tile(&self, col: i32, row: i32) -> bool {
        self.bounds
            .to_local(col, row)
            .and_then(|local| self.slot(local))
            .is_some_and(|slot| slot.is_resident())
    }

    /// Return the tile at `(col, row)`, generating it on a miss
    ///
    /// Returns `Ok(None)` for coordinates outside the grid. A hit promotes the
    /// tile to most recently used; a miss runs the generator exactly once and
    /// inserts the result.
    ///
    /// # Errors
    /// [`TileError::GenerationFailed`] if the generator fails. The slot stays
    /// empty; calling again retries.
    pub fn get_tile(&self, col: i32, row: i32) -> TileResult<Option<Arc<Tile>>> {
        let Some(local) = self.bounds.to_local(col, row) else {
            return Ok(None);
        };
        self.metrics.record_request();

        let coord = TileCoord::new(col, row);
        let slot = self.slot_or_insert(local, coord);

        if let Some(tile) = self.serve_resident(&slot) {
            return Ok(Some(tile));
        }

        let _gate = slot.lock_gate();

        // Another caller may have produced the tile while we waited.
        if let Some(tile) = self.serve_resident(&slot) {
            return Ok(Some(tile));
        }

        self.metrics.record_miss();
        debug!("generating tile {}", coord);

        let tile = match self.generator.generate(coord) {
            Ok(tile) => Arc::new(tile),
            Err(source) => {
                self.metrics.record_generation_failure();
                warn!("failed to generate tile {}: {}", coord, source);
                return Err(TileError::GenerationFailed { col, row, source });
            }
        };

        slot.set_payload(Arc::clone(&tile));
        self.cache.insert_or_promote(&slot);

        Ok(Some(tile))
    }

    /// Serve a hit from the slot's payload, if there is one
    fn serve_resident(&self, slot: &Arc<CacheSlot>) -> Option<Arc<Tile>> {
        let tile = slot.try_get_payload()?;
        self.metrics.record_hit();
        self.cache.insert_or_promote(slot);
        trace!("hit for tile {}", slot.coord());
        Some(tile)
    }

    /// Drop the tile at `(col, row)` on request of the environment
    ///
    /// The slot survives and the tile is regenerated on the next
    /// [`get_tile`](Self::get_tile). Returns whether a tile was resident.
    pub fn reclaim_tile(&self, col: i32, row: i32) -> bool {
        match self.bounds.to_local(col, row).and_then(|local| self.slot(local)) {
            Some(slot) => self.cache.reclaim(&slot),
            None => false,
        }
    }
}

impl TileStore for TileGrid {
    fn set_tile(&self, col: i32, row: i32, tile: Arc<Tile>) {
        TileGrid::set_tile(self, col, row, tile)
    }

    fn check_tile(&self, col: i32, row: i32) -> bool {
        TileGrid::check_tile(self, col, row)
    }

    fn get_tile(&self, col: i32, row: i32) -> TileResult<Option<Arc<Tile>>> {
        TileGrid::get_tile(self, col, row)
    }
}

impl Drop for TileGrid {
    fn drop(&mut self) {
        let slots = std::mem::take(
            self.slots
                .get_mut()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        );
        for slot in slots.values() {
            self.cache.forget(slot);
        }
    }
}

impl std::fmt::Debug for TileGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileGrid")
            .field("bounds", &self.bounds)
            .field("slots", &self.slot_count())
            .field("cache", &self.cache)
            .finish()
    }
}
