//! LRU recency ordering with a capacity budget
//!
//! Tracks [`CacheSlot`]s from most recently used (MRU) to least recently used
//! (LRU) and evicts from the LRU end whenever an insertion pushes the cache
//! over its budget. Eviction clears the slot's payload and its tracking
//! position; the slot itself stays with its grid.
//!
//! The ordering is an arena-backed doubly-linked list indexed by position, so
//! insert, promote and evict are all O(1). Slots remember their own position,
//! which is how a grid tells a first insertion from a refresh.

use std::sync::{Arc, Mutex};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tilestore_render::{Tile, TileCoord};

use crate::config::CacheConfig;
use crate::pressure::MemoryPressure;
use crate::slot::CacheSlot;
use crate::sync::lock;

/// Null link in the arena list
const NIL: usize = usize::MAX;

const BYTES_PER_MB: usize = 1024 * 1024;

/// Capacity budget of an [`LruCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBudget {
    /// Maximum number of resident tiles
    Tiles(usize),
    /// Maximum total payload size in bytes
    Bytes(usize),
}

impl CacheBudget {
    /// Byte budget expressed in megabytes, saturating at `usize::MAX` bytes
    pub fn from_mb(megabytes: usize) -> Self {
        CacheBudget::Bytes(megabytes.saturating_mul(BYTES_PER_MB))
    }

    /// Byte budget expressed in megabytes, or `None` if it overflows `usize`
    pub fn checked_from_mb(megabytes: usize) -> Option<Self> {
        megabytes.checked_mul(BYTES_PER_MB).map(CacheBudget::Bytes)
    }

    /// The numeric limit, in tiles or bytes
    pub fn limit(&self) -> usize {
        match *self {
            CacheBudget::Tiles(limit) | CacheBudget::Bytes(limit) => limit,
        }
    }

    /// Weight an entry of `bytes` payload bytes counts against this budget
    fn weight_of(&self, bytes: usize) -> usize {
        match self {
            CacheBudget::Tiles(_) => 1,
            CacheBudget::Bytes(_) => bytes,
        }
    }
}

impl Default for CacheBudget {
    /// 256MB byte budget
    fn default() -> Self {
        CacheBudget::from_mb(256)
    }
}

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LruStats {
    /// Number of slots currently tracked
    pub tracked: usize,

    /// Weight currently charged against the budget (tiles or bytes)
    pub used: usize,

    /// Budget limit (tiles or bytes)
    pub limit: usize,

    /// Slots newly added to the ordering
    pub insertions: u64,

    /// Refreshes of already-tracked slots
    pub promotions: u64,

    /// Slots dropped to stay within budget
    pub evictions: u64,

    /// Slots dropped on request of the environment (reclaim or memory pressure)
    pub reclaims: u64,
}

impl LruStats {
    /// Budget utilization (0.0 to 1.0, may exceed 1.0 only transiently)
    pub fn utilization(&self) -> f64 {
        if self.limit == 0 {
            0.0
        } else {
            self.used as f64 / self.limit as f64
        }
    }
}

/// Why a slot leaves the ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Release {
    Evicted,
    Reclaimed,
    Dropped,
}

struct Node {
    slot: Option<Arc<CacheSlot>>,
    weight: usize,
    prev: usize,
    next: usize,
}

/// Internal cache state
struct LruState {
    budget: CacheBudget,
    target_utilization: f64,

    /// Arena of list nodes; vacant entries are listed in `free`
    nodes: Vec<Node>,
    free: Vec<usize>,

    /// Most recently used
    head: usize,

    /// Least recently used
    tail: usize,

    len: usize,
    used: usize,
    stats: LruStats,
}

impl LruState {
    fn new(budget: CacheBudget, target_utilization: f64) -> Self {
        Self {
            budget,
            target_utilization,
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            len: 0,
            used: 0,
            stats: LruStats {
                limit: budget.limit(),
                ..Default::default()
            },
        }
    }

    /// Arena index of a tracked slot, verified against the arena
    fn position_of(&self, slot: &CacheSlot) -> Option<usize> {
        let index = slot.tracking_position()?;
        match self.nodes.get(index).and_then(|node| node.slot.as_ref()) {
            Some(tracked) if std::ptr::eq(Arc::as_ptr(tracked), slot) => Some(index),
            _ => unreachable!(
                "slot {} claims position {} which it does not occupy",
                slot.coord(),
                index
            ),
        }
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = (self.nodes[index].prev, self.nodes[index].next);

        if prev == NIL {
            self.head = next;
        } else {
            self.nodes[prev].next = next;
        }

        if next == NIL {
            self.tail = prev;
        } else {
            self.nodes[next].prev = prev;
        }

        self.nodes[index].prev = NIL;
        self.nodes[index].next = NIL;
    }

    fn link_front(&mut self, index: usize) {
        self.nodes[index].prev = NIL;
        self.nodes[index].next = self.head;

        if self.head == NIL {
            self.tail = index;
        } else {
            self.nodes[self.head].prev = index;
        }

        self.head = index;
    }

    /// Add a slot at the MRU end
    fn push_front(&mut self, slot: &Arc<CacheSlot>, weight: usize) {
        let node = Node {
            slot: Some(Arc::clone(slot)),
            weight,
            prev: NIL,
            next: NIL,
        };

        let index = match self.free.pop() {
            Some(index) => {
                self.nodes[index] = node;
                index
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };

        self.link_front(index);
        slot.set_tracking_position(Some(index));
        self.len += 1;
        self.used += weight;
    }

    /// Move a tracked entry to the MRU end and re-weigh it
    fn move_to_front(&mut self, index: usize, weight: usize) {
        if self.head != index {
            self.unlink(index);
            self.link_front(index);
        }

        let old = std::mem::replace(&mut self.nodes[index].weight, weight);
        self.used = self.used - old + weight;
    }

    /// Remove an entry from the ordering and clear its payload
    fn release(&mut self, index: usize, why: Release) -> Option<Arc<Tile>> {
        self.unlink(index);

        let node = &mut self.nodes[index];
        let slot = match node.slot.take() {
            Some(slot) => slot,
            None => unreachable!("released vacant LRU node {}", index),
        };
        self.used -= node.weight;
        node.weight = 0;
        self.len -= 1;
        self.free.push(index);

        slot.set_tracking_position(None);
        let payload = slot.clear_payload();

        match why {
            Release::Evicted => self.stats.evictions += 1,
            Release::Reclaimed => self.stats.reclaims += 1,
            Release::Dropped => {}
        }

        payload
    }

    /// Drop entries from the LRU end until at most `limit` is used
    ///
    /// Payloads are collected into `released` so they are freed after the
    /// lock is dropped.
    fn shrink_to(&mut self, limit: usize, why: Release, released: &mut Vec<Arc<Tile>>) -> usize {
        let mut count = 0;
        while self.used > limit && self.tail != NIL {
            released.extend(self.release(self.tail, why));
            count += 1;
        }
        count
    }

    fn sync_stats(&mut self) {
        self.stats.tracked = self.len;
        self.stats.used = self.used;
        self.stats.limit = self.budget.limit();
    }
}

/// Recency-ordered collection of cache slots with a capacity budget
///
/// Thread-safe and shareable: several grids may hand their slots to the same
/// cache, in which case the budget is global across all of them.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tilestore_cache::{CacheSlot, LruCache};
/// use tilestore_render::{Tile, TileCoord};
///
/// let cache = LruCache::with_tile_limit(1);
///
/// let a = Arc::new(CacheSlot::new(TileCoord::new(0, 0)));
/// a.set_payload(Arc::new(Tile::filled(1, 1, [0; 4])));
/// cache.insert_or_promote(&a);
///
/// let b = Arc::new(CacheSlot::new(TileCoord::new(1, 0)));
/// b.set_payload(Arc::new(Tile::filled(1, 1, [0; 4])));
/// cache.insert_or_promote(&b); // evicts `a`
///
/// assert!(!a.is_resident());
/// assert!(b.is_resident());
/// assert_eq!(cache.len(), 1);
/// ```
pub struct LruCache {
    state: Mutex<LruState>,
}

impl LruCache {
    /// Default share of the budget kept after a memory pressure response
    pub const DEFAULT_TARGET_UTILIZATION: f64 = 0.80;

    /// Create a cache with the given budget
    pub fn new(budget: CacheBudget) -> Self {
        Self::with_target_utilization(budget, Self::DEFAULT_TARGET_UTILIZATION)
    }

    fn with_target_utilization(budget: CacheBudget, target_utilization: f64) -> Self {
        Self {
            state: Mutex::new(LruState::new(
                budget,
                target_utilization.clamp(0.0, 1.0),
            )),
        }
    }

    /// Create a cache holding at most `tiles` resident tiles
    pub fn with_tile_limit(tiles: usize) -> Self {
        Self::new(CacheBudget::Tiles(tiles))
    }

    /// Create a cache holding at most `megabytes` of payload
    pub fn with_mb_limit(megabytes: usize) -> Self {
        Self::new(CacheBudget::from_mb(megabytes))
    }

    /// Create a cache from configuration
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::with_target_utilization(config.budget, config.target_utilization)
    }

    /// Place a slot at the MRU end
    ///
    /// An untracked slot is added and charged against the budget; a tracked
    /// slot is moved to the front and re-weighed from its current payload.
    /// Either way the coldest entries are then evicted until the cache is
    /// within budget, which may include `slot` itself if its payload alone
    /// exceeds a byte budget.
    ///
    /// A slot without a payload is left untracked. Returns whether `slot` is
    /// tracked when the call completes.
    ///
    /// # Panics
    ///
    /// A slot belongs to at most one cache. Panics if `slot` is currently
    /// tracked by a different `LruCache`.
    pub fn insert_or_promote(&self, slot: &Arc<CacheSlot>) -> bool {
        let mut released = Vec::new();
        let mut state = lock(&self.state);

        let Some(bytes) = slot.payload_bytes() else {
            return false;
        };
        let weight = state.budget.weight_of(bytes);

        match state.position_of(slot) {
            Some(index) => {
                state.move_to_front(index, weight);
                state.stats.promotions += 1;
            }
            None => {
                state.push_front(slot, weight);
                state.stats.insertions += 1;
            }
        }

        let limit = state.budget.limit();
        let evicted = state.shrink_to(limit, Release::Evicted, &mut released);
        state.sync_stats();

        let tracked = slot.tracking_position().is_some();
        drop(state);

        if evicted > 0 {
            debug!("evicted {} tile(s) to stay within {} budget", evicted, limit);
        }
        if !tracked {
            warn!(
                "tile {} does not fit in the cache budget of {}",
                slot.coord(),
                limit
            );
        }
        tracked
    }

    /// Move an already-tracked slot to the MRU end
    ///
    /// Pure touch: budget accounting is unchanged. Returns `false` if the
    /// slot is not tracked.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is tracked by a different `LruCache`.
    pub fn promote(&self, slot: &CacheSlot) -> bool {
        let mut state = lock(&self.state);
        match state.position_of(slot) {
            Some(index) => {
                let weight = state.nodes[index].weight;
                state.move_to_front(index, weight);
                state.stats.promotions += 1;
                true
            }
            None => false,
        }
    }

    /// Clear one slot on request of the environment
    ///
    /// Returns whether the slot held a payload.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is tracked by a different `LruCache`.
    pub fn reclaim(&self, slot: &CacheSlot) -> bool {
        let mut state = lock(&self.state);
        let payload = match state.position_of(slot) {
            Some(index) => {
                let payload = state.release(index, Release::Reclaimed);
                state.sync_stats();
                payload
            }
            // Resident but not yet inserted; nothing to untrack.
            None => slot.clear_payload(),
        };
        drop(state);

        payload.is_some()
    }

    /// Untrack a slot whose grid is going away
    pub(crate) fn forget(&self, slot: &CacheSlot) {
        let mut state = lock(&self.state);
        if let Some(index) = state.position_of(slot) {
            let payload = state.release(index, Release::Dropped);
            state.sync_stats();
            drop(state);
            drop(payload);
        }
    }

    /// Give memory back in response to an external pressure signal
    ///
    /// `High` shrinks the cache to its target utilization, `Critical` empties
    /// it. Lower levels are ignored. Returns the number of slots released.
    ///
    /// `pressure` is the host's view of memory, not [`pressure`](Self::pressure):
    /// a warm cache sits at or near its budget and reports `Critical` from its
    /// own utilization, which would empty it on every call.
    pub fn relieve_pressure(&self, pressure: MemoryPressure) -> usize {
        if !pressure.needs_eviction() {
            return 0;
        }

        let mut released = Vec::new();
        let mut state = lock(&self.state);

        let limit = match pressure {
            MemoryPressure::Critical => 0,
            _ => (state.budget.limit() as f64 * state.target_utilization) as usize,
        };
        let count = state.shrink_to(limit, Release::Reclaimed, &mut released);
        state.sync_stats();
        drop(state);

        if count > 0 {
            debug!("released {} tile(s) under {:?} memory pressure", count, pressure);
        }
        count
    }

    /// Replace the budget
    ///
    /// If the new budget is smaller than current usage, the coldest slots
    /// are evicted immediately.
    pub fn set_budget(&self, budget: CacheBudget) {
        let mut released = Vec::new();
        let mut state = lock(&self.state);

        state.budget = budget;
        // Weights depend on the budget kind; recompute them before shrinking.
        let mut used = 0;
        let mut index = state.head;
        while index != NIL {
            let weight = match state.nodes[index].slot.as_ref() {
                Some(slot) => budget.weight_of(slot.payload_bytes().unwrap_or(0)),
                None => unreachable!("linked LRU node {} is vacant", index),
            };
            state.nodes[index].weight = weight;
            used += weight;
            index = state.nodes[index].next;
        }
        state.used = used;

        let count = state.shrink_to(budget.limit(), Release::Evicted, &mut released);
        state.sync_stats();
        drop(state);

        if count > 0 {
            debug!("evicted {} tile(s) after budget change to {:?}", count, budget);
        }
    }

    /// Untrack every slot and clear its payload
    pub fn flush(&self) {
        let mut released = Vec::new();
        let mut state = lock(&self.state);

        while state.tail != NIL {
            let tail = state.tail;
            released.extend(state.release(tail, Release::Dropped));
        }
        state.sync_stats();
    }

    /// Coordinates of tracked slots, most recently used first
    pub fn recency_order(&self) -> Vec<TileCoord> {
        let state = lock(&self.state);
        let mut order = Vec::with_capacity(state.len);
        let mut index = state.head;
        while index != NIL {
            if let Some(slot) = state.nodes[index].slot.as_ref() {
                order.push(slot.coord());
            }
            index = state.nodes[index].next;
        }
        order
    }

    /// Current budget
    pub fn budget(&self) -> CacheBudget {
        lock(&self.state).budget
    }

    /// Number of tracked slots
    pub fn len(&self) -> usize {
        lock(&self.state).len
    }

    /// Whether no slot is tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Weight currently charged against the budget
    pub fn used(&self) -> usize {
        lock(&self.state).used
    }

    /// Get current cache statistics
    pub fn stats(&self) -> LruStats {
        lock(&self.state).stats
    }

    /// Budget utilization (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        self.stats().utilization()
    }

    /// Pressure level implied by the cache's own utilization
    ///
    /// A diagnostic for how full the budget is. A cache that has reached its
    /// budget reports `Critical` here even though it is healthy, so this is
    /// not an input for [`relieve_pressure`](Self::relieve_pressure).
    pub fn pressure(&self) -> MemoryPressure {
        MemoryPressure::from_utilization(self.utilization())
    }
}

impl Default for LruCache {
    /// Create a cache with a default 256MB budget
    fn default() -> Self {
        Self::new(CacheBudget::default())
    }
}

impl std::fmt::Debug for LruCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("LruCache")
            .field("budget", &state.budget)
            .field("len", &state.len)
            .field("used", &state.used)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resident_slot(col: i32, bytes: usize) -> Arc<CacheSlot> {
        let slot = Arc::new(CacheSlot::new(TileCoord::new(col, 0)));
        slot.set_payload(Arc::new(Tile::new(vec![0u8; bytes], 1, 1)));
        slot
    }

    fn coords(cols: &[i32]) -> Vec<TileCoord> {
        cols.iter().map(|&col| TileCoord::new(col, 0)).collect()
    }

    #[test]
    fn test_insert_tracks_slot() {
        let cache = LruCache::with_tile_limit(4);
        let slot = resident_slot(0, 16);

        assert!(cache.insert_or_promote(&slot));
        assert!(slot.tracking_position().is_some());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.used(), 1);
        assert_eq!(cache.stats().insertions, 1);
    }

    #[test]
    fn test_empty_slot_is_not_tracked() {
        let cache = LruCache::with_tile_limit(4);
        let slot = Arc::new(CacheSlot::new(TileCoord::new(0, 0)));

        assert!(!cache.insert_or_promote(&slot));
        assert!(cache.is_empty());
        assert!(slot.tracking_position().is_none());
    }

    #[test]
    fn test_lru_eviction() {
        let cache = LruCache::with_tile_limit(2);
        let a = resident_slot(0, 16);
        let b = resident_slot(1, 16);
        let c = resident_slot(2, 16);

        cache.insert_or_promote(&a);
        cache.insert_or_promote(&b);
        cache.insert_or_promote(&c);

        assert!(!a.is_resident());
        assert!(a.tracking_position().is_none());
        assert!(b.is_resident());
        assert!(c.is_resident());
        assert_eq!(cache.recency_order(), coords(&[2, 1]));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_promote_changes_eviction_order() {
        let cache = LruCache::with_tile_limit(2);
        let a = resident_slot(0, 16);
        let b = resident_slot(1, 16);
        let c = resident_slot(2, 16);

        cache.insert_or_promote(&a);
        cache.insert_or_promote(&b);
        assert!(cache.promote(&a));
        cache.insert_or_promote(&c);

        assert!(a.is_resident());
        assert!(!b.is_resident());
        assert_eq!(cache.recency_order(), coords(&[2, 0]));
    }

    #[test]
    fn test_promote_untracked_is_noop() {
        let cache = LruCache::with_tile_limit(2);
        let a = resident_slot(0, 16);

        assert!(!cache.promote(&a));
        assert!(cache.is_empty());
        assert_eq!(cache.stats().promotions, 0);
    }

    #[test]
    fn test_reinsert_does_not_double_count() {
        let cache = LruCache::with_tile_limit(8);
        let a = resident_slot(0, 16);

        for _ in 0..5 {
            cache.insert_or_promote(&a);
        }

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.used(), 1);
        let stats = cache.stats();
        assert_eq!(stats.insertions, 1);
        assert_eq!(stats.promotions, 4);
    }

    #[test]
    fn test_untouched_entries_leave_in_insertion_order() {
        let cache = LruCache::with_tile_limit(3);
        let slots: Vec<_> = (0..6).map(|col| resident_slot(col, 1)).collect();

        for (i, slot) in slots.iter().enumerate() {
            cache.insert_or_promote(slot);
            if i >= 3 {
                assert!(!slots[i - 3].is_resident(), "slot {} should be gone", i - 3);
            }
        }
        assert_eq!(cache.recency_order(), coords(&[5, 4, 3]));
    }

    #[test]
    fn test_byte_budget_never_exceeded() {
        let cache = LruCache::new(CacheBudget::Bytes(100));
        let slots: Vec<_> = (0..10).map(|col| resident_slot(col, 30)).collect();

        for slot in &slots {
            cache.insert_or_promote(slot);
            assert!(cache.used() <= 100);
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.used(), 90);
    }

    #[test]
    fn test_oversized_entry_is_evicted_immediately() {
        let cache = LruCache::new(CacheBudget::Bytes(100));
        let small = resident_slot(0, 10);
        let huge = resident_slot(1, 500);

        cache.insert_or_promote(&small);
        assert!(!cache.insert_or_promote(&huge));

        assert!(!huge.is_resident());
        assert!(!small.is_resident());
        assert!(cache.is_empty());
        assert_eq!(cache.used(), 0);
    }

    #[test]
    fn test_refresh_reweighs_replaced_payload() {
        let cache = LruCache::new(CacheBudget::Bytes(100));
        let a = resident_slot(0, 40);
        let b = resident_slot(1, 40);

        cache.insert_or_promote(&a);
        cache.insert_or_promote(&b);
        assert_eq!(cache.used(), 80);

        // Grow b's payload; a is now the coldest and must go.
        b.set_payload(Arc::new(Tile::new(vec![0u8; 70], 1, 1)));
        assert!(cache.insert_or_promote(&b));

        assert!(!a.is_resident());
        assert_eq!(cache.used(), 70);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_budget_tracks_nothing() {
        let cache = LruCache::with_tile_limit(0);
        let a = resident_slot(0, 1);

        assert!(!cache.insert_or_promote(&a));
        assert!(!a.is_resident());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reclaim() {
        let cache = LruCache::with_tile_limit(4);
        let a = resident_slot(0, 1);
        let b = resident_slot(1, 1);
        cache.insert_or_promote(&a);
        cache.insert_or_promote(&b);

        assert!(cache.reclaim(&a));
        assert!(!a.is_resident());
        assert!(a.tracking_position().is_none());
        assert_eq!(cache.recency_order(), coords(&[1]));

        assert!(!cache.reclaim(&a));
        let stats = cache.stats();
        assert_eq!(stats.reclaims, 1);
        assert_eq!(stats.evictions, 0);
    }

    #[test]
    fn test_reclaim_untracked_resident_slot() {
        let cache = LruCache::with_tile_limit(4);
        let a = resident_slot(0, 1);

        assert!(cache.reclaim(&a));
        assert!(!a.is_resident());
    }

    #[test]
    fn test_arena_reuses_released_positions() {
        let cache = LruCache::with_tile_limit(1);
        let a = resident_slot(0, 1);
        let b = resident_slot(1, 1);

        for _ in 0..100 {
            a.set_payload(Arc::new(Tile::new(vec![0u8; 1], 1, 1)));
            cache.insert_or_promote(&a);
            b.set_payload(Arc::new(Tile::new(vec![0u8; 1], 1, 1)));
            cache.insert_or_promote(&b);
        }

        assert_eq!(cache.len(), 1);
        assert!(lock(&cache.state).nodes.len() <= 2);
    }

    #[test]
    fn test_relieve_pressure() {
        let cache = LruCache::with_tile_limit(10);
        let slots: Vec<_> = (0..10).map(|col| resident_slot(col, 1)).collect();
        for slot in &slots {
            cache.insert_or_promote(slot);
        }

        assert_eq!(cache.relieve_pressure(MemoryPressure::Low), 0);
        assert_eq!(cache.relieve_pressure(MemoryPressure::Moderate), 0);

        // 80% target of 10 tiles leaves 8, dropping the two coldest.
        assert_eq!(cache.relieve_pressure(MemoryPressure::High), 2);
        assert!(!slots[0].is_resident());
        assert!(!slots[1].is_resident());
        assert!(slots[2].is_resident());

        assert_eq!(cache.relieve_pressure(MemoryPressure::Critical), 8);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().reclaims, 10);
    }

    #[test]
    fn test_set_budget_evicts() {
        let cache = LruCache::with_tile_limit(5);
        let slots: Vec<_> = (0..5).map(|col| resident_slot(col, 10)).collect();
        for slot in &slots {
            cache.insert_or_promote(slot);
        }

        cache.set_budget(CacheBudget::Tiles(2));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.recency_order(), coords(&[4, 3]));

        cache.set_budget(CacheBudget::Bytes(10));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.used(), 10);
        assert_eq!(cache.budget(), CacheBudget::Bytes(10));
    }

    #[test]
    fn test_flush() {
        let cache = LruCache::with_tile_limit(5);
        let slots: Vec<_> = (0..3).map(|col| resident_slot(col, 1)).collect();
        for slot in &slots {
            cache.insert_or_promote(slot);
        }

        cache.flush();

        assert!(cache.is_empty());
        assert_eq!(cache.used(), 0);
        assert!(slots.iter().all(|slot| !slot.is_resident()));
        assert!(slots.iter().all(|slot| slot.tracking_position().is_none()));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_forget_keeps_payload_accounting_consistent() {
        let cache = LruCache::with_tile_limit(5);
        let a = resident_slot(0, 1);
        let b = resident_slot(1, 1);
        cache.insert_or_promote(&a);
        cache.insert_or_promote(&b);

        cache.forget(&a);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.used(), 1);
        assert!(a.tracking_position().is_none());
        assert_eq!(cache.recency_order(), coords(&[1]));
    }

    #[test]
    fn test_stats_and_pressure() {
        let cache = LruCache::with_tile_limit(4);
        assert_eq!(cache.pressure(), MemoryPressure::Low);

        let slots: Vec<_> = (0..4).map(|col| resident_slot(col, 1)).collect();
        for slot in &slots {
            cache.insert_or_promote(slot);
        }

        let stats = cache.stats();
        assert_eq!(stats.tracked, 4);
        assert_eq!(stats.used, 4);
        assert_eq!(stats.limit, 4);
        assert!((stats.utilization() - 1.0).abs() < f64::EPSILON);
        assert_eq!(cache.pressure(), MemoryPressure::Critical);
    }

    #[test]
    fn test_warm_cache_reports_critical_without_evicting() {
        let cache = LruCache::with_tile_limit(2);
        let slots = [resident_slot(0, 1), resident_slot(1, 1)];
        for slot in &slots {
            cache.insert_or_promote(slot);
        }

        assert_eq!(cache.pressure(), MemoryPressure::Critical);
        assert_eq!(cache.len(), 2);
        assert!(slots.iter().all(|slot| slot.is_resident()));
    }

    #[test]
    #[should_panic(expected = "does not occupy")]
    fn test_slot_tracked_by_another_cache_panics() {
        let first = LruCache::with_tile_limit(2);
        let second = LruCache::with_tile_limit(2);
        let slot = resident_slot(0, 1);

        first.insert_or_promote(&slot);
        second.insert_or_promote(&slot);
    }

    #[test]
    fn test_mb_budget_saturates() {
        assert_eq!(CacheBudget::from_mb(2), CacheBudget::Bytes(2 * 1024 * 1024));
        assert_eq!(CacheBudget::from_mb(usize::MAX), CacheBudget::Bytes(usize::MAX));
        assert_eq!(CacheBudget::checked_from_mb(usize::MAX), None);
        assert_eq!(
            LruCache::with_mb_limit(usize::MAX).budget(),
            CacheBudget::Bytes(usize::MAX)
        );
    }

    #[test]
    fn test_default_budget() {
        let cache = LruCache::default();
        assert_eq!(cache.budget(), CacheBudget::Bytes(256 * 1024 * 1024));
    }

    #[test]
    fn test_budget_serde_shape() {
        let json = serde_json::to_string(&CacheBudget::Tiles(12)).unwrap();
        assert_eq!(json, r#"{"tiles":12}"#);
        let parsed: CacheBudget = serde_json::from_str(r#"{"bytes":4096}"#).unwrap();
        assert_eq!(parsed, CacheBudget::Bytes(4096));
    }
}
