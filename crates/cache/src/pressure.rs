//! Memory pressure levels
//!
//! Pressure is the environment's way of asking the cache to give memory back
//! before the capacity budget forces it. Hosts translate whatever signal their
//! platform offers into a [`MemoryPressure`] and pass it to
//! [`LruCache::relieve_pressure`](crate::LruCache::relieve_pressure).

/// How urgently the host wants memory back
///
/// Ordered from least to most urgent. Only `High` and `Critical` make
/// [`LruCache::relieve_pressure`](crate::LruCache::relieve_pressure) release
/// tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemoryPressure {
    /// Plenty of headroom; resident tiles are kept
    Low,
    /// Headroom is shrinking; still no action
    Moderate,
    /// Shrink to the configured target utilization, coldest tiles first
    High,
    /// Release every resident tile; slots stay and regenerate on demand
    Critical,
}

impl MemoryPressure {
    /// Classify a fill ratio of some memory pool
    ///
    /// Below 0.5 is `Low`, below 0.75 `Moderate`, below 0.9 `High`, anything
    /// else `Critical`. Hosts typically feed this the process or device
    /// memory ratio they observe.
    pub fn from_utilization(utilization: f64) -> Self {
        match utilization {
            u if u < 0.5 => MemoryPressure::Low,
            u if u < 0.75 => MemoryPressure::Moderate,
            u if u < 0.9 => MemoryPressure::High,
            _ => MemoryPressure::Critical,
        }
    }

    /// Whether this level makes the cache release tiles
    pub fn needs_eviction(&self) -> bool {
        *self >= MemoryPressure::High
    }
}
