/*!
 * Profiler Types
 * Allocation records, pattern analysis and prediction outputs
 */

use crate::core::types::{Address, Size};
use crate::memory::types::Strategy;
use ahash::RandomState;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// One tracked allocation in the rolling history
#[derive(Debug, Clone)]
pub struct AllocationRecord {
    pub size: Size,
    pub address: Address,
    pub allocated_at: Instant,
    pub deallocated_at: Option<Instant>,
    pub active: bool,
    /// 0 for direct allocations, the owning pool id otherwise
    pub pool_id: u64,
}

/// A 4096-byte-aligned bucket of the address space with its allocation count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotSpot {
    pub region: u64,
    pub count: u64,
}

/// Derived view of the allocation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationPattern {
    /// Top sizes by observed frequency, descending
    pub common_sizes: Vec<Size>,
    /// Mean lifetime over all deallocated records, in milliseconds
    pub average_lifetime_ms: f64,
    /// Fraction of total observations per size
    pub size_distribution: BTreeMap<Size, f64>,
    /// Hottest address regions, by count descending
    pub hot_spots: Vec<HotSpot>,
}

/// Forecast for the next allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub next_likely_size: Size,
    pub recommended_strategy: Strategy,
    pub recommended_pool_sizes: Vec<Size>,
    /// Share of observations covered by the common sizes, in `[0, 1]`
    pub confidence: f64,
}

/// Aggregate performance metrics
///
/// `hit_rate` counts records that are active or carry a deallocation time,
/// so a pure success stream always reads 1.0 and `failed_allocations` 0;
/// failed attempts never enter the history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub fragmentation_ratio: f64,
    /// Mean delta between consecutive allocation timestamps, in microseconds
    pub average_allocation_time_us: f64,
    pub hit_rate: f64,
    pub failed_allocations: usize,
    pub strategy_efficiency: HashMap<Strategy, f64, RandomState>,
}

/// Suggested pool configuration derived from the size distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolRecommendation {
    /// Power-of-two size groups holding at least 5% of observations
    pub optimal_sizes: Vec<Size>,
    /// Observation weight per recommended size, in percent
    pub counts: Vec<u64>,
    /// Estimated fragmentation improvement, in percent
    pub expected_improvement: f64,
}
