/*!
 * Adaptive Supervisor
 *
 * Front door for callers: routes allocations through the size-class pools
 * when profitable, falls back to the free-list allocator, and every
 * `adaptation_interval` fall-through operations consults the profiler to
 * switch strategy, reshape the pool set and retune its own parameters.
 */

use crate::core::types::{Address, Size};
use crate::leak::LeakDetector;
use crate::memory::manager::FreeListAllocator;
use crate::memory::traits::{Allocator, MemoryInfo};
use crate::memory::types::{Block, MemoryError, MemoryResult, MemoryStats, Strategy};
use crate::pool::{PoolManager, PoolStats};
use crate::profiler::{PerformanceMetrics, PoolRecommendation, Prediction, Profiler};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Slot count for pools created on demand from the hot path
const DEFAULT_POOL_SLOTS: u64 = 10;

/// Floor for slot counts of pools created during adaptation
const MIN_ADAPTIVE_POOL_SLOTS: u64 = 5;

/// Tuning knobs of the adaptation cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveParams {
    /// Fragmentation level above which the strategy is switched
    pub fragmentation_threshold: f64,
    /// Minimum observations of a size before it gets a pool
    pub pool_creation_threshold: u64,
    /// Fall-through operations between adaptation cycles
    pub adaptation_interval: u64,
    pub operations_since_last_adaptation: u64,
}

impl Default for AdaptiveParams {
    fn default() -> Self {
        Self {
            fragmentation_threshold: 0.30,
            pool_creation_threshold: 100,
            adaptation_interval: 1_000,
            operations_since_last_adaptation: 0,
        }
    }
}

/// Adaptive allocator supervising a free-list allocator, a profiler and a
/// set of size-class pools
pub struct AdaptiveAllocator {
    allocator: FreeListAllocator,
    profiler: Profiler,
    pools: PoolManager,
    params: AdaptiveParams,
    adaptive_mode: bool,
    detector: Option<Arc<LeakDetector>>,
    name: String,
}

impl AdaptiveAllocator {
    /// Create a supervisor over `total_memory` bytes with first-fit placement
    pub fn new(total_memory: Size) -> Self {
        Self::with_strategy(total_memory, Strategy::FirstFit)
    }

    pub fn with_strategy(total_memory: Size, strategy: Strategy) -> Self {
        Self {
            allocator: FreeListAllocator::new(total_memory, strategy),
            profiler: Profiler::new(),
            pools: PoolManager::new(),
            params: AdaptiveParams::default(),
            adaptive_mode: true,
            detector: None,
            name: "adaptive-allocator".to_string(),
        }
    }

    /// Attach a leak detector; it is notified on every allocation and
    /// deallocation that goes through this supervisor
    pub fn with_leak_detector(mut self, detector: Arc<LeakDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Name reported to the leak detector as the origin site
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Toggle adaptive mode. Enabling resets the adaptation counter and
    /// runs an adaptation cycle immediately.
    pub fn enable_adaptive(&mut self, enable: bool) {
        self.adaptive_mode = enable;
        if enable {
            self.params.operations_since_last_adaptation = 0;
            self.adapt();
        }
    }

    pub fn set_allocation_strategy(&mut self, strategy: Strategy) {
        self.allocator.set_strategy(strategy);
    }

    pub fn strategy(&self) -> Strategy {
        self.allocator.strategy()
    }

    /// Carve a pool explicitly, outside the adaptive cycle
    pub fn create_memory_pool(&mut self, block_size: Size, slot_count: u64) {
        self.pools
            .create_pool(block_size, slot_count, &mut self.allocator);
    }

    pub fn params(&self) -> &AdaptiveParams {
        &self.params
    }

    pub fn pool_stats(&self) -> Vec<PoolStats> {
        self.pools.stats()
    }

    /// Block count of the underlying free-list allocator; pool-served
    /// allocations leave it unchanged
    pub fn block_count(&self) -> usize {
        self.allocator.block_count()
    }

    /// Snapshot of the underlying block sequence in address order
    pub fn memory_map(&self) -> Vec<Block> {
        self.allocator.memory_map()
    }

    pub fn performance_metrics(&self) -> PerformanceMetrics {
        self.profiler
            .performance_metrics(self.allocator.fragmentation_ratio())
    }

    pub fn pool_recommendation(&self) -> PoolRecommendation {
        self.profiler
            .recommend_pool_configuration(self.allocator.fragmentation_ratio())
    }

    fn record_allocation(&mut self, size: Size, address: Address, pool_id: u64) {
        self.profiler.record_allocation(size, address, pool_id);
        if let Some(detector) = &self.detector {
            detector.on_allocate(address, size, &self.name);
        }
    }

    fn record_deallocation(&mut self, address: Address) {
        self.profiler.record_deallocation(address);
        if let Some(detector) = &self.detector {
            detector.on_deallocate(address);
        }
    }

    /// One adaptation cycle: consult the profiler, switch strategy under
    /// fragmentation pressure, reshape pools and retune parameters
    fn adapt(&mut self) {
        if !self.adaptive_mode {
            return;
        }

        let metrics = self
            .profiler
            .performance_metrics(self.allocator.fragmentation_ratio());
        let prediction = self.profiler.predict_next_allocation();
        self.profiler
            .record_strategy_metrics(self.allocator.strategy(), metrics.clone());

        if metrics.fragmentation_ratio > self.params.fragmentation_threshold {
            self.allocator.set_strategy(prediction.recommended_strategy);
        }

        self.optimize_pools(&prediction);
        self.adjust_parameters(&metrics);
        self.params.operations_since_last_adaptation = 0;

        info!(
            "Adaptation cycle done: {} strategy, {} pools, interval {}",
            self.allocator.strategy(),
            self.pools.len(),
            self.params.adaptation_interval
        );
    }

    /// Retire underused pools, then give every predicted size a pool sized
    /// by prediction confidence
    fn optimize_pools(&mut self, prediction: &Prediction) {
        self.pools.sweep(&mut self.allocator);

        for &size in &prediction.recommended_pool_sizes {
            if !self.pools.has_pool_for(size) {
                let slot_count =
                    MIN_ADAPTIVE_POOL_SLOTS.max((prediction.confidence * 20.0).round() as u64);
                self.pools
                    .create_pool(size, slot_count, &mut self.allocator);
            }
        }
    }

    /// Retune thresholds from observed performance; skipped while the
    /// profiler has nothing recorded
    fn adjust_parameters(&mut self, metrics: &PerformanceMetrics) {
        if self.profiler.total_observations() == 0 {
            return;
        }

        if metrics.hit_rate < 0.80 {
            self.params.fragmentation_threshold *= 1.1;
        } else if metrics.hit_rate > 0.95 {
            self.params.fragmentation_threshold *= 0.9;
        }

        if metrics.failed_allocations > 100 {
            self.params.pool_creation_threshold =
                ((self.params.pool_creation_threshold as f64 * 0.9) as u64).max(1);
        }

        let interval = self.params.adaptation_interval as f64;
        self.params.adaptation_interval = if metrics.average_allocation_time_us > 1_000.0 {
            ((interval * 1.2) as u64).max(1)
        } else {
            ((interval * 0.8) as u64).max(1)
        };
    }
}

impl Allocator for AdaptiveAllocator {
    /// Allocate `size` bytes: pool slot if available, on-demand pool for
    /// frequently seen sizes, otherwise the free-list allocator
    fn allocate(&mut self, size: Size) -> MemoryResult<Address> {
        if size == 0 {
            return Err(MemoryError::ZeroSize);
        }

        if self.adaptive_mode {
            if let Some((address, pool_id)) = self.pools.try_allocate(size) {
                self.record_allocation(size, address, pool_id);
                return Ok(address);
            }

            if self
                .profiler
                .should_create_pool_for_size(size, self.params.pool_creation_threshold)
            {
                self.pools
                    .create_pool(size, DEFAULT_POOL_SLOTS, &mut self.allocator);
                if let Some((address, pool_id)) = self.pools.try_allocate(size) {
                    self.record_allocation(size, address, pool_id);
                    return Ok(address);
                }
            }

            let address = self.allocator.allocate(size)?;
            self.record_allocation(size, address, 0);

            self.params.operations_since_last_adaptation += 1;
            if self.params.operations_since_last_adaptation >= self.params.adaptation_interval {
                self.adapt();
            }
            return Ok(address);
        }

        let address = self.allocator.allocate(size)?;
        self.record_allocation(size, address, 0);
        Ok(address)
    }

    /// Deallocate `address`: offer it to the pools first, then to the
    /// free-list allocator
    fn deallocate(&mut self, address: Address) -> MemoryResult<()> {
        if self.pools.deallocate(address) {
            self.record_deallocation(address);
            return Ok(());
        }

        self.allocator.deallocate(address)?;
        self.record_deallocation(address);
        self.pools.mark_underused();
        Ok(())
    }
}

impl MemoryInfo for AdaptiveAllocator {
    fn stats(&self) -> MemoryStats {
        self.allocator.stats()
    }

    fn total_memory(&self) -> Size {
        self.allocator.total_memory()
    }

    fn total_free_memory(&self) -> Size {
        self.allocator.total_free_memory()
    }

    fn largest_free_block(&self) -> Size {
        self.allocator.largest_free_block()
    }

    fn fragmentation_ratio(&self) -> f64 {
        self.allocator.fragmentation_ratio()
    }
}
