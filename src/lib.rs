/*!
 * Simalloc
 * Simulated memory allocator with adaptive strategy selection
 *
 * Manages an abstract address space of fixed size: addresses are integer
 * offsets into a conceptual region, never host memory. A free-list
 * allocator with pluggable placement strategies sits at the bottom; a
 * profiler watches every operation and derives allocation patterns; the
 * adaptive supervisor periodically reconfigures strategy and size-class
 * pools from what the profiler sees. An optional leak detector observes
 * the supervisor's traffic.
 */

pub mod adaptive;
pub mod core;
pub mod leak;
pub mod memory;
pub mod pool;
pub mod profiler;

pub use adaptive::{AdaptiveAllocator, AdaptiveParams};
pub use leak::{LeakDetector, LeakReport};
pub use memory::{
    Allocator, Block, FreeListAllocator, MemoryError, MemoryInfo, MemoryResult, MemoryStats,
    Strategy,
};
pub use pool::{PoolManager, PoolStats};
pub use profiler::{
    AllocationPattern, PerformanceMetrics, PoolRecommendation, Prediction, Profiler,
};
