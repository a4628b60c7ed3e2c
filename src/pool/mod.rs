/*!
 * Size-Class Pools
 *
 * Pools are carved out of the free-list allocator as one contiguous
 * backing block partitioned into equal slots. Slot handout is LIFO.
 * Underused pools are marked and retired by `sweep`; a retired pool's
 * backing block goes back to the allocator once no slots are outstanding.
 */

use crate::core::types::{Address, Size};
use crate::memory::manager::FreeListAllocator;
use crate::memory::traits::Allocator;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// A pool is retired once its utilization drops below this fraction
const RETIREMENT_UTILIZATION: f64 = 0.2;

/// Fixed-size slot pool carved from the base allocator
#[derive(Debug)]
pub struct MemoryPool {
    id: u64,
    block_size: Size,
    base: Address,
    backing_size: Size,
    free_slots: Vec<Address>,
    total_slots: u64,
    used_slots: u64,
    marked: bool,
}

impl MemoryPool {
    /// Whether `address` falls inside this pool's slot range
    fn contains(&self, address: Address) -> bool {
        address >= self.base && address < self.base + self.backing_size
    }

    pub fn utilization(&self) -> f64 {
        if self.total_slots == 0 {
            return 0.0;
        }
        self.used_slots as f64 / self.total_slots as f64
    }

    pub fn block_size(&self) -> Size {
        self.block_size
    }
}

/// Pool statistics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    pub id: u64,
    pub block_size: Size,
    pub total_slots: u64,
    pub used_slots: u64,
    pub utilization: f64,
}

/// Owner of all size-class pools
#[derive(Debug, Default)]
pub struct PoolManager {
    pools: Vec<MemoryPool>,
    next_pool_id: u64,
}

impl PoolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop a slot from the first pool able to serve `size`, scanning pools
    /// in insertion order. Returns the slot address and the owning pool id.
    pub fn try_allocate(&mut self, size: Size) -> Option<(Address, u64)> {
        for pool in &mut self.pools {
            if pool.block_size >= size {
                if let Some(address) = pool.free_slots.pop() {
                    pool.used_slots += 1;
                    return Some((address, pool.id));
                }
            }
        }
        None
    }

    /// Carve a new pool of `slot_count` slots of `block_size` bytes from
    /// `allocator`. Failure to obtain the backing block is absorbed.
    pub fn create_pool(
        &mut self,
        block_size: Size,
        slot_count: u64,
        allocator: &mut FreeListAllocator,
    ) {
        let Some(backing_size) = block_size.checked_mul(slot_count) else {
            warn!(
                "Pool of {} x {} bytes overflows the address space, skipping",
                slot_count, block_size
            );
            return;
        };

        let base = match allocator.allocate(backing_size) {
            Ok(base) => base,
            Err(err) => {
                warn!(
                    "Could not carve {} byte backing block for pool: {}",
                    backing_size, err
                );
                return;
            }
        };

        let free_slots = (0..slot_count).map(|i| base + i * block_size).collect();
        let id = self.next_pool_id + 1;
        self.next_pool_id = id;

        info!(
            "Created pool #{}: {} slots of {} bytes at 0x{:x}",
            id, slot_count, block_size, base
        );
        self.pools.push(MemoryPool {
            id,
            block_size,
            base,
            backing_size,
            free_slots,
            total_slots: slot_count,
            used_slots: 0,
            marked: false,
        });
    }

    /// Return a slot to its owning pool. `false` means no pool owns the
    /// address and the caller should fall back to the base allocator.
    pub fn deallocate(&mut self, address: Address) -> bool {
        for pool in &mut self.pools {
            if pool.contains(address) {
                pool.free_slots.push(address);
                pool.used_slots = pool.used_slots.saturating_sub(1);
                return true;
            }
        }
        false
    }

    /// Recompute retirement marks from current utilization
    pub fn mark_underused(&mut self) {
        for pool in &mut self.pools {
            pool.marked = pool.utilization() < RETIREMENT_UTILIZATION;
        }
    }

    /// Retire marked pools. A drained pool hands its backing block back to
    /// `allocator`; a marked pool with outstanding slots stays until its
    /// slots drain, since its address range is still live.
    pub fn sweep(&mut self, allocator: &mut FreeListAllocator) {
        self.mark_underused();
        let mut retained = Vec::with_capacity(self.pools.len());
        for pool in self.pools.drain(..) {
            if pool.marked && pool.used_slots == 0 {
                info!(
                    "Retiring pool #{} ({} bytes per slot), returning {} bytes at 0x{:x}",
                    pool.id, pool.block_size, pool.backing_size, pool.base
                );
                if let Err(err) = allocator.deallocate(pool.base) {
                    warn!("Backing block for pool #{} was not returned: {}", pool.id, err);
                }
            } else {
                retained.push(pool);
            }
        }
        self.pools = retained;
    }

    /// Whether any live pool serves exactly `block_size`
    pub fn has_pool_for(&self, block_size: Size) -> bool {
        self.pools.iter().any(|pool| pool.block_size == block_size)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Statistics snapshot of every live pool, in insertion order
    pub fn stats(&self) -> Vec<PoolStats> {
        self.pools
            .iter()
            .map(|pool| PoolStats {
                id: pool.id,
                block_size: pool.block_size,
                total_slots: pool.total_slots,
                used_slots: pool.used_slots,
                utilization: pool.utilization(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::Strategy;

    fn allocator() -> FreeListAllocator {
        FreeListAllocator::new(64 * 1024, Strategy::FirstFit)
    }

    #[test]
    fn test_create_pool_carves_backing_block() {
        use crate::memory::traits::MemoryInfo;

        let mut alloc = allocator();
        let mut pools = PoolManager::new();
        pools.create_pool(64, 10, &mut alloc);

        assert_eq!(pools.len(), 1);
        assert_eq!(alloc.total_free_memory(), 64 * 1024 - 640);
    }

    #[test]
    fn test_slot_handout_is_lifo() {
        let mut alloc = allocator();
        let mut pools = PoolManager::new();
        pools.create_pool(64, 4, &mut alloc);

        let (first, _) = pools.try_allocate(64).unwrap();
        let (second, _) = pools.try_allocate(64).unwrap();
        assert_eq!(first, 3 * 64);
        assert_eq!(second, 2 * 64);
    }

    #[test]
    fn test_deallocate_distinguishes_ownership() {
        let mut alloc = allocator();
        let mut pools = PoolManager::new();
        pools.create_pool(64, 4, &mut alloc);

        let (slot, _) = pools.try_allocate(64).unwrap();
        assert!(pools.deallocate(slot));
        assert!(!pools.deallocate(64 * 1024 - 1));
    }

    #[test]
    fn test_slot_accounting() {
        let mut alloc = allocator();
        let mut pools = PoolManager::new();
        pools.create_pool(128, 10, &mut alloc);

        for _ in 0..3 {
            pools.try_allocate(128).unwrap();
        }
        let stats = pools.stats();
        assert_eq!(stats[0].used_slots, 3);
        assert_eq!(stats[0].total_slots, 10);
        assert!((stats[0].utilization - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sweep_returns_backing_of_drained_pool() {
        use crate::memory::traits::MemoryInfo;

        let mut alloc = allocator();
        let mut pools = PoolManager::new();
        pools.create_pool(64, 10, &mut alloc);

        let (slot, _) = pools.try_allocate(64).unwrap();
        pools.deallocate(slot);

        pools.sweep(&mut alloc);
        assert!(pools.is_empty());
        assert_eq!(alloc.total_free_memory(), 64 * 1024);
    }

    #[test]
    fn test_sweep_keeps_utilized_pools() {
        let mut alloc = allocator();
        let mut pools = PoolManager::new();
        pools.create_pool(64, 10, &mut alloc);

        for _ in 0..5 {
            pools.try_allocate(64).unwrap();
        }
        pools.sweep(&mut alloc);
        assert_eq!(pools.len(), 1);
    }

    #[test]
    fn test_sweep_keeps_marked_pool_with_outstanding_slot() {
        let mut alloc = allocator();
        let mut pools = PoolManager::new();
        pools.create_pool(64, 10, &mut alloc);

        pools.try_allocate(64).unwrap();
        pools.sweep(&mut alloc);
        // 10% utilization marks the pool, but its slot is still live
        assert_eq!(pools.len(), 1);
    }

    #[test]
    fn test_create_pool_failure_is_absorbed() {
        let mut alloc = FreeListAllocator::new(100, Strategy::FirstFit);
        let mut pools = PoolManager::new();
        pools.create_pool(64, 10, &mut alloc);
        assert!(pools.is_empty());
    }
}
