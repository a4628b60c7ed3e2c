/*!
 * Free-List Allocator
 *
 * Manages a simulated address space as an address-ordered sequence of
 * blocks that tiles `[0, total_memory)` without gaps. Allocation splits a
 * free block chosen by the configured placement strategy; deallocation
 * marks the block free and coalesces adjacent free blocks. An address map
 * keyed by block address gives O(1) deallocation lookup.
 */

mod allocator;
mod block_list;

use super::traits::MemoryInfo;
use super::types::{Block, MemoryStats, Strategy};
use crate::core::types::{Address, Size};
use ahash::RandomState;
use block_list::{BlockHandle, BlockList};
use log::info;
use std::collections::HashMap;

/// Free-list allocator over a simulated region
#[derive(Debug)]
pub struct FreeListAllocator {
    blocks: BlockList,
    index: HashMap<Address, BlockHandle, RandomState>,
    total_memory: Size,
    strategy: Strategy,
}

impl FreeListAllocator {
    /// Create an allocator over `total_memory` bytes with one free block
    /// covering the whole region.
    ///
    /// # Panics
    /// Panics if `total_memory` is zero.
    pub fn new(total_memory: Size, strategy: Strategy) -> Self {
        assert!(total_memory > 0, "simulated region must be non-empty");

        let mut blocks = BlockList::new();
        let handle = blocks.push_back(Block::new(0, total_memory));

        let mut index = HashMap::with_hasher(RandomState::new());
        index.insert(0, handle);

        info!(
            "Free-list allocator initialized: {} bytes, {} strategy",
            total_memory, strategy
        );

        Self {
            blocks,
            index,
            total_memory,
            strategy,
        }
    }

    /// Replace the placement strategy; affects subsequent allocations only
    pub fn set_strategy(&mut self, strategy: Strategy) {
        if self.strategy != strategy {
            info!("Placement strategy: {} -> {}", self.strategy, strategy);
            self.strategy = strategy;
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Number of blocks in the sequence, free and busy
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Snapshot of the block sequence in address order
    pub fn memory_map(&self) -> Vec<Block> {
        self.blocks.iter().map(|(_, block)| *block).collect()
    }
}

impl MemoryInfo for FreeListAllocator {
    fn stats(&self) -> MemoryStats {
        let free_blocks = self.blocks.iter().filter(|(_, b)| b.free).count();
        MemoryStats {
            total_memory: self.total_memory,
            free_memory: self.total_free_memory(),
            largest_free_block: self.largest_free_block(),
            fragmentation_ratio: self.fragmentation_ratio(),
            total_blocks: self.blocks.len(),
            free_blocks,
        }
    }

    fn total_memory(&self) -> Size {
        self.total_memory
    }

    fn total_free_memory(&self) -> Size {
        self.blocks
            .iter()
            .filter(|(_, b)| b.free)
            .map(|(_, b)| b.size)
            .sum()
    }

    fn largest_free_block(&self) -> Size {
        self.blocks
            .iter()
            .filter(|(_, b)| b.free)
            .map(|(_, b)| b.size)
            .max()
            .unwrap_or(0)
    }

    fn fragmentation_ratio(&self) -> f64 {
        let total_free = self.total_free_memory();
        if total_free == 0 {
            return 0.0;
        }
        1.0 - (self.largest_free_block() as f64 / total_free as f64)
    }
}
