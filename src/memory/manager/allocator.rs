/*!
 * Allocation and Deallocation
 * Placement strategies, block splitting and coalescing
 */

use super::super::traits::{Allocator, MemoryInfo};
use super::super::types::{Block, MemoryError, MemoryResult, Strategy};
use super::block_list::BlockHandle;
use super::FreeListAllocator;
use crate::core::types::{Address, Size};
use log::debug;

impl FreeListAllocator {
    /// Select a free block of at least `size` bytes under the current
    /// strategy, scanning the sequence in address order. Ties between
    /// equally good candidates resolve to the earliest block.
    fn find_suitable_block(&self, size: Size) -> Option<BlockHandle> {
        let candidates = self
            .blocks
            .iter()
            .filter(|(_, block)| block.free && block.size >= size);

        match self.strategy {
            Strategy::FirstFit => candidates.map(|(handle, _)| handle).next(),
            Strategy::BestFit => {
                let mut best: Option<(BlockHandle, Size)> = None;
                for (handle, block) in candidates {
                    let leftover = block.size - size;
                    if best.map_or(true, |(_, smallest)| leftover < smallest) {
                        best = Some((handle, leftover));
                    }
                }
                best.map(|(handle, _)| handle)
            }
            Strategy::WorstFit => {
                let mut worst: Option<(BlockHandle, Size)> = None;
                for (handle, block) in candidates {
                    let leftover = block.size - size;
                    if worst.map_or(true, |(_, largest)| leftover > largest) {
                        worst = Some((handle, leftover));
                    }
                }
                worst.map(|(handle, _)| handle)
            }
        }
    }

    /// Split the block at `handle` so it retains exactly `size` bytes; the
    /// remainder becomes a new free block immediately after it.
    fn split_block(&mut self, handle: BlockHandle, size: Size) {
        let block = *self.blocks.get(handle);
        let remaining = block.size - size;
        if remaining == 0 {
            return;
        }

        let remainder = Block::new(block.address + size, remaining);
        let new_handle = self.blocks.insert_after(handle, remainder);
        self.index.insert(remainder.address, new_handle);
        self.blocks.get_mut(handle).size = size;
    }

    /// Merge every run of consecutive free blocks into one. Each merge
    /// keeps the cursor in place, so chains collapse in a single pass and
    /// the sequence reaches a fixed point.
    fn coalesce(&mut self) {
        let mut cursor = self.blocks.head();
        while let Some(handle) = cursor {
            match self.blocks.next(handle) {
                Some(next) if self.blocks.get(handle).free && self.blocks.get(next).free => {
                    let merged = self.blocks.remove(next);
                    self.index.remove(&merged.address);
                    self.blocks.get_mut(handle).size += merged.size;
                }
                next => cursor = next,
            }
        }
    }
}

impl Allocator for FreeListAllocator {
    fn allocate(&mut self, size: Size) -> MemoryResult<Address> {
        if size == 0 {
            return Err(MemoryError::ZeroSize);
        }

        let handle = self
            .find_suitable_block(size)
            .ok_or_else(|| MemoryError::NoSuitableBlock {
                requested: size,
                largest: self.largest_free_block(),
            })?;

        if self.blocks.get(handle).size > size {
            self.split_block(handle, size);
        }

        let block = self.blocks.get_mut(handle);
        block.free = false;
        let address = block.address;

        debug!(
            "Allocated {} bytes at 0x{:x} ({} strategy)",
            size, address, self.strategy
        );
        Ok(address)
    }

    fn deallocate(&mut self, address: Address) -> MemoryResult<()> {
        let handle = self
            .index
            .get(&address)
            .copied()
            .filter(|&handle| !self.blocks.get(handle).free)
            .ok_or(MemoryError::InvalidAddress(address))?;

        let block = self.blocks.get_mut(handle);
        block.free = true;
        let size = block.size;
        self.coalesce();

        debug!("Deallocated {} bytes at 0x{:x}", size, address);
        Ok(())
    }
}
