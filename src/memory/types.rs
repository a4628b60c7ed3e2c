/*!
 * Memory Types
 * Common types for the simulated allocator
 */

use crate::core::types::{Address, Size};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Memory operation result
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("cannot allocate zero bytes")]
    ZeroSize,

    #[error("no suitable free block: requested {requested} bytes, largest free block {largest} bytes")]
    NoSuitableBlock { requested: Size, largest: Size },

    #[error("invalid address for deallocation: 0x{0:x}")]
    InvalidAddress(Address),
}

/// Placement strategy for free block selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    FirstFit,
    BestFit,
    WorstFit,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Strategy::FirstFit => write!(f, "first-fit"),
            Strategy::BestFit => write!(f, "best-fit"),
            Strategy::WorstFit => write!(f, "worst-fit"),
        }
    }
}

/// A contiguous run of the simulated address space, either free or busy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub address: Address,
    pub size: Size,
    pub free: bool,
}

impl Block {
    pub fn new(address: Address, size: Size) -> Self {
        Self {
            address,
            size,
            free: true,
        }
    }

    /// First address past the end of this block
    pub fn end(&self) -> Address {
        self.address + self.size
    }
}

/// Allocator statistics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_memory: Size,
    pub free_memory: Size,
    pub largest_free_block: Size,
    pub fragmentation_ratio: f64,
    pub total_blocks: usize,
    pub free_blocks: usize,
}
