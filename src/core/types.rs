/*!
 * Core Types
 * Common types used across the allocator
 */

/// Offset into the simulated region
pub type Address = u64;

/// Size in bytes for memory operations
pub type Size = u64;
