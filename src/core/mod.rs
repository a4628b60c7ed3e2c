/*!
 * Core Module
 * Shared primitives
 */

pub mod types;

pub use types::{Address, Size};
