//! Split planning module
//!
//! Cuts bundles into byte ranges for parallel readers. Cut points always fall
//! on segment boundaries taken from the offset index, and each range carries
//! the hosts of the storage blocks it touches.

mod types;
mod planner;


pub use types::{BundleLayout, Split, StorageBlock, uniform_blocks};
pub use planner::compute_splits;
