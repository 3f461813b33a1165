//! Bundle module
//!
//! Writer, reader and open/close handle for the index + data file pair.

pub mod format;
mod types;
mod writer;
mod reader;
mod handle;


pub use types::{BundleConfig, BundleConfigBuilder};
pub use writer::BundleWriter;
pub use reader::{BundleReader, CullPredicate, ScanStats};
pub use handle::{BundleMode, ImageBundle};
