//! Common utilities module
//!
//! This module contains shared utilities used across the image bundle.

pub mod error;

pub use error::{BundleError, Result};
