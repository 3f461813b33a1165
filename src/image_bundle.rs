//! Image bundle module
//!
//! Packs many small encoded images into one index file plus one data file,
//! with a range-scoped reader and a locality-aware split planner on top.

pub mod common;
pub mod raster;
pub mod codec;
pub mod bundle;
pub mod splits;

pub use common::{
    BundleError,
    Result,
};

pub use raster::{
    ColorSpace,
    ImageFormat,
    ImageHeader,
    PixelArray,
    PixelType,
    RasterImage,
};

pub use codec::{
    CodecConfig,
    CodecRegistry,
    ImageDecoder,
    ImageEncoder,
};

pub use bundle::{
    BundleConfig,
    BundleConfigBuilder,
    BundleMode,
    BundleReader,
    BundleWriter,
    ImageBundle,
    ScanStats,
};

pub use splits::{
    BundleLayout,
    Split,
    StorageBlock,
    compute_splits,
    uniform_blocks,
};
