//! Codec module
//!
//! Format-specific decoders and encoders (JPEG, PNG, PPM) and the registry
//! that maps an [`ImageFormat`](crate::image_bundle::raster::ImageFormat) to them.

mod decoder;
mod encoder;
mod registry;
pub mod types;
mod jpeg_codec;
mod png_codec;
mod ppm_codec;


pub use decoder::ImageDecoder;
pub use encoder::ImageEncoder;
pub use registry::CodecRegistry;
pub use types::CodecConfig;
pub use jpeg_codec::{JpegDecoder, JpegEncoder};
pub use png_codec::{PngDecoder, PngEncoder};
pub use ppm_codec::{PpmDecoder, PpmEncoder};
