//! Header and raster model
//!
//! Pure data types shared by the codecs, the bundle reader and writer.

mod header;
mod pixel_array;
mod image;

#[cfg(test)]
mod tests;

pub use header::{ColorSpace, ImageFormat, ImageHeader};
pub use pixel_array::{PixelArray, PixelType, Sample};
pub use image::RasterImage;
