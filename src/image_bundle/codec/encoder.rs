use std::io::Write;

use crate::image_bundle::common::error::Result;
use crate::image_bundle::raster::RasterImage;

pub trait ImageEncoder: Send + Sync {
    /// Rasters whose color space the format cannot represent are rejected with
    /// `BundleError::IllegalArgument`.
    fn encode_image(&self, image: &RasterImage, output: &mut dyn Write) -> Result<()>;
}
