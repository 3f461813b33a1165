use crate::image_bundle::common::error::{BundleError, Result};
use crate::image_bundle::raster::{ImageHeader, PixelArray, PixelType, RasterImage};

pub trait ImageDecoder: Send + Sync {
    /// Recovers format, dimensions and color space without decoding pixels.
    fn decode_header(&self, data: &[u8]) -> Result<ImageHeader>;

    /// Full decode. The decoded shape must match `header` exactly, otherwise
    /// the call fails with `BundleError::Decode`.
    fn decode_image(
        &self,
        data: &[u8],
        header: &ImageHeader,
        pixel_type: PixelType,
    ) -> Result<RasterImage>;

    fn decode_header_and_image(&self, data: &[u8], pixel_type: PixelType) -> Result<RasterImage> {
        let header = self.decode_header(data)?;
        self.decode_image(data, &header, pixel_type)
    }
}

/// Builds the raster for a decoded 8-bit buffer after checking that the
/// decoded shape agrees with the header the caller supplied.
pub(super) fn raster_from_samples(
    header: &ImageHeader,
    width: usize,
    height: usize,
    bands: usize,
    samples: &[u8],
    pixel_type: PixelType,
) -> Result<RasterImage> {
    if width != header.width() || height != header.height() || bands != header.num_bands() {
        return Err(BundleError::Decode(format!(
            "decoded {}x{}x{} does not match header {}x{}x{}",
            width,
            height,
            bands,
            header.width(),
            header.height(),
            header.num_bands()
        )));
    }
    if samples.len() != header.sample_count() {
        return Err(BundleError::Decode(format!(
            "decoder produced {} samples, expected {}",
            samples.len(),
            header.sample_count()
        )));
    }
    RasterImage::from_parts(header.clone(), PixelArray::from_u8(pixel_type, samples))
}
